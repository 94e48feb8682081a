/**
 * File operations module: enumeration, per-file sequencing and transfer
 */

use anyhow::{Context, Result};
use filetime::FileTime;
use glob::{MatchOptions, Pattern};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::collision::{self, Resolution};
use crate::config::{SortOptions, TransferMode};
use crate::date::{self, ResolvedDate};
use crate::exif::MetadataExtractor;
use crate::hashing::ContentHasher;
use crate::naming;
use crate::progress::ProgressReporter;

/// Extension match that ignores case on every platform
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Recursively collect files under `source` whose extension is in
/// `extensions`, skipping paths that contain `exclude_marker`.
/// The list is sorted so runs are reproducible.
pub fn find_media_files(source: &Path, extensions: &[String], exclude_marker: Option<&str>) -> Result<Vec<PathBuf>> {
    let patterns = extensions
        .iter()
        .map(|ext| Pattern::new(&format!("*.{}", Pattern::escape(ext))))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid file extension")?;

    let mut files = Vec::new();

    for entry in WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(marker) = exclude_marker {
            if path.to_string_lossy().contains(marker) {
                debug!("Skipping thumbnail artifact: {}", path.display());
                continue;
            }
        }
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if patterns.iter().any(|pattern| pattern.matches_with(file_name, MATCH_OPTIONS)) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// What happened to one source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    Moved,
    Copied,
    SkippedDuplicate,
    Suffixed(u32),
}

impl fmt::Display for PlacementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementOutcome::Moved => f.write_str("moved"),
            PlacementOutcome::Copied => f.write_str("copied"),
            PlacementOutcome::SkippedDuplicate => f.write_str("skipped duplicate"),
            PlacementOutcome::Suffixed(n) => write!(f, "placed with suffix _{n}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub file_path: PathBuf,
    pub outcome: Option<PlacementOutcome>,
    pub new_path: Option<PathBuf>,
    pub date: Option<ResolvedDate>,
    pub error: Option<String>,
}

impl ProcessResult {
    pub const fn success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub moved: usize,
    pub copied: usize,
    pub suffixed: usize,
    pub duplicates: usize,
    pub degraded: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn from_results(results: &[ProcessResult]) -> Self {
        let mut summary = Self {
            processed: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.outcome {
                Some(PlacementOutcome::Moved) => summary.moved += 1,
                Some(PlacementOutcome::Copied) => summary.copied += 1,
                Some(PlacementOutcome::Suffixed(_)) => summary.suffixed += 1,
                Some(PlacementOutcome::SkippedDuplicate) => summary.duplicates += 1,
                None => {}
            }
            if result.date.is_some_and(|date| date.degraded) {
                summary.degraded += 1;
            }
            if !result.success() {
                summary.errors += 1;
            }
        }
        summary
    }
}

pub struct FileProcessor {
    options: SortOptions,
    extractor: MetadataExtractor,
    content_hasher: ContentHasher,
}

impl FileProcessor {
    pub fn new(options: SortOptions) -> Self {
        let extractor = MetadataExtractor::new(options.use_patterns, options.use_metadata);
        Self::with_extractor(options, extractor)
    }

    pub fn with_extractor(options: SortOptions, extractor: MetadataExtractor) -> Self {
        Self {
            options,
            extractor,
            content_hasher: ContentHasher::new(),
        }
    }

    /// Pre-flight checks, enumeration, then every file in order.
    /// Only the pre-flight checks can fail the run.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<Vec<ProcessResult>> {
        self.options.preflight()?;

        let files = find_media_files(
            &self.options.source,
            &self.options.extensions,
            self.options.thumbnail_marker.as_deref(),
        )?;
        info!("Found {} files in {}", files.len(), self.options.source.display());

        let results = self.process_files(&files, reporter);

        if self.options.prune_empty {
            let removed = crate::cleanup::prune_empty_dirs(&self.options.source);
            info!("Removed {} empty directories", removed);
        }

        Ok(results)
    }

    /// Process files sequentially, reporting progress after each one
    pub fn process_files(&self, files: &[PathBuf], reporter: &dyn ProgressReporter) -> Vec<ProcessResult> {
        let total = files.len();
        let mut results = Vec::with_capacity(total);

        for (index, file_path) in files.iter().enumerate() {
            let result = self.process_file(file_path);
            if let Some(error) = &result.error {
                warn!("Failed to sort {}: {}", file_path.display(), error);
            }
            results.push(result);
            reporter.advance(index + 1, total);
        }

        reporter.finish();
        results
    }

    /// Sort one file; failures are captured in the result
    pub fn process_file(&self, file_path: &Path) -> ProcessResult {
        let mut result = ProcessResult {
            file_path: file_path.to_path_buf(),
            outcome: None,
            new_path: None,
            date: None,
            error: None,
        };

        let (date, tag) = match self.resolve_date(file_path) {
            Ok(resolved) => resolved,
            Err(e) => {
                result.error = Some(format!("{e:#}"));
                return result;
            }
        };
        result.date = Some(date);

        match self.place(file_path, &date, tag.as_deref()) {
            Ok((outcome, new_path)) => {
                debug!("{}: {} -> {}", outcome, file_path.display(), new_path.display());
                result.outcome = Some(outcome);
                result.new_path = Some(new_path);
            }
            Err(e) => result.error = Some(format!("{e:#}")),
        }

        result
    }

    /// Extracted date and tag if any source produced a date, else the
    /// modification time
    fn resolve_date(&self, file_path: &Path) -> Result<(ResolvedDate, Option<String>)> {
        let extraction = self.extractor.extract(file_path);
        let day_begins = self.options.day_begins;

        if let Some(raw) = &extraction.raw {
            match date::normalize(raw, day_begins) {
                Ok(date) => return Ok((date, extraction.tag)),
                Err(e) => debug!("Rejected {} date for {}: {}", raw.origin, file_path.display(), e),
            }
        }

        let degraded = extraction.failed(self.extractor.uses_metadata());
        if degraded {
            debug!("Using file modification time for: {}", file_path.display());
        }
        let date = ResolvedDate::from_modified(file_path, day_begins, degraded)?;
        Ok((date, extraction.tag))
    }

    fn place(&self, file_path: &Path, date: &ResolvedDate, tag: Option<&str>) -> Result<(PlacementOutcome, PathBuf)> {
        let destination = naming::compose(
            date,
            tag,
            file_path,
            &self.options.template,
            self.options.rename,
        )?;
        let target_dir = destination.create_dirs(&self.options.destination)?;
        let candidate = target_dir.join(&destination.file_name);

        if is_same_file(file_path, &candidate) {
            debug!("Already in place: {}", file_path.display());
            return Ok((PlacementOutcome::SkippedDuplicate, candidate));
        }

        loop {
            let (target_path, resolution) = collision::resolve(
                &candidate,
                file_path,
                self.options.remove_duplicates,
                &self.content_hasher,
            )?;

            let outcome = match resolution {
                Resolution::Duplicate => {
                    if self.options.mode == TransferMode::Move && !is_same_file(file_path, &target_path) {
                        fs::remove_file(file_path)
                            .with_context(|| format!("Failed to remove duplicate source: {}", file_path.display()))?;
                        debug!("Removed duplicate source: {}", file_path.display());
                    }
                    return Ok((PlacementOutcome::SkippedDuplicate, target_path));
                }
                Resolution::Available => match self.options.mode {
                    TransferMode::Move => PlacementOutcome::Moved,
                    TransferMode::Copy => PlacementOutcome::Copied,
                },
                Resolution::Suffixed(n) => PlacementOutcome::Suffixed(n),
            };

            match perform_file_operation(file_path, &target_path, self.options.mode)? {
                Transfer::Done => return Ok((outcome, target_path)),
                Transfer::TargetTaken => {
                    debug!("{} was created by someone else, resolving again", target_path.display());
                }
            }
        }
    }
}

/// Whether a transfer put the file at its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Done,
    /// The target appeared after it was resolved; nothing was written there
    TargetTaken,
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Hidden sibling that receives the content before it is published
fn partial_path(target_path: &Path) -> PathBuf {
    let mut file_name = OsString::from(".");
    file_name.push(target_path.file_name().unwrap_or_default());
    file_name.push(format!(".{}.part", std::process::id()));
    target_path.with_file_name(file_name)
}

/// Copy content and times into a partial file, then publish it under
/// `target_path` without overwriting. The partial file never outlives
/// the call.
fn copy_preserving_times(source_path: &Path, target_path: &Path) -> Result<Transfer> {
    let partial = partial_path(target_path);
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&partial)
        .with_context(|| format!("Failed to create temporary file: {}", partial.display()))?;

    let transfer = write_partial(source_path, output, target_path).and_then(|()| publish(&partial, target_path));

    if let Err(e) = fs::remove_file(&partial) {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove temporary file {}: {}", partial.display(), e);
        }
    }
    transfer
}

fn write_partial(source_path: &Path, mut output: File, target_path: &Path) -> Result<()> {
    let context = || {
        format!(
            "Failed to copy file from '{}' to '{}'",
            source_path.display(),
            target_path.display()
        )
    };
    let mut input = File::open(source_path).with_context(context)?;
    io::copy(&mut input, &mut output).with_context(context)?;

    let metadata = input
        .metadata()
        .with_context(|| format!("Failed to read file metadata: {}", source_path.display()))?;
    output
        .set_permissions(metadata.permissions())
        .with_context(|| format!("Failed to set permissions: {}", target_path.display()))?;
    filetime::set_file_handle_times(
        &output,
        Some(FileTime::from_last_access_time(&metadata)),
        Some(FileTime::from_last_modification_time(&metadata)),
    )
    .with_context(|| format!("Failed to set file times: {}", target_path.display()))?;

    Ok(())
}

/// Give the finished partial file its final name, unless that name is taken
fn publish(partial: &Path, target_path: &Path) -> Result<Transfer> {
    match fs::hard_link(partial, target_path) {
        Ok(()) => Ok(Transfer::Done),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(Transfer::TargetTaken),
        Err(e) => {
            // Filesystems without hard links
            debug!("Hard link failed ({}), renaming instead", e);
            if target_path.symlink_metadata().is_ok() {
                return Ok(Transfer::TargetTaken);
            }
            fs::rename(partial, target_path)
                .with_context(|| format!("Failed to rename into place: {}", target_path.display()))?;
            Ok(Transfer::Done)
        }
    }
}

/// Move or copy `source_path` to `target_path`. An existing target is never
/// replaced; it is reported as `TargetTaken`.
fn perform_file_operation(source_path: &Path, target_path: &Path, mode: TransferMode) -> Result<Transfer> {
    debug!(
        "Attempting {} operation: '{}' -> '{}'",
        mode,
        source_path.display(),
        target_path.display()
    );

    let transfer = match mode {
        TransferMode::Move => match fs::hard_link(source_path, target_path) {
            Ok(()) => Transfer::Done,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Transfer::TargetTaken,
            Err(e) => {
                debug!("Hard link failed ({}), using copy+delete strategy", e);
                copy_preserving_times(source_path, target_path)?
            }
        },
        TransferMode::Copy => copy_preserving_times(source_path, target_path)?,
    };

    if mode == TransferMode::Move && transfer == Transfer::Done {
        fs::remove_file(source_path)
            .with_context(|| format!("Failed to remove original file: {}", source_path.display()))?;
    }
    Ok(transfer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{RecordingReporter, SilentReporter};

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn extensions(list: &[&str]) -> Vec<String> {
        list.iter().map(|ext| (*ext).to_string()).collect()
    }

    #[test]
    fn enumeration_matches_extensions_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.jpg"), b"a");
        write(&dir.path().join("B.JPG"), b"b");
        write(&dir.path().join("nested/c.Jpg"), b"c");
        write(&dir.path().join("nested/d.mov"), b"d");
        write(&dir.path().join("notes.txt"), b"t");
        write(&dir.path().join("@eaDir/a.jpg/SYNOPHOTO_THUMB_M.jpg"), b"thumb");

        let files = find_media_files(dir.path(), &extensions(&["jpg"]), Some("@eaDir")).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["B.JPG", "a.jpg", "c.Jpg"]);
    }

    #[test]
    fn thumbnail_marker_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("@eaDir/SYNOPHOTO_THUMB_M.jpg"), b"thumb");

        assert!(find_media_files(dir.path(), &extensions(&["jpg"]), Some("@eaDir")).unwrap().is_empty());
        assert_eq!(find_media_files(dir.path(), &extensions(&["jpg"]), None).unwrap().len(), 1);
    }

    #[test]
    fn copy_preserves_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("b.jpg");
        write(&source, b"content");
        let mtime = FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();

        assert_eq!(perform_file_operation(&source, &target, TransferMode::Copy).unwrap(), Transfer::Done);

        assert!(source.exists());
        let copied = fs::metadata(&target).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied), mtime);
    }

    #[test]
    fn move_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("b.jpg");
        write(&source, b"content");

        assert_eq!(perform_file_operation(&source, &target, TransferMode::Move).unwrap(), Transfer::Done);

        assert!(!source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"content");
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn failed_copy_leaves_nothing_behind() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        // Opens fine but fails on the first read
        let unreadable = src.path().join("IMG_20230615_141500.jpg");
        fs::create_dir(&unreadable).unwrap();
        let target = dest.path().join("2023-06-15_141500_img.jpg");

        assert!(perform_file_operation(&unreadable, &target, TransferMode::Copy).is_err());
        assert!(entries(dest.path()).is_empty());

        let missing = src.path().join("gone.jpg");
        assert!(perform_file_operation(&missing, &target, TransferMode::Move).is_err());
        assert!(entries(dest.path()).is_empty());
    }

    #[test]
    fn rerun_after_failed_copy_uses_the_canonical_name() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let photo = src.path().join("IMG_20230615_141500.jpg");
        let processor = FileProcessor::new(SortOptions::new(src.path(), dest.path()));

        fs::create_dir(&photo).unwrap();
        let failed = processor.process_files(&[photo.clone()], &SilentReporter);
        assert!(!failed[0].success());
        assert!(entries(&dest.path().join("2023/06")).is_empty());

        fs::remove_dir(&photo).unwrap();
        write(&photo, &vec![5u8; 200_000]);
        let results = processor.process_files(&[photo.clone()], &SilentReporter);

        assert_eq!(results[0].outcome, Some(PlacementOutcome::Copied));
        assert_eq!(entries(&dest.path().join("2023/06")), vec!["2023-06-15_141500_img.jpg"]);
    }

    #[test]
    fn existing_target_is_never_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("b.jpg");
        write(&source, b"mine");
        write(&target, b"someone else");

        for mode in [TransferMode::Copy, TransferMode::Move] {
            assert_eq!(perform_file_operation(&source, &target, mode).unwrap(), Transfer::TargetTaken);
            assert_eq!(fs::read(&target).unwrap(), b"someone else");
            assert_eq!(fs::read(&source).unwrap(), b"mine");
            assert_eq!(entries(dir.path()), vec!["a.jpg", "b.jpg"]);
        }
    }

    #[test]
    fn partial_file_is_hidden_next_to_target() {
        let partial = partial_path(Path::new("/d/2023/06/a.jpg"));
        assert_eq!(partial.parent(), Some(Path::new("/d/2023/06")));
        let name = partial.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".a.jpg."));
        assert!(name.ends_with(".part"));
    }

    #[test]
    fn per_file_errors_do_not_stop_the_run() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let good = src.path().join("IMG_20230615_141500.jpg");
        write(&good, b"good");
        let missing = src.path().join("IMG_20230615_141501.jpg");

        let processor = FileProcessor::new(SortOptions::new(src.path(), dest.path()));
        let reporter = RecordingReporter::default();
        let results = processor.process_files(&[missing.clone(), good.clone()], &reporter);

        assert_eq!(results.len(), 2);
        assert!(!results[0].success());
        assert_eq!(results[1].outcome, Some(PlacementOutcome::Copied));
        assert_eq!(reporter.calls(), vec![(1, 2), (2, 2)]);

        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.errors, 1);
    }

    #[test]
    fn file_already_in_place_is_left_alone() {
        let root = tempfile::tempdir().unwrap();
        let placed = root.path().join("holiday.jpg");
        write(&placed, b"no metadata here");

        let mut options = SortOptions::new(root.path(), root.path());
        options.mode = TransferMode::Move;
        options.template = crate::naming::DirTemplate::parse("").unwrap();
        let processor = FileProcessor::new(options);

        let results = processor.process_files(&[placed.clone()], &SilentReporter);

        assert!(results[0].success());
        assert!(results[0].date.unwrap().degraded);
        assert_eq!(results[0].outcome, Some(PlacementOutcome::SkippedDuplicate));
        assert_eq!(fs::read(&placed).unwrap(), b"no metadata here");
    }
}
