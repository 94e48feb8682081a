/**
 * Collision resolution for destination paths
 */

use anyhow::{Context, Result};
use log::debug;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::hashing::ContentHasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing at the candidate path
    Available,
    /// Candidate was taken, `_n` was appended before the extension
    Suffixed(u32),
    /// An identical file already exists at the returned path
    Duplicate,
}

/// `{stem}_{n}{.ext}` next to `candidate`
pub fn suffixed_path(candidate: &Path, n: u32) -> PathBuf {
    let mut file_name: OsString = candidate.file_stem().map(OsString::from).unwrap_or_default();
    file_name.push(format!("_{n}"));
    if let Some(extension) = candidate.extension() {
        file_name.push(".");
        file_name.push(extension);
    }
    candidate.with_file_name(file_name)
}

/// Find where `source` may be placed, starting from `candidate`.
///
/// Existence is checked again on every attempt. An occupied path holding an
/// identical file is a duplicate only when `remove_duplicates` is set;
/// otherwise the numeric suffix is increased until a free name is found.
pub fn resolve(
    candidate: &Path,
    source: &Path,
    remove_duplicates: bool,
    hasher: &ContentHasher,
) -> Result<(PathBuf, Resolution)> {
    let mut path = candidate.to_path_buf();
    let mut append = 0;
    let mut duplicates = DuplicateCheck::new(source, hasher);

    loop {
        let Ok(metadata) = path.symlink_metadata() else {
            let resolution = if append == 0 {
                Resolution::Available
            } else {
                Resolution::Suffixed(append)
            };
            return Ok((path, resolution));
        };

        if remove_duplicates && metadata.is_file() && duplicates.matches(&path, metadata.len())? {
            debug!("{} is identical to {}", source.display(), path.display());
            return Ok((path, Resolution::Duplicate));
        }

        append += 1;
        path = suffixed_path(candidate, append);
    }
}

/// Compares one source against successive occupants. The source size and
/// digest are read at most once per resolution.
struct DuplicateCheck<'a> {
    source: &'a Path,
    hasher: &'a ContentHasher,
    size: Option<u64>,
    digest: Option<u128>,
}

impl<'a> DuplicateCheck<'a> {
    const fn new(source: &'a Path, hasher: &'a ContentHasher) -> Self {
        Self {
            source,
            hasher,
            size: None,
            digest: None,
        }
    }

    fn matches(&mut self, occupant: &Path, occupant_size: u64) -> Result<bool> {
        let size = match self.size {
            Some(size) => size,
            None => {
                let size = fs::metadata(self.source)
                    .with_context(|| format!("Failed to read file metadata: {}", self.source.display()))?
                    .len();
                *self.size.insert(size)
            }
        };
        if size != occupant_size {
            return Ok(false);
        }

        let digest = match self.digest {
            Some(digest) => digest,
            None => *self.digest.insert(self.hasher.calculate_file_hash(self.source)?),
        };
        if self.hasher.calculate_file_hash(occupant)? != digest {
            return Ok(false);
        }

        self.hasher.files_identical(self.source, occupant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(suffixed_path(Path::new("/d/a.jpg"), 1), Path::new("/d/a_1.jpg"));
        assert_eq!(suffixed_path(Path::new("/d/a.tar.gz"), 12), Path::new("/d/a.tar_12.gz"));
        assert_eq!(suffixed_path(Path::new("/d/noext"), 2), Path::new("/d/noext_2"));
    }

    #[test]
    fn free_path_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.jpg");
        fs::write(&source, b"a").unwrap();
        let candidate = dir.path().join("dest.jpg");

        let (path, resolution) = resolve(&candidate, &source, true, &ContentHasher::new()).unwrap();
        assert_eq!(path, candidate);
        assert_eq!(resolution, Resolution::Available);
    }

    #[test]
    fn identical_file_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.jpg");
        let candidate = dir.path().join("dest.jpg");
        fs::write(&source, b"same").unwrap();
        fs::write(&candidate, b"same").unwrap();

        let (path, resolution) = resolve(&candidate, &source, true, &ContentHasher::new()).unwrap();
        assert_eq!(path, candidate);
        assert_eq!(resolution, Resolution::Duplicate);
    }

    #[test]
    fn identical_file_is_suffixed_when_keeping_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.jpg");
        let candidate = dir.path().join("dest.jpg");
        fs::write(&source, b"same").unwrap();
        fs::write(&candidate, b"same").unwrap();

        let (path, resolution) = resolve(&candidate, &source, false, &ContentHasher::new()).unwrap();
        assert_eq!(path, dir.path().join("dest_1.jpg"));
        assert_eq!(resolution, Resolution::Suffixed(1));
    }

    #[test]
    fn suffix_increments_past_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.jpg");
        let candidate = dir.path().join("dest.jpg");
        fs::write(&source, b"new").unwrap();
        fs::write(&candidate, b"old0").unwrap();
        fs::write(dir.path().join("dest_1.jpg"), b"old1").unwrap();
        fs::create_dir(dir.path().join("dest_2.jpg")).unwrap();

        let (path, resolution) = resolve(&candidate, &source, true, &ContentHasher::new()).unwrap();
        assert_eq!(path, dir.path().join("dest_3.jpg"));
        assert_eq!(resolution, Resolution::Suffixed(3));
    }

    #[test]
    fn same_size_different_bytes_is_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.jpg");
        let candidate = dir.path().join("dest.jpg");
        let mut data = vec![9u8; 100_000];
        fs::write(&source, &data).unwrap();
        *data.last_mut().unwrap() = 0;
        fs::write(&candidate, &data).unwrap();

        let (path, resolution) = resolve(&candidate, &source, true, &ContentHasher::new()).unwrap();
        assert_eq!(path, dir.path().join("dest_1.jpg"));
        assert_eq!(resolution, Resolution::Suffixed(1));
        assert_eq!(fs::read(&candidate).unwrap(), data);
    }

    #[test]
    fn duplicate_found_under_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.jpg");
        let candidate = dir.path().join("dest.jpg");
        fs::write(&source, b"mine").unwrap();
        fs::write(&candidate, b"other").unwrap();
        fs::write(dir.path().join("dest_1.jpg"), b"mine").unwrap();

        let (path, resolution) = resolve(&candidate, &source, true, &ContentHasher::new()).unwrap();
        assert_eq!(path, dir.path().join("dest_1.jpg"));
        assert_eq!(resolution, Resolution::Duplicate);
    }
}
