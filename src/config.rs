/**
 * Run options and their defaults
 */

use std::fmt;
use std::path::PathBuf;

use crate::error::SortError;
use crate::naming::DirTemplate;

pub const DEFAULT_TEMPLATE: &str = "%Y/%m";

pub const DEFAULT_EXTENSIONS: [&str; 16] = [
    "jpg", "jpeg", "tiff", "tif", "arw", "cr2", "dng", "heic", "png", "avi", "mov", "mp4", "mts", "mkv", "3gp", "m4v",
];

/// Path substring marking generated thumbnail artifacts (Synology)
pub const DEFAULT_THUMBNAIL_MARKER: &str = "@eaDir";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Copy => f.write_str("copy"),
            TransferMode::Move => f.write_str("move"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub mode: TransferMode,
    /// Skip (copy) or delete (move) files already present with identical content
    pub remove_duplicates: bool,
    /// Lower-case extensions without the dot
    pub extensions: Vec<String>,
    pub template: DirTemplate,
    /// Hours before this belong to the previous day, 0 disables
    pub day_begins: u32,
    pub use_metadata: bool,
    pub use_patterns: bool,
    pub rename: bool,
    pub prune_empty: bool,
    pub thumbnail_marker: Option<String>,
}

impl SortOptions {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mode: TransferMode::default(),
            remove_duplicates: true,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_string()).collect(),
            template: DirTemplate::default(),
            day_begins: 0,
            use_metadata: true,
            use_patterns: true,
            rename: true,
            prune_empty: false,
            thumbnail_marker: Some(DEFAULT_THUMBNAIL_MARKER.to_string()),
        }
    }

    /// Normalize user supplied extensions: no leading dot, lower case, no repeats
    pub fn set_extensions<S: AsRef<str>>(&mut self, extensions: &[S]) {
        let mut normalized: Vec<String> = extensions
            .iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();
        self.extensions = normalized;
    }

    /// Fatal checks that run before any file is touched
    pub fn preflight(&self) -> Result<(), SortError> {
        if !self.source.is_dir() {
            return Err(SortError::SourceMissing(self.source.clone()));
        }
        if !self.destination.is_dir() {
            return Err(SortError::DestinationMissing(self.destination.clone()));
        }
        if self.extensions.is_empty() {
            return Err(SortError::NoExtensions);
        }
        Ok(())
    }
}
