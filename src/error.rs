/**
 * Fatal error types, raised before any file is touched
 */

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SortError {
    #[error("Source directory does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Destination directory does not exist: {}", .0.display())]
    DestinationMissing(PathBuf),

    #[error("Invalid directory format '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("No file extensions to sort")]
    NoExtensions,
}
