pub mod cleanup;
pub mod collision;
pub mod config;
pub mod date;
pub mod error;
pub mod exif;
pub mod file_ops;
pub mod hashing;
pub mod naming;
pub mod patterns;
pub mod progress;

pub use config::{SortOptions, TransferMode};
pub use error::SortError;
pub use file_ops::{FileProcessor, PlacementOutcome, ProcessResult, RunSummary};
