/**
 * sortphotos: sort photos and videos into date-based folders
 *
 * Dates come from filename patterns, embedded EXIF data or, failing both,
 * the file modification time.
 */

use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use sortphotos_rs::config::{DEFAULT_EXTENSIONS, DEFAULT_TEMPLATE, DEFAULT_THUMBNAIL_MARKER};
use sortphotos_rs::file_ops::find_media_files;
use sortphotos_rs::naming::DirTemplate;
use sortphotos_rs::progress::BarReporter;
use sortphotos_rs::{FileProcessor, ProcessResult, RunSummary, SortOptions, TransferMode};

#[derive(Parser)]
#[command(name = "sortphotos")]
#[command(version)]
#[command(about = "Sort files (primarily photos and videos) into folders by date")]
#[command(long_about = "Sort files (primarily photos and videos) into folders by date.

The date comes from a known filename pattern (IMG_YYYYMMDD_HHMMSS, VID_..., WP_..., Screenshot_...),
then from EXIF data (DateTimeOriginal, DateTimeDigitized, DateTime), and finally from the file
modification time.

Renamed files look like 2014-09-04_141500_FinePix.jpg. Files that collide with a different file
get _1, _2, ... suffixes. Files identical to one already sorted are skipped.")]
struct Cli {
    /// Source directory (searched recursively)
    src_dir: PathBuf,

    /// Destination directory
    dest_dir: PathBuf,

    /// Move files instead of copying them
    #[arg(short = 'm', long = "move")]
    move_files: bool,

    /// Destination folder structure as a date format; '/' separates subdirectories on every OS
    #[arg(short, long, default_value = DEFAULT_TEMPLATE)]
    sort: String,

    /// Keep a file that is identical to one already sorted (it gets a numeric suffix)
    #[arg(long)]
    keep_duplicates: bool,

    /// File types to sort
    #[arg(long, num_args = 1.., default_values_t = DEFAULT_EXTENSIONS.map(String::from))]
    extensions: Vec<String>,

    /// Do not read EXIF data. Files whose names match no known pattern are then
    /// dated by modification time and keep their original names
    #[arg(long)]
    ignore_exif: bool,

    /// Do not derive dates from known filename patterns
    #[arg(long)]
    ignore_patterns: bool,

    /// Hour of day that a new day begins (0-23); earlier files go to the previous day
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=23))]
    day_begins: u32,

    /// Do not rename files
    #[arg(long)]
    keep_filenames: bool,

    /// Remove source subdirectories left empty after sorting
    #[arg(long)]
    prune_empty: bool,

    /// Skip paths containing this text (generated thumbnails); empty disables
    #[arg(long, default_value = DEFAULT_THUMBNAIL_MARKER)]
    thumbnail_marker: String,

    /// List the files that would be sorted and exit
    #[arg(long)]
    list: bool,

    /// Increase verbosity (-v=INFO, -vv=DEBUG, -vvv=TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_options(self) -> Result<SortOptions> {
        let mut options = SortOptions::new(self.src_dir, self.dest_dir);
        options.mode = if self.move_files {
            TransferMode::Move
        } else {
            TransferMode::Copy
        };
        options.remove_duplicates = !self.keep_duplicates;
        options.set_extensions(&self.extensions);
        options.template = DirTemplate::parse(&self.sort)?;
        options.day_begins = self.day_begins;
        options.use_metadata = !self.ignore_exif;
        options.use_patterns = !self.ignore_patterns;
        options.rename = !self.keep_filenames;
        options.prune_empty = self.prune_empty;
        options.thumbnail_marker = Some(self.thumbnail_marker).filter(|marker| !marker.is_empty());
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose)?;

    info!("Starting sortphotos");

    let list_only = cli.list;
    let options = cli.into_options()?;

    if list_only {
        options.preflight()?;
        let files = find_media_files(&options.source, &options.extensions, options.thumbnail_marker.as_deref())?;
        for file in &files {
            println!("{}", file.display());
        }
        println!("{} files", files.len());
        return Ok(());
    }

    info!(
        "Sorting {} into {} ({}, format '{}')",
        options.source.display(),
        options.destination.display(),
        options.mode,
        options.template.as_str()
    );

    let reporter = BarReporter::new(0);
    let processor = FileProcessor::new(options);
    let results = processor.run(&reporter)?;

    print_summary(&results);
    Ok(())
}

fn setup_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    Ok(())
}

fn print_summary(results: &[ProcessResult]) {
    let summary = RunSummary::from_results(results);

    println!("\nSorting complete!");
    println!("Files processed: {}", summary.processed);
    println!("Files moved: {}", summary.moved);
    println!("Files copied: {}", summary.copied);
    println!("Files placed with suffix: {}", summary.suffixed);
    println!("Duplicates skipped: {}", summary.duplicates);
    println!("Dated by file time: {}", summary.degraded);
    println!("Errors: {}", summary.errors);

    if summary.errors > 0 {
        println!("\nErrors:");
        for result in results.iter().filter(|r| !r.success()) {
            println!(
                "  {}: {}",
                result.file_path.display(),
                result.error.as_deref().unwrap_or("Unknown error")
            );
        }
    }
}
