/**
 * Date normalization: validation of raw date strings, noon default,
 * early-morning rollback and the file modification time fallback
 */

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Where a date came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrigin {
    PatternMatch,
    EmbeddedMetadata,
    FilesystemTimestamp,
}

impl fmt::Display for DateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DateOrigin::PatternMatch => "pattern-match",
            DateOrigin::EmbeddedMetadata => "embedded-metadata",
            DateOrigin::FilesystemTimestamp => "filesystem-timestamp",
        };
        f.write_str(name)
    }
}

/// Unvalidated date string as found in a filename or a metadata field,
/// e.g. `2021:01:02 00:30:00` or `2013:12:25`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDate {
    pub text: String,
    pub origin: DateOrigin,
}

impl RawDate {
    pub fn new(text: impl Into<String>, origin: DateOrigin) -> Self {
        Self {
            text: text.into(),
            origin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("empty date")]
    Empty,
    #[error("expected three date components in '{0}'")]
    DateComponents(String),
    #[error("expected three time components in '{0}'")]
    TimeComponents(String),
    #[error("non-numeric component in '{0}'")]
    NotNumeric(String),
    #[error("zero year in '{0}'")]
    ZeroYear(String),
    #[error("date or time out of range in '{0}'")]
    OutOfRange(String),
}

/// A validated calendar date-time.
///
/// `degraded` is set when the date comes from the filesystem because every
/// extraction attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub datetime: NaiveDateTime,
    pub origin: DateOrigin,
    pub degraded: bool,
}

impl ResolvedDate {
    /// Fallback date from the file modification time, in local time
    pub fn from_modified(path: &Path, day_begins: u32, degraded: bool) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;
        let mtime = metadata
            .modified()
            .context("Failed to get file modification time")?;

        let local = DateTime::<Local>::from(mtime).naive_local();

        Ok(Self {
            datetime: apply_day_begins(local, day_begins),
            origin: DateOrigin::FilesystemTimestamp,
            degraded,
        })
    }

    /// `YYYY-MM-DD_HHMMSS`, the date part of a renamed file
    pub fn file_stamp(&self) -> String {
        self.datetime.format("%Y-%m-%d_%H%M%S").to_string()
    }
}

/// Check a raw date string without building a `ResolvedDate`
pub fn is_valid(text: &str) -> bool {
    parse_raw(text).is_ok()
}

/// Validate and canonicalize a raw date, then apply the early-morning rollback
pub fn normalize(raw: &RawDate, day_begins: u32) -> Result<ResolvedDate, DateError> {
    let datetime = parse_raw(&raw.text)?;

    Ok(ResolvedDate {
        datetime: apply_day_begins(datetime, day_begins),
        origin: raw.origin,
        degraded: false,
    })
}

/// Parse `YYYY:MM:DD[ HH:MM:SS]`. The date part may also use `-`.
/// Missing time defaults to noon.
pub fn parse_raw(text: &str) -> Result<NaiveDateTime, DateError> {
    let mut elements = text.split_whitespace();
    let date_part = elements.next().ok_or(DateError::Empty)?;
    let time_part = elements.next();

    let date_entries: Vec<&str> = date_part.split([':', '-']).collect();
    if date_entries.len() != 3 {
        return Err(DateError::DateComponents(text.to_string()));
    }
    let [year, month, day] = parse_components(&date_entries, text)?;
    if year == 0 {
        return Err(DateError::ZeroYear(text.to_string()));
    }

    let time = match time_part {
        Some(time_part) => {
            let time_entries: Vec<&str> = time_part.split(':').collect();
            if time_entries.len() != 3 {
                return Err(DateError::TimeComponents(text.to_string()));
            }
            let [hour, minute, second] = parse_components(&time_entries, text)?;
            NaiveTime::from_hms_opt(hour, minute, second)
                .ok_or_else(|| DateError::OutOfRange(text.to_string()))?
        }
        // noon avoids pulling undated files towards midnight
        None => NaiveTime::from_hms_opt(12, 0, 0).ok_or_else(|| DateError::OutOfRange(text.to_string()))?,
    };

    let date = i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
        .ok_or_else(|| DateError::OutOfRange(text.to_string()))?;

    Ok(date.and_time(time))
}

fn parse_components(entries: &[&str], text: &str) -> Result<[u32; 3], DateError> {
    let mut values = [0u32; 3];
    for (value, entry) in values.iter_mut().zip(entries) {
        if entry.is_empty() || !entry.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DateError::NotNumeric(text.to_string()));
        }
        *value = entry
            .parse()
            .map_err(|_| DateError::OutOfRange(text.to_string()))?;
    }
    Ok(values)
}

/// Files taken before `day_begins` o'clock belong to the previous day
pub fn apply_day_begins(datetime: NaiveDateTime, day_begins: u32) -> NaiveDateTime {
    let hour = datetime.hour();
    if hour < day_begins {
        datetime - Duration::hours(i64::from(hour) + 1)
    } else {
        datetime
    }
}
