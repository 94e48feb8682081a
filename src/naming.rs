/**
 * Destination naming: directory template expansion and file name synthesis
 */

use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::date::ResolvedDate;
use crate::error::SortError;

/// Characters allowed in a tag embedded in a file name
fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

/// Strip everything outside `[A-Za-z0-9._-]`
pub fn sanitize_tag(tag: &str) -> String {
    tag.chars().filter(|c| is_allowed(*c)).collect()
}

/// strftime-like directory layout where `/` always separates directories,
/// e.g. `%Y/%m` or `%Y/%m-%b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirTemplate {
    format: String,
}

impl DirTemplate {
    pub fn parse(format: &str) -> Result<Self, SortError> {
        let invalid = |reason: &str| SortError::InvalidTemplate {
            template: format.to_string(),
            reason: reason.to_string(),
        };

        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(invalid("unknown format specifier"));
        }
        if format.split('/').any(|component| component == "..") {
            return Err(invalid("parent directory components are not allowed"));
        }

        let template = Self {
            format: format.to_string(),
        };

        // specifiers such as %z need a timezone and only fail when rendered
        let probe = NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|date| date.and_hms_opt(12, 0, 0))
            .ok_or_else(|| invalid("probe date"))?;
        template
            .expand(&probe)
            .map_err(|_| invalid("format specifier needs a timezone"))?;

        Ok(template)
    }

    pub fn as_str(&self) -> &str {
        &self.format
    }

    /// Expand against a date and split into directory components
    pub fn expand(&self, datetime: &NaiveDateTime) -> Result<Vec<String>, std::fmt::Error> {
        let mut expanded = String::new();
        write!(expanded, "{}", datetime.format(&self.format))?;

        Ok(expanded
            .split('/')
            .filter(|component| !component.is_empty() && *component != ".")
            .map(str::to_string)
            .collect())
    }
}

impl Default for DirTemplate {
    fn default() -> Self {
        Self {
            format: crate::config::DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Directory components below the destination root plus the file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPath {
    pub dirs: Vec<String>,
    pub file_name: String,
}

impl DestinationPath {
    pub fn dir_under(&self, root: &Path) -> PathBuf {
        let mut dir = root.to_path_buf();
        dir.extend(&self.dirs);
        dir
    }

    pub fn path_under(&self, root: &Path) -> PathBuf {
        self.dir_under(root).join(&self.file_name)
    }

    /// Create missing directories, existing ones are left alone
    pub fn create_dirs(&self, root: &Path) -> Result<PathBuf> {
        let dir = self.dir_under(root);
        if !dir.is_dir() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create target directory: {}", dir.display()))?;
        }
        Ok(dir)
    }
}

/// Build the destination for a file.
///
/// Renamed files are `{YYYY-MM-DD_HHMMSS}_{tag}{.ext}` with a lower-cased
/// extension. The tag defaults to the original basename. Degraded dates and
/// disabled renaming keep the original file name.
pub fn compose(
    date: &ResolvedDate,
    tag: Option<&str>,
    source: &Path,
    template: &DirTemplate,
    rename: bool,
) -> Result<DestinationPath> {
    let dirs = template
        .expand(&date.datetime)
        .with_context(|| format!("Failed to expand directory format '{}'", template.as_str()))?;

    let original_name = source
        .file_name()
        .with_context(|| format!("Source has no file name: {}", source.display()))?
        .to_string_lossy()
        .into_owned();

    let file_name = if rename && !date.degraded {
        renamed_file_name(date, tag, source)
    } else {
        original_name
    };

    Ok(DestinationPath { dirs, file_name })
}

fn renamed_file_name(date: &ResolvedDate, tag: Option<&str>, source: &Path) -> String {
    let basename = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let tag = sanitize_tag(tag.unwrap_or(&basename));
    if tag.is_empty() {
        format!("{}{}", date.file_stamp(), extension)
    } else {
        format!("{}_{}{}", date.file_stamp(), tag, extension)
    }
}
