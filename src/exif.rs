/**
 * Metadata extraction
 *
 * Attempt order, first success wins:
 * 1. Filename recognizers (no I/O)
 * 2. Embedded metadata via a `MetadataReader` (kamadak-exif by default)
 * 3. Nothing: the caller falls back to the file modification time
 */

use anyhow::{Context, Result};
use exif::{In, Reader as ExifReader, Value};
use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::date::{self, DateOrigin, RawDate};
use crate::patterns::RecognizerRegistry;

/// Date fields queried in priority order
pub const DATE_FIELDS: [&str; 3] = ["DateTimeOriginal", "DateTimeDigitized", "DateTime"];

/// Device field used as the descriptive tag
pub const MODEL_FIELD: &str = "Model";

/// Source of named metadata fields for a file.
///
/// Fields that cannot be decoded are left out of the map. A file that cannot
/// be read at all is an error.
pub trait MetadataReader {
    fn read_fields(&self, path: &Path) -> Result<HashMap<String, String>>;
}

/// Reads primary IFD text fields with kamadak-exif
#[derive(Debug, Default, Clone, Copy)]
pub struct KamadakReader;

impl MetadataReader for KamadakReader {
    fn read_fields(&self, path: &Path) -> Result<HashMap<String, String>> {
        let file = File::open(path).context("Failed to open file for kamadak-exif")?;
        let mut bufreader = BufReader::new(&file);

        let exifreader = ExifReader::new();
        let exif = exifreader
            .read_from_container(&mut bufreader)
            .context("Failed to read EXIF data with kamadak-exif")?;

        let mut metadata = HashMap::new();
        for field in exif.fields().filter(|field| field.ifd_num == In::PRIMARY) {
            if let Value::Ascii(ref values) = field.value {
                let Some(first) = values.first() else {
                    continue;
                };
                let text = String::from_utf8_lossy(first);
                let text = text.trim_end_matches('\0').trim();
                if !text.is_empty() {
                    metadata.insert(field.tag.to_string(), text.to_string());
                }
            }
        }

        Ok(metadata)
    }
}

/// Result of one extraction attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub raw: Option<RawDate>,
    pub tag: Option<String>,
    pub tried_patterns: bool,
}

impl Extraction {
    /// True when some source was consulted but none produced a date
    pub fn failed(&self, use_metadata: bool) -> bool {
        self.raw.is_none() && (self.tried_patterns || use_metadata)
    }
}

pub struct MetadataExtractor {
    recognizers: RecognizerRegistry,
    reader: Box<dyn MetadataReader>,
    use_patterns: bool,
    use_metadata: bool,
}

impl MetadataExtractor {
    pub fn new(use_patterns: bool, use_metadata: bool) -> Self {
        Self::with_reader(Box::new(KamadakReader), use_patterns, use_metadata)
    }

    pub fn with_reader(reader: Box<dyn MetadataReader>, use_patterns: bool, use_metadata: bool) -> Self {
        Self {
            recognizers: RecognizerRegistry::with_builtin(),
            reader,
            use_patterns,
            use_metadata,
        }
    }

    #[must_use]
    pub fn with_recognizers(mut self, recognizers: RecognizerRegistry) -> Self {
        self.recognizers = recognizers;
        self
    }

    pub const fn uses_metadata(&self) -> bool {
        self.use_metadata
    }

    /// Find a raw date and descriptive tag for `path`. Never fails; problems
    /// are logged and the next source is tried.
    pub fn extract(&self, path: &Path) -> Extraction {
        let mut extraction = Extraction::default();

        if self.use_patterns {
            extraction.tried_patterns = true;
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                if let Some(recognition) = self.recognizers.recognize(file_name) {
                    extraction.raw = Some(recognition.raw);
                    extraction.tag = Some(recognition.tag);
                    return extraction;
                }
            }
        }

        if !self.use_metadata {
            return extraction;
        }

        let fields = match self.reader.read_fields(path) {
            Ok(fields) => fields,
            Err(e) => {
                debug!("No metadata for {}: {:#}", path.display(), e);
                return extraction;
            }
        };

        extraction.tag = fields.get(MODEL_FIELD).cloned();
        extraction.raw = select_date(&fields);
        if extraction.raw.is_none() {
            debug!("No valid date field in metadata of {}", path.display());
        }

        extraction
    }
}

/// First date field that is present and valid
pub fn select_date(fields: &HashMap<String, String>) -> Option<RawDate> {
    DATE_FIELDS.iter().find_map(|name| {
        let value = fields.get(*name)?;
        if date::is_valid(value) {
            Some(RawDate::new(value.clone(), DateOrigin::EmbeddedMetadata))
        } else {
            debug!("Ignoring invalid {}: '{}'", name, value);
            None
        }
    })
}
