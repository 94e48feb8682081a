/**
 * Filename recognizers for device and app naming conventions
 *
 * Each recognizer turns a file name into a raw date and a fixed tag.
 * No file I/O happens here.
 */

use log::debug;
use regex::Regex;
use std::sync::LazyLock;

use crate::date::{self, DateOrigin, RawDate};

/// Date and tag recognized from a file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    pub raw: RawDate,
    pub tag: String,
}

pub trait FilenameRecognizer: Send + Sync {
    fn name(&self) -> &str;

    /// Try to recognize `file_name` (no directory part)
    fn recognize(&self, file_name: &str) -> Option<Recognition>;
}

/// Recognizer backed by a regex with named `year`, `month`, `day` and optional
/// `hour`, `minute`, `second` groups
pub struct RegexRecognizer {
    name: &'static str,
    regex: &'static LazyLock<Regex>,
    tag: &'static str,
}

impl RegexRecognizer {
    pub const fn new(name: &'static str, regex: &'static LazyLock<Regex>, tag: &'static str) -> Self {
        Self { name, regex, tag }
    }
}

impl FilenameRecognizer for RegexRecognizer {
    fn name(&self) -> &str {
        self.name
    }

    fn recognize(&self, file_name: &str) -> Option<Recognition> {
        let caps = self.regex.captures(file_name)?;
        let mut text = format!("{}:{}:{}", &caps["year"], &caps["month"], &caps["day"]);
        if let (Some(hour), Some(minute), Some(second)) = (caps.name("hour"), caps.name("minute"), caps.name("second")) {
            text.push_str(&format!(" {}:{}:{}", hour.as_str(), minute.as_str(), second.as_str()));
        }

        Some(Recognition {
            raw: RawDate::new(text, DateOrigin::PatternMatch),
            tag: self.tag.to_string(),
        })
    }
}

static RE_IMG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^IMG_(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})_(?P<hour>\d{2})(?P<minute>\d{2})(?P<second>\d{2})")
        .expect("Failed to create regex pattern for IMG_ files")
});

static RE_VID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^VID_(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})_(?P<hour>\d{2})(?P<minute>\d{2})(?P<second>\d{2})")
        .expect("Failed to create regex pattern for VID_ files")
});

static RE_WP_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^WP_(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})_(?P<hour>\d{2})_?(?P<minute>\d{2})_?(?P<second>\d{2})(?:_Pro)?\.")
        .expect("Failed to create regex pattern for WP_ files with time")
});

static RE_WP_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^WP_(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})_\d{3}\.")
        .expect("Failed to create regex pattern for numbered WP_ files")
});

static RE_SCREENSHOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Screenshot_(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})[-_](?P<hour>\d{2})(?P<minute>\d{2})(?P<second>\d{2})")
        .expect("Failed to create regex pattern for screenshots")
});

/// Ordered set of recognizers, first valid match wins
pub struct RecognizerRegistry {
    recognizers: Vec<Box<dyn FilenameRecognizer>>,
}

impl RecognizerRegistry {
    pub fn empty() -> Self {
        Self {
            recognizers: Vec::new(),
        }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(RegexRecognizer::new("android-image", &RE_IMG, "img")));
        registry.register(Box::new(RegexRecognizer::new("android-video", &RE_VID, "video")));
        registry.register(Box::new(RegexRecognizer::new("windows-phone", &RE_WP_TIME, "WP")));
        registry.register(Box::new(RegexRecognizer::new("windows-phone-sequence", &RE_WP_SEQUENCE, "WP")));
        registry.register(Box::new(RegexRecognizer::new("screenshot", &RE_SCREENSHOT, "screenshot")));
        registry
    }

    pub fn register(&mut self, recognizer: Box<dyn FilenameRecognizer>) {
        self.recognizers.push(recognizer);
    }

    pub fn len(&self) -> usize {
        self.recognizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recognizers.is_empty()
    }

    /// Recognitions whose date does not validate are ignored
    pub fn recognize(&self, file_name: &str) -> Option<Recognition> {
        self.recognizers.iter().find_map(|recognizer| {
            let recognition = recognizer.recognize(file_name)?;
            if date::is_valid(&recognition.raw.text) {
                debug!("{} matched '{}'", recognizer.name(), file_name);
                Some(recognition)
            } else {
                debug!("{} matched '{}' with an invalid date", recognizer.name(), file_name);
                None
            }
        })
    }
}

impl Default for RecognizerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognize(name: &str) -> Option<Recognition> {
        RecognizerRegistry::with_builtin().recognize(name)
    }

    #[test]
    fn android_image() {
        let recognition = recognize("IMG_20230615_141500.jpg").unwrap();
        assert_eq!(recognition.raw.text, "2023:06:15 14:15:00");
        assert_eq!(recognition.raw.origin, DateOrigin::PatternMatch);
        assert_eq!(recognition.tag, "img");
    }

    #[test]
    fn android_video_with_trailing_text() {
        let recognition = recognize("VID_20190101_235959_HDR.mp4").unwrap();
        assert_eq!(recognition.raw.text, "2019:01:01 23:59:59");
        assert_eq!(recognition.tag, "video");
    }

    #[test]
    fn windows_phone_variants() {
        let pro = recognize("WP_20140510_10_22_45_Pro.jpg").unwrap();
        assert_eq!(pro.raw.text, "2014:05:10 10:22:45");
        assert_eq!(pro.tag, "WP");

        let compact = recognize("WP_20140510_102245.jpg").unwrap();
        assert_eq!(compact.raw.text, "2014:05:10 10:22:45");

        let numbered = recognize("WP_20131225_001.jpg").unwrap();
        assert_eq!(numbered.raw.text, "2013:12:25");
        assert_eq!(numbered.tag, "WP");
    }

    #[test]
    fn screenshot() {
        let recognition = recognize("Screenshot_20190919-053857.png").unwrap();
        assert_eq!(recognition.raw.text, "2019:09:19 05:38:57");
        assert_eq!(recognition.tag, "screenshot");
    }

    #[test]
    fn unrelated_names_are_not_recognized() {
        assert!(recognize("DSC_0001.JPG").is_none());
        assert!(recognize("holiday.jpg").is_none());
        assert!(recognize("my_IMG_20230615_141500.jpg").is_none());
    }

    #[test]
    fn invalid_dates_fall_through() {
        assert!(recognize("IMG_20231345_141500.jpg").is_none());
        assert!(recognize("IMG_00000000_000000.jpg").is_none());
    }

    #[test]
    fn custom_recognizer_can_be_registered() {
        struct Fixed;
        impl FilenameRecognizer for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            fn recognize(&self, file_name: &str) -> Option<Recognition> {
                file_name.starts_with("scan").then(|| Recognition {
                    raw: RawDate::new("1999:12:31", DateOrigin::PatternMatch),
                    tag: "scan".to_string(),
                })
            }
        }

        let mut registry = RecognizerRegistry::empty();
        assert!(registry.is_empty());
        registry.register(Box::new(Fixed));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.recognize("scan42.tif").unwrap().tag, "scan");
        assert!(registry.recognize("IMG_20230615_141500.jpg").is_none());
    }
}
