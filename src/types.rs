//! Records shared by the scan, output and generate stages.
//!
//! A [`PhotoRecord`] is built once per discovered image during the scan and
//! never mutated afterwards. Optional facts (embedded device info, recognized
//! text, pixel size) are `Option`s so "absent" stays distinguishable from
//! "present but empty".

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Label used when no source could name the device.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Which source produced a record's model label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSource {
    /// EXIF `Make` / `Model` embedded in the file.
    Embedded,
    /// The filename rule table (or filename code inference).
    Filename,
    /// A product code found in the recognized text.
    Text,
    /// Nothing matched; the label is [`UNKNOWN_MODEL`].
    Fallback,
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelSource::Embedded => "embedded metadata",
            ModelSource::Filename => "filename",
            ModelSource::Text => "recognized text",
            ModelSource::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Capture device fields read from embedded EXIF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
}

impl DeviceInfo {
    pub fn is_empty(&self) -> bool {
        self.make.is_none() && self.model.is_none() && self.lens.is_none()
    }

    /// Display label for grouping: `"<make> <model>"`, without repeating the
    /// make when the model string already starts with it.
    ///
    /// - make=`Canon`, model=`Canon EOS R5` → `Canon EOS R5`
    /// - make=`Apple`, model=`iPhone 13` → `Apple iPhone 13`
    /// - make only → the make
    /// - lens only → `None`
    pub fn label(&self) -> Option<String> {
        let make = self.make.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let model = self.model.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (make, model) {
            (Some(make), Some(model)) => {
                if model.to_lowercase().starts_with(&make.to_lowercase()) {
                    Some(model.to_string())
                } else {
                    Some(format!("{make} {model}"))
                }
            }
            (None, Some(model)) => Some(model.to_string()),
            (Some(make), None) => Some(make.to_string()),
            (None, None) => None,
        }
    }
}

/// One discovered image and everything inferred about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoRecord {
    /// Location of the source file on disk.
    pub path: PathBuf,
    /// Path relative to the inbox, `/`-separated.
    pub source_path: String,
    /// Base name of the file.
    pub filename: String,
    /// Device model label, never empty.
    pub model: String,
    pub model_source: ModelSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
    /// Position in the sorted scan sequence.
    pub order: usize,
}

impl PhotoRecord {
    pub fn is_unknown(&self) -> bool {
        self.model == UNKNOWN_MODEL
    }
}
