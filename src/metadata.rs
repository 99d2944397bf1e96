//! Per-file metadata extraction and model resolution.
//!
//! The [`Extractor`] turns one image file into a [`PhotoRecord`]. It reads the
//! file once and asks three independent sources about it:
//!
//! - **Embedded metadata**: EXIF `Make`, `Model` and `LensModel` through a
//!   [`MetadataReader`].
//! - **Filename**: the ordered rule table of the [`ModelDetector`], plus
//!   product-code inference when enabled.
//! - **Recognized text**: a [`TextRecognizer`], cached by image content.
//!
//! ## Resolution priority
//!
//! The first source that yields a non-empty label wins:
//!
//! ```text
//! prefer = "embedded":  embedded → filename → text code → "unknown"
//! prefer = "filename":  filename → embedded → text code → "unknown"
//! ```
//!
//! Embedded metadata names the body that actually took the picture, while a
//! filename rule is a guess, hence the default. Text codes only count when
//! `detect.infer_codes` is on.
//!
//! ## Failure policy
//!
//! Only an unreadable file fails extraction. Corrupt EXIF leaves `device`
//! empty, an undecodable header leaves `dimensions` empty, and a failed or
//! timed-out recognition leaves `extracted_text` empty. Each is logged.

use crate::cache::{OcrCache, OcrStats, cache_key, hash_bytes, hash_params};
use crate::config::{GalleryConfig, ModelPreference};
use crate::detect::{ModelDetector, code_from_text};
use crate::embedded::{ExifReader, MetadataReader};
use crate::ocr::{TextRecognizer, recognizer_from_config};
use crate::types::{DeviceInfo, ModelSource, PhotoRecord, UNKNOWN_MODEL};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is empty")]
    Empty(PathBuf),
}

/// Policy knobs for model resolution and text recognition.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub prefer: ModelPreference,
    /// Recognize text only for photos no other source could name.
    pub only_unknown: bool,
    /// Cap on recognizer runs per extractor; cache hits are free.
    pub max_images: Option<usize>,
}

impl ExtractOptions {
    pub fn from_config(config: &GalleryConfig) -> Self {
        Self {
            prefer: config.detect.prefer,
            only_unknown: config.ocr.only_unknown,
            max_images: config.ocr.max_images,
        }
    }
}

/// Resolve the model label from sources in priority order.
///
/// Returns the first source with a non-empty (after trimming) label.
///
/// ```text
/// resolve_model(&[(Embedded, exif_label), (Filename, rule_label)])
/// ```
pub fn resolve_model(sources: &[(ModelSource, Option<&str>)]) -> Option<(ModelSource, String)> {
    sources.iter().find_map(|(source, label)| {
        label
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| (*source, s.to_string()))
    })
}

/// Pixel size from the image header, `None` when the format is unknown or
/// the header cannot be decoded (HEIC among them).
pub fn read_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Builds [`PhotoRecord`]s, carrying the OCR cache and statistics across
/// all files of one run.
pub struct Extractor {
    detector: ModelDetector,
    reader: Box<dyn MetadataReader>,
    recognizer: Box<dyn TextRecognizer>,
    cache: OcrCache,
    options: ExtractOptions,
    params_hash: String,
    stats: OcrStats,
}

impl Extractor {
    pub fn new(
        detector: ModelDetector,
        reader: Box<dyn MetadataReader>,
        recognizer: Box<dyn TextRecognizer>,
    ) -> Self {
        let params_hash = hash_params(&recognizer.fingerprint());
        Self {
            detector,
            reader,
            recognizer,
            cache: OcrCache::empty(),
            options: ExtractOptions::default(),
            params_hash,
            stats: OcrStats::default(),
        }
    }

    /// Production extractor: EXIF reader plus the configured recognizer.
    pub fn from_config(config: &GalleryConfig) -> Self {
        Self::new(
            ModelDetector::from_config(&config.detect),
            Box::new(ExifReader::new()),
            recognizer_from_config(&config.ocr),
        )
        .with_options(ExtractOptions::from_config(config))
    }

    pub fn with_cache(mut self, cache: OcrCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn stats(&self) -> &OcrStats {
        &self.stats
    }

    pub fn recognizer_enabled(&self) -> bool {
        self.recognizer.is_enabled()
    }

    /// Hand back the cache for saving once the run is done.
    pub fn into_cache(self) -> OcrCache {
        self.cache
    }

    /// Build the record for one file.
    pub fn extract(
        &mut self,
        path: &Path,
        source_path: &str,
        order: usize,
    ) -> Result<PhotoRecord, ExtractError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(ExtractError::Empty(path.to_path_buf()));
        }

        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.to_string());

        let device = match self.reader.read_device(&bytes) {
            Ok(device) => device,
            Err(e) => {
                warn!(file = source_path, error = %e, "ignoring unreadable embedded metadata");
                None
            }
        };

        let embedded_label = device.as_ref().and_then(DeviceInfo::label);
        let filename_label = self.detector.detect_label(&filename);
        let embedded = (ModelSource::Embedded, embedded_label.as_deref());
        let by_name = (ModelSource::Filename, filename_label.as_deref());
        let resolved = match self.options.prefer {
            ModelPreference::Embedded => resolve_model(&[embedded, by_name]),
            ModelPreference::Filename => resolve_model(&[by_name, embedded]),
        };

        let wants_text = self.recognizer.is_enabled()
            && (!self.options.only_unknown || resolved.is_none());
        let extracted_text = if wants_text {
            self.recognize(path, &bytes, source_path)
        } else {
            None
        };

        let (model_source, model) = resolved
            .or_else(|| {
                if !self.detector.infers_codes() {
                    return None;
                }
                extracted_text
                    .as_deref()
                    .and_then(code_from_text)
                    .map(|code| (ModelSource::Text, code))
            })
            .unwrap_or_else(|| (ModelSource::Fallback, UNKNOWN_MODEL.to_string()));

        let dimensions = read_dimensions(&bytes);
        if dimensions.is_none() {
            debug!(file = source_path, "image header not decodable");
        }

        debug!(file = source_path, %model, source = %model_source, "extracted");
        Ok(PhotoRecord {
            path: path.to_path_buf(),
            source_path: source_path.to_string(),
            filename,
            model,
            model_source,
            device,
            extracted_text,
            dimensions,
            order,
        })
    }

    /// Cached text, or a fresh recognizer run within the configured cap.
    fn recognize(&mut self, path: &Path, bytes: &[u8], source_path: &str) -> Option<String> {
        let key = cache_key(&hash_bytes(bytes), &self.params_hash);
        if let Some(text) = self.cache.lookup(&key) {
            self.stats.hit();
            return Some(text);
        }

        if let Some(max) = self.options.max_images
            && self.stats.runs() as usize >= max
        {
            debug!(file = source_path, max, "text recognition limit reached");
            self.stats.cap();
            return None;
        }

        match self.recognizer.recognize(path) {
            Ok(text) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                self.stats.recognize();
                self.cache.insert(key, text.clone());
                Some(text)
            }
            Ok(_) => {
                warn!(file = source_path, "text recognition printed no text");
                self.stats.fail();
                None
            }
            Err(e) => {
                warn!(file = source_path, error = %e, "text recognition failed");
                self.stats.fail();
                None
            }
        }
    }
}
