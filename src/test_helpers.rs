//! Shared test utilities for the inbox-gallery test suite.
//!
//! Provides inbox fixtures, record builders, and a whole-tree reader for
//! comparing generated sites.
//!
//! # Usage
//!
//! ```text
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_inbox(tmp.path(), &["b.jpg", "a.png", "trip/c.heic"]);
//!
//! let rec = record(&tmp.path().join("a.png"), "Canon", 0);
//! assert_eq!(rec.model_source, ModelSource::Filename);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::types::{ModelSource, PhotoRecord, UNKNOWN_MODEL};

// =========================================================================
// Fixture setup
// =========================================================================

/// Create each named file under `root` (parents included). Each file holds
/// its own relative name, so contents are non-empty and distinct.
pub fn write_inbox(root: &Path, files: &[&str]) {
    for file in files {
        let path = root.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, file.as_bytes()).unwrap();
    }
}

/// Write a real `width` × `height` PNG.
pub fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]))
        .save(path)
        .unwrap();
}

// =========================================================================
// Record builders
// =========================================================================

/// A record for `path` as the extractor would build it from a filename rule
/// (or the fallback, for `"unknown"`).
pub fn record(path: &Path, model: &str, order: usize) -> PhotoRecord {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let model_source = if model == UNKNOWN_MODEL {
        ModelSource::Fallback
    } else {
        ModelSource::Filename
    };
    PhotoRecord {
        path: path.to_path_buf(),
        source_path: filename.clone(),
        filename,
        model: model.to_string(),
        model_source,
        device: None,
        extracted_text: None,
        dimensions: None,
        order,
    }
}

// =========================================================================
// Output inspection
// =========================================================================

/// Every file under `root`, keyed by `/`-separated relative path.
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}
