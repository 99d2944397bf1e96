//! Inbox enumeration.
//!
//! First stage of the pipeline. Lists the image files dropped into the inbox
//! and runs the [`Extractor`] on each, producing one [`PhotoRecord`] per
//! readable file.
//!
//! ```text
//! inbox/
//! ├── .DS_Store          # hidden: skipped
//! ├── IMG_0042.HEIC      # image
//! ├── canon_01.JPG       # image (extensions compare case-insensitively)
//! ├── notes.txt          # not an image: skipped
//! └── trip/              # descended into only with scan.recursive = true
//!     └── PXL_0001.jpg
//! ```
//!
//! ## Ordering
//!
//! Files are sorted by their `/`-separated path relative to the inbox before
//! extraction, so `order` and every page built from the records are the same
//! on every run regardless of directory iteration order.
//!
//! ## Failures
//!
//! A missing or unlistable inbox is fatal. A file or subdirectory that cannot
//! be read is reported as a [`SkippedFile`] and the scan goes on; an empty
//! inbox is a valid result.

use crate::config::GalleryConfig;
use crate::metadata::Extractor;
use crate::types::PhotoRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Inbox directory not found: {0}")]
    InboxMissing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot walk inbox: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Which files count as images, and where to look for them.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lowercased extensions without the dot.
    pub extensions: Vec<String>,
    pub recursive: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&GalleryConfig::default())
    }
}

impl ScanOptions {
    pub fn from_config(config: &GalleryConfig) -> Self {
        Self {
            extensions: config
                .scan
                .extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            recursive: config.scan.recursive,
        }
    }

    fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }
}

/// An image that was found but produced no record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub source_path: String,
    pub reason: String,
}

/// Result of scanning the inbox.
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub records: Vec<PhotoRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
}

impl ScanReport {
    pub fn unknown_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_unknown()).count()
    }
}

/// What [`discover`] found in the inbox.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Image files as `(path, inbox-relative path)`, sorted by the relative path.
    pub files: Vec<(PathBuf, String)>,
    /// Entries below the inbox that could not be listed.
    pub skipped: Vec<SkippedFile>,
}

/// List the inbox's image files.
///
/// Only the inbox itself must be readable. An error on anything below it is
/// logged and recorded in [`Discovery::skipped`].
pub fn discover(inbox: &Path, options: &ScanOptions) -> Result<Discovery, ScanError> {
    if !inbox.is_dir() {
        return Err(ScanError::InboxMissing(inbox.to_path_buf()));
    }

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut found = Discovery::default();
    for entry in WalkDir::new(inbox)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                let source_path = e
                    .path()
                    .map(|p| relative_path(inbox, p))
                    .unwrap_or_default();
                warn!(path = %source_path, error = %e, "skipping unreadable entry");
                if !source_path.is_empty() {
                    found.skipped.push(SkippedFile {
                        source_path,
                        reason: e.to_string(),
                    });
                }
                continue;
            }
        };
        if !entry.file_type().is_file() || !options.is_image(entry.path()) {
            continue;
        }
        let source_path = relative_path(inbox, entry.path());
        found.files.push((entry.into_path(), source_path));
    }

    found.files.sort_by(|a, b| a.1.cmp(&b.1));
    found.skipped.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    Ok(found)
}

/// Discover the inbox's images and extract a record for each.
pub fn scan(
    inbox: &Path,
    extractor: &mut Extractor,
    options: &ScanOptions,
) -> Result<ScanReport, ScanError> {
    let Discovery { files, skipped } = discover(inbox, options)?;
    debug!(inbox = %inbox.display(), files = files.len(), "scanning inbox");

    let mut report = ScanReport {
        skipped,
        ..ScanReport::default()
    };
    for (path, source_path) in files {
        let order = report.records.len();
        match extractor.extract(&path, &source_path, order) {
            Ok(record) => report.records.push(record),
            Err(e) => {
                warn!(file = %source_path, error = %e, "skipping file");
                report.skipped.push(SkippedFile {
                    source_path,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ModelDetector, default_rules};
    use crate::embedded::tests::MockReader;
    use crate::ocr::tests::MockRecognizer;
    use crate::test_helpers::write_inbox;
    use std::fs;
    use tempfile::TempDir;

    fn extractor_with(recognizer: MockRecognizer) -> Extractor {
        Extractor::new(
            ModelDetector::new(&default_rules()),
            Box::new(MockReader::new()),
            Box::new(recognizer),
        )
    }

    fn extractor() -> Extractor {
        extractor_with(MockRecognizer::new())
    }

    fn names(report: &ScanReport) -> Vec<&str> {
        report.records.iter().map(|r| r.source_path.as_str()).collect()
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    #[test]
    fn only_images_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        write_inbox(tmp.path(), &["b.jpg", "a.png", "c.txt"]);

        let report = scan(tmp.path(), &mut extractor(), &ScanOptions::default()).unwrap();
        assert_eq!(names(&report), vec!["a.png", "b.jpg"]);
        assert_eq!(report.records[0].order, 0);
        assert_eq!(report.records[1].order, 1);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        write_inbox(tmp.path(), &["A.JPG", "b.Heic", "c.WebP", "d.gif"]);

        let report = scan(tmp.path(), &mut extractor(), &ScanOptions::default()).unwrap();
        assert_eq!(names(&report), vec!["A.JPG", "b.Heic", "c.WebP"]);
    }

    #[test]
    fn hidden_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_inbox(tmp.path(), &[".hidden.jpg", "shown.jpg"]);

        let report = scan(tmp.path(), &mut extractor(), &ScanOptions::default()).unwrap();
        assert_eq!(names(&report), vec!["shown.jpg"]);
    }

    #[test]
    fn subdirectories_ignored_unless_recursive() {
        let tmp = TempDir::new().unwrap();
        write_inbox(tmp.path(), &["top.jpg", "trip/PXL_1.jpg", ".cache/x.jpg"]);

        let flat = scan(tmp.path(), &mut extractor(), &ScanOptions::default()).unwrap();
        assert_eq!(names(&flat), vec!["top.jpg"]);

        let options = ScanOptions {
            recursive: true,
            ..ScanOptions::default()
        };
        let deep = scan(tmp.path(), &mut extractor(), &options).unwrap();
        assert_eq!(names(&deep), vec!["top.jpg", "trip/PXL_1.jpg"]);
        assert_eq!(deep.records[1].filename, "PXL_1.jpg");
        assert_eq!(deep.records[1].model, "Pixel");
    }

    #[test]
    fn custom_extensions_are_normalized() {
        let mut config = GalleryConfig::default();
        config.scan.extensions = vec![".TIFF".into(), " ".into()];
        let options = ScanOptions::from_config(&config);
        assert_eq!(options.extensions, vec!["tiff".to_string()]);
    }

    #[test]
    fn empty_inbox_is_valid() {
        let tmp = TempDir::new().unwrap();
        let report = scan(tmp.path(), &mut extractor(), &ScanOptions::default()).unwrap();
        assert!(report.records.is_empty());
        assert!(report.skipped.is_empty());
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn missing_inbox_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let result = scan(
            &tmp.path().join("nope"),
            &mut extractor(),
            &ScanOptions::default(),
        );
        assert!(matches!(result, Err(ScanError::InboxMissing(_))));
    }

    #[test]
    fn inbox_that_is_a_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("inbox");
        fs::write(&file, "x").unwrap();
        let result = scan(&file, &mut extractor(), &ScanOptions::default());
        assert!(matches!(result, Err(ScanError::InboxMissing(_))));
    }

    #[test]
    fn unreadable_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        write_inbox(tmp.path(), &["a.jpg", "c.jpg"]);
        fs::write(tmp.path().join("b.jpg"), "").unwrap();

        let report = scan(tmp.path(), &mut extractor(), &ScanOptions::default()).unwrap();
        assert_eq!(names(&report), vec!["a.jpg", "c.jpg"]);
        assert_eq!(report.records[1].order, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].source_path, "b.jpg");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        write_inbox(tmp.path(), &["a.jpg", "locked/b.jpg", "z.jpg"]);
        let locked = tmp.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permission bits do not apply to this user (root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let options = ScanOptions {
            recursive: true,
            ..ScanOptions::default()
        };
        let result = scan(tmp.path(), &mut extractor(), &options);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let report = result.unwrap();
        assert_eq!(names(&report), vec!["a.jpg", "z.jpg"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].source_path, "locked");
    }

    #[test]
    fn recognition_failure_keeps_record_count() {
        let tmp = TempDir::new().unwrap();
        write_inbox(tmp.path(), &["a.jpg", "b.jpg", "c.jpg"]);
        let recognizer = MockRecognizer::new()
            .text("a.jpg", "alpha")
            .failing("b.jpg")
            .text("c.jpg", "gamma");

        let mut ex = extractor_with(recognizer);
        let report = scan(tmp.path(), &mut ex, &ScanOptions::default()).unwrap();
        assert_eq!(report.records.len(), 3);
        let texts: Vec<_> = report
            .records
            .iter()
            .map(|r| r.extracted_text.as_deref())
            .collect();
        assert_eq!(texts, vec![Some("alpha"), None, Some("gamma")]);
    }

    #[test]
    fn unknown_count() {
        let tmp = TempDir::new().unwrap();
        write_inbox(tmp.path(), &["canon_1.jpg", "DSC_0001.jpg", "misc.png"]);
        let report = scan(tmp.path(), &mut extractor(), &ScanOptions::default()).unwrap();
        assert_eq!(report.unknown_count(), 2);
    }
}
