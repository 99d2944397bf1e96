//! CLI output formatting for the scan and build stages.
//!
//! Output is **photo-centric**: each entry leads with its position and
//! display title, then the model it was assigned, with the source file and
//! other facts as indented context lines.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Photos
//! 001 IMG 0042 → iPhone (filename)
//!     Source: IMG_0042.HEIC
//!     Device: Apple iPhone 13
//!     Size: 4032 × 3024
//!     Text: MODEL D5301-1 Made in China
//! 002 DSC 0001 → unknown
//!     Source: DSC_0001.jpg
//!
//! Skipped
//!     broken.jpg: broken.jpg is empty
//! ```
//!
//! ## Build
//!
//! ```text
//! Home → index.html
//! 001 iPhone (1 photo) → models/iphone.html
//!     001 IMG 0042 → photos/img-0042.html
//! 002 unknown (1 photo) → models/unknown.html
//!     001 DSC 0001 → photos/dsc-0001.html
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects. Diagnostics go through `tracing` instead.

use crate::cache::OcrStats;
use crate::generate::{BuildSummary, plan_site};
use crate::naming::display_title;
use crate::scan::ScanReport;
use crate::types::{ModelSource, PhotoRecord};

const TEXT_PREVIEW_CHARS: usize = 60;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Collapse whitespace and cut to `max` characters, appending `...` if cut.
fn preview_text(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    }
}

/// Header line for one photo: index, title and assigned model.
///
/// ```text
/// 001 IMG 0042 → iPhone (filename)
/// 002 DSC 0001 → unknown
/// ```
fn photo_line(record: &PhotoRecord) -> String {
    let title = display_title(&record.filename);
    let index = format_index(record.order + 1);
    match record.model_source {
        ModelSource::Fallback => format!("{index} {title} → {}", record.model),
        source => format!("{index} {title} → {} ({source})", record.model),
    }
}

// ============================================================================
// Scan
// ============================================================================

pub fn format_scan_output(report: &ScanReport) -> Vec<String> {
    let mut lines = Vec::new();

    if report.records.is_empty() {
        lines.push("No photos found".to_string());
    } else {
        lines.push("Photos".to_string());
        for record in &report.records {
            lines.push(photo_line(record));
            lines.push(format!("{}Source: {}", indent(1), record.source_path));
            if let Some(label) = record.device.as_ref().and_then(|d| d.label()) {
                lines.push(format!("{}Device: {}", indent(1), label));
            }
            if let Some(lens) = record.device.as_ref().and_then(|d| d.lens.as_deref()) {
                lines.push(format!("{}Lens: {}", indent(1), lens));
            }
            if let Some((w, h)) = record.dimensions {
                lines.push(format!("{}Size: {} × {}", indent(1), w, h));
            }
            if let Some(text) = &record.extracted_text {
                lines.push(format!(
                    "{}Text: {}",
                    indent(1),
                    preview_text(text, TEXT_PREVIEW_CHARS)
                ));
            }
        }
    }

    if !report.skipped.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for skipped in &report.skipped {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                skipped.source_path,
                skipped.reason
            ));
        }
    }

    lines
}

pub fn print_scan_output(report: &ScanReport) {
    for line in format_scan_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Page map of the site built from `records`.
pub fn format_build_output(records: &[PhotoRecord]) -> Vec<String> {
    let mut lines = vec!["Home → index.html".to_string()];
    for (i, group) in plan_site(records).iter().enumerate() {
        lines.push(format!(
            "{} {} ({}) → models/{}.html",
            format_index(i + 1),
            group.label,
            plural(group.photos.len(), "photo", "photos"),
            group.slug
        ));
        for (j, photo) in group.photos.iter().enumerate() {
            lines.push(format!(
                "{}{} {} → photos/{}.html",
                indent(1),
                format_index(j + 1),
                photo.title,
                photo.slug
            ));
        }
    }
    lines
}

pub fn print_build_output(records: &[PhotoRecord]) {
    for line in format_build_output(records) {
        println!("{}", line);
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Closing lines: counts from the scan, the build and text recognition.
///
/// ```text
/// Processed 3 photos, skipped 1, 1 with unknown model
/// Text recognition: 2 cached, 1 recognized (3 total)
/// Generated 2 models, 6 pages, 3 assets
/// ```
pub fn format_summary(
    report: &ScanReport,
    ocr: Option<&OcrStats>,
    build: Option<&BuildSummary>,
) -> Vec<String> {
    let mut lines = vec![format!(
        "Processed {}, skipped {}, {} with unknown model",
        plural(report.records.len(), "photo", "photos"),
        report.skipped.len(),
        report.unknown_count()
    )];
    if let Some(stats) = ocr {
        lines.push(format!("Text recognition: {}", stats));
    }
    if let Some(summary) = build {
        lines.push(format!(
            "Generated {}, {}, {}",
            plural(summary.models, "model", "models"),
            plural(summary.pages, "page", "pages"),
            plural(summary.assets, "asset", "assets")
        ));
    }
    lines
}

pub fn print_summary(report: &ScanReport, ocr: Option<&OcrStats>, build: Option<&BuildSummary>) {
    for line in format_summary(report, ocr, build) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::SkippedFile;
    use crate::test_helpers::record;
    use crate::types::DeviceInfo;
    use std::path::Path;

    fn sample_report() -> ScanReport {
        let mut iphone = record(Path::new("/in/IMG_0042.HEIC"), "Apple iPhone 13", 0);
        iphone.model_source = ModelSource::Embedded;
        iphone.device = Some(DeviceInfo {
            make: Some("Apple".into()),
            model: Some("iPhone 13".into()),
            lens: None,
        });
        iphone.dimensions = Some((4032, 3024));
        iphone.extracted_text = Some("MODEL D5301-1\n\nMade   in China".into());

        let unknown = record(Path::new("/in/DSC_0001.jpg"), "unknown", 1);
        ScanReport {
            records: vec![iphone, unknown],
            skipped: vec![SkippedFile {
                source_path: "broken.jpg".into(),
                reason: "broken.jpg is empty".into(),
            }],
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn preview_text_flattens_and_truncates() {
        assert_eq!(preview_text("a\n\n b", 10), "a b");
        assert_eq!(preview_text("连衣裙连衣裙", 3), "连衣裙...");
    }

    #[test]
    fn scan_output_lists_photos_with_context() {
        let lines = format_scan_output(&sample_report());
        assert_eq!(lines[0], "Photos");
        assert_eq!(lines[1], "001 IMG 0042 → Apple iPhone 13 (embedded metadata)");
        assert_eq!(lines[2], "    Source: IMG_0042.HEIC");
        assert_eq!(lines[3], "    Device: Apple iPhone 13");
        assert_eq!(lines[4], "    Size: 4032 × 3024");
        assert_eq!(lines[5], "    Text: MODEL D5301-1 Made in China");
        assert_eq!(lines[6], "002 DSC 0001 → unknown");
    }

    #[test]
    fn scan_output_lists_skipped() {
        let lines = format_scan_output(&sample_report());
        let at = lines.iter().position(|l| l == "Skipped").unwrap();
        assert_eq!(lines[at + 1], "    broken.jpg: broken.jpg is empty");
    }

    #[test]
    fn scan_output_empty() {
        let lines = format_scan_output(&ScanReport::default());
        assert_eq!(lines, vec!["No photos found".to_string()]);
    }

    #[test]
    fn build_output_maps_pages() {
        let report = sample_report();
        let lines = format_build_output(&report.records);
        assert_eq!(
            lines,
            vec![
                "Home → index.html".to_string(),
                "001 Apple iPhone 13 (1 photo) → models/apple-iphone-13.html".to_string(),
                "    001 IMG 0042 → photos/img-0042.html".to_string(),
                "002 unknown (1 photo) → models/unknown.html".to_string(),
                "    001 DSC 0001 → photos/dsc-0001.html".to_string(),
            ]
        );
    }

    #[test]
    fn summary_counts() {
        let report = sample_report();
        let stats = OcrStats {
            hits: 1,
            recognized: 1,
            ..Default::default()
        };
        let build = BuildSummary {
            photos: 2,
            models: 2,
            pages: 5,
            assets: 2,
        };
        let lines = format_summary(&report, Some(&stats), Some(&build));
        assert_eq!(
            lines,
            vec![
                "Processed 2 photos, skipped 1, 1 with unknown model".to_string(),
                "Text recognition: 1 cached, 1 recognized (2 total)".to_string(),
                "Generated 2 models, 5 pages, 2 assets".to_string(),
            ]
        );
    }

    #[test]
    fn summary_without_build() {
        let lines = format_summary(&ScanReport::default(), None, None);
        assert_eq!(lines, vec!["Processed 0 photos, skipped 0, 0 with unknown model"]);
    }
}
