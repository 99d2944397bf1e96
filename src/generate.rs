//! Static site generation.
//!
//! Last stage of the pipeline. Groups the scanned records by model and
//! writes a self-contained site that works from any static host or straight
//! from disk (every link is relative).
//!
//! ## Output Structure
//!
//! ```text
//! site/
//! ├── .inbox-gallery             # marks the directory as generated
//! ├── index.html                 # model grid with photo counts
//! ├── style.css
//! ├── models/
//! │   ├── apple-iphone-13.html   # photo grid for one model
//! │   └── unknown.html
//! ├── photos/
//! │   └── img-0042.html          # one page per photo
//! └── assets/
//!     └── apple-iphone-13/
//!         └── img-0042.heic      # copied original
//! ```
//!
//! Groups are sorted by label with `unknown` last; photos keep scan order
//! within a group. Slugs come from [`SlugSet`], claimed in that same order,
//! so two builds of the same records produce byte-identical trees.
//!
//! ## Replacing the output
//!
//! The site is rendered into `<output>.staging` and swapped in only once it
//! is complete; an interrupted build leaves the previous site in place. The
//! output directory is only ever replaced when it is empty or carries the
//! marker file, so pointing `--output` at the wrong directory is an error,
//! not data loss.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Everything interpolated is escaped; the site intro is markdown rendered
//! with pulldown-cmark.

use crate::config::SiteConfig;
use crate::naming::{SlugSet, display_title, extension};
use crate::types::{PhotoRecord, UNKNOWN_MODEL};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Present in every generated output directory.
pub const MARKER_FILE: &str = ".inbox-gallery";

const CSS: &str = include_str!("../static/style.css");

/// Extensions browsers can display inline.
const WEB_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif"];

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Refusing to replace {0}: it is not empty and was not generated by inbox-gallery")]
    ForeignOutput(PathBuf),
    #[error("Invalid output directory: {0}")]
    InvalidOutput(PathBuf),
    #[error("Output directory {path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Counts reported after a build.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub photos: usize,
    pub models: usize,
    pub pages: usize,
    pub assets: usize,
}

/// One photo's place in the site.
#[derive(Debug, Clone)]
pub struct PlannedPhoto<'a> {
    pub record: &'a PhotoRecord,
    pub slug: String,
    pub title: String,
    /// Copied original, relative to the site root.
    pub asset: String,
}

/// All photos of one model.
#[derive(Debug, Clone)]
pub struct ModelGroup<'a> {
    pub label: String,
    pub slug: String,
    pub photos: Vec<PlannedPhoto<'a>>,
}

impl ModelGroup<'_> {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_MODEL
    }
}

/// Group records by model and assign every slug and asset path.
///
/// Pure: the same records always give the same plan.
pub fn plan_site(records: &[PhotoRecord]) -> Vec<ModelGroup<'_>> {
    let mut by_model: BTreeMap<&str, Vec<&PhotoRecord>> = BTreeMap::new();
    for record in records {
        by_model.entry(record.model.as_str()).or_default().push(record);
    }

    let mut labels: Vec<&str> = by_model.keys().copied().collect();
    labels.sort_by_key(|label| (*label == UNKNOWN_MODEL, label.to_lowercase(), *label));

    let mut model_slugs = SlugSet::new();
    let mut photo_slugs = SlugSet::new();
    let mut groups = Vec::with_capacity(labels.len());
    for label in labels {
        let model_slug = model_slugs.claim(label, "model");
        let mut members = by_model.remove(label).unwrap_or_default();
        members.sort_by(|a, b| a.order.cmp(&b.order).then(a.source_path.cmp(&b.source_path)));

        let photos = members
            .into_iter()
            .map(|record| {
                let stem = Path::new(&record.filename)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let slug = photo_slugs.claim(&stem, "photo");
                let file = match extension(&record.filename) {
                    Some(ext) => format!("{slug}.{ext}"),
                    None => slug.clone(),
                };
                PlannedPhoto {
                    record,
                    title: display_title(&record.filename),
                    asset: format!("assets/{model_slug}/{file}"),
                    slug,
                }
            })
            .collect();

        groups.push(ModelGroup {
            label: label.to_string(),
            slug: model_slug,
            photos,
        });
    }
    groups
}

/// Render the site for `records` and atomically replace `output_dir` with it.
pub fn build(
    records: &[PhotoRecord],
    output_dir: &Path,
    site: &SiteConfig,
) -> Result<BuildSummary, GenerateError> {
    check_output(output_dir)?;
    let staging = sibling(output_dir, "staging")?;
    let previous = sibling(output_dir, "previous")?;
    remove_stale(&staging)?;
    remove_stale(&previous)?;

    fs::create_dir_all(&staging).map_err(|source| GenerateError::NotWritable {
        path: staging.clone(),
        source,
    })?;

    let summary = match render_into(&staging, records, site) {
        Ok(summary) => summary,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    swap_into_place(&staging, output_dir, &previous)?;
    debug!(output = %output_dir.display(), ?summary, "site written");
    Ok(summary)
}

/// Write every file of the site into `dir`.
fn render_into(
    dir: &Path,
    records: &[PhotoRecord],
    site: &SiteConfig,
) -> Result<BuildSummary, GenerateError> {
    let groups = plan_site(records);
    let mut summary = BuildSummary {
        photos: records.len(),
        models: groups.len(),
        ..Default::default()
    };

    fs::write(dir.join(MARKER_FILE), "generated by inbox-gallery\n")?;
    fs::write(dir.join("style.css"), CSS)?;
    fs::write(
        dir.join("index.html"),
        render_index(&groups, records.len(), site).into_string(),
    )?;
    summary.pages += 1;

    if groups.is_empty() {
        return Ok(summary);
    }
    fs::create_dir_all(dir.join("models"))?;
    fs::create_dir_all(dir.join("photos"))?;

    for group in &groups {
        fs::write(
            dir.join("models").join(format!("{}.html", group.slug)),
            render_model_page(group, site).into_string(),
        )?;
        summary.pages += 1;

        for (idx, photo) in group.photos.iter().enumerate() {
            let prev = idx.checked_sub(1).and_then(|i| group.photos.get(i));
            let next = group.photos.get(idx + 1);
            fs::write(
                dir.join("photos").join(format!("{}.html", photo.slug)),
                render_photo_page(group, photo, prev, next, site).into_string(),
            )?;
            summary.pages += 1;

            if copy_asset(dir, photo)? {
                summary.assets += 1;
            }
        }
    }
    Ok(summary)
}

/// Copy the original into the staging tree. A source that vanished since
/// the scan is logged and skipped; only failures writing the tree are errors.
fn copy_asset(dir: &Path, photo: &PlannedPhoto) -> Result<bool, GenerateError> {
    let dest = dir.join(&photo.asset);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::copy(&photo.record.path, &dest) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(file = %photo.record.source_path, error = %e, "original disappeared, not copied");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Output directory handling
// ============================================================================

/// Refuse outputs that are files, or non-empty directories we did not make.
fn check_output(output_dir: &Path) -> Result<(), GenerateError> {
    if !output_dir.exists() {
        return Ok(());
    }
    if !output_dir.is_dir() {
        return Err(GenerateError::InvalidOutput(output_dir.to_path_buf()));
    }
    if is_ours_or_empty(output_dir)? {
        Ok(())
    } else {
        Err(GenerateError::ForeignOutput(output_dir.to_path_buf()))
    }
}

fn is_ours_or_empty(dir: &Path) -> io::Result<bool> {
    Ok(dir.join(MARKER_FILE).is_file() || fs::read_dir(dir)?.next().is_none())
}

/// `<output>.<suffix>` next to the output directory.
fn sibling(output_dir: &Path, suffix: &str) -> Result<PathBuf, GenerateError> {
    let name = output_dir
        .file_name()
        .ok_or_else(|| GenerateError::InvalidOutput(output_dir.to_path_buf()))?;
    let mut sibling_name = name.to_os_string();
    sibling_name.push(".");
    sibling_name.push(suffix);
    Ok(output_dir.with_file_name(sibling_name))
}

/// Remove a leftover staging or previous directory from an interrupted run.
fn remove_stale(path: &Path) -> Result<(), GenerateError> {
    if !path.exists() {
        return Ok(());
    }
    if !path.is_dir() || !is_ours_or_empty(path)? {
        return Err(GenerateError::ForeignOutput(path.to_path_buf()));
    }
    debug!(path = %path.display(), "removing stale build directory");
    fs::remove_dir_all(path)?;
    Ok(())
}

fn swap_into_place(staging: &Path, output: &Path, previous: &Path) -> Result<(), GenerateError> {
    let had_output = output.exists();
    if had_output {
        fs::rename(output, previous).map_err(|source| GenerateError::NotWritable {
            path: output.to_path_buf(),
            source,
        })?;
    }
    if let Err(source) = fs::rename(staging, output) {
        if had_output {
            let _ = fs::rename(previous, output);
        }
        return Err(GenerateError::NotWritable {
            path: output.to_path_buf(),
            source,
        });
    }
    if had_output {
        fs::remove_dir_all(previous)?;
    }
    Ok(())
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure. `root` is the relative path
/// back to the site root (`""` or `"../"`).
fn base_document(title: &str, root: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href={ (root) "style.css" };
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

fn site_header(breadcrumb: Markup) -> Markup {
    html! {
        header.site-header {
            nav.breadcrumb {
                (breadcrumb)
            }
        }
    }
}

fn photo_count(n: usize) -> String {
    match n {
        1 => "1 photo".to_string(),
        n => format!("{n} photos"),
    }
}

fn is_web_image(photo: &PlannedPhoto) -> bool {
    extension(&photo.record.filename).is_some_and(|ext| WEB_EXTENSIONS.contains(&ext.as_str()))
}

/// Inline image, or a labelled placeholder for formats browsers can't show.
fn preview(photo: &PlannedPhoto, root: &str) -> Markup {
    html! {
        @if is_web_image(photo) {
            img src={ (root) (photo.asset) } alt=(photo.title) loading="lazy";
        } @else {
            span.no-preview { (photo.record.filename) }
        }
    }
}

fn render_markdown(source: &str) -> String {
    let mut out = String::new();
    md_html::push_html(&mut out, Parser::new(source));
    out
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Renders the index page with one card per model.
fn render_index(groups: &[ModelGroup], total: usize, site: &SiteConfig) -> Markup {
    let breadcrumb = html! {
        a href="index.html" { (site.title) }
    };

    let content = html! {
        (site_header(breadcrumb))
        main.index-page {
            h1 { (site.title) }
            @if let Some(intro) = &site.intro {
                div.intro { (PreEscaped(render_markdown(intro))) }
            }
            p.summary {
                (photo_count(total))
                @if !groups.is_empty() {
                    " from " (groups.len()) @if groups.len() == 1 { " model" } @else { " models" }
                }
            }
            @if !groups.is_empty() {
                div.model-grid {
                    @for group in groups {
                        a.model-card.unknown[group.is_unknown()] href={ "models/" (group.slug) ".html" } {
                            @if let Some(cover) = group.photos.first() {
                                (preview(cover, ""))
                            }
                            span.model-label { (group.label) }
                            span.model-count { (photo_count(group.photos.len())) }
                        }
                    }
                }
            }
        }
    };

    base_document(&site.title, "", None, content)
}

/// Renders one model's photo grid.
fn render_model_page(group: &ModelGroup, site: &SiteConfig) -> Markup {
    let breadcrumb = html! {
        a href="../index.html" { (site.title) }
        " › "
        (group.label)
    };

    let content = html! {
        (site_header(breadcrumb))
        main.model-page {
            header.model-header {
                h1 { (group.label) }
                p.summary { (photo_count(group.photos.len())) }
            }
            div.photo-grid {
                @for photo in &group.photos {
                    a.photo-card href={ "../photos/" (photo.slug) ".html" } {
                        (preview(photo, "../"))
                        span.photo-title { (photo.title) }
                    }
                }
            }
        }
    };

    let title = format!("{} - {}", group.label, site.title);
    base_document(&title, "../", None, content)
}

/// Renders a single photo with everything known about it.
fn render_photo_page(
    group: &ModelGroup,
    photo: &PlannedPhoto,
    prev: Option<&PlannedPhoto>,
    next: Option<&PlannedPhoto>,
    site: &SiteConfig,
) -> Markup {
    let record = photo.record;
    let model_href = format!("../models/{}.html", group.slug);

    let breadcrumb = html! {
        a href="../index.html" { (site.title) }
        " › "
        a href=(model_href) { (group.label) }
        " › "
        (photo.title)
    };

    let content = html! {
        (site_header(breadcrumb))
        main.photo-page {
            figure.photo-frame {
                a href={ "../" (photo.asset) } {
                    (preview(photo, "../"))
                }
                figcaption { (photo.title) }
            }
            dl.photo-details {
                dt { "File" }
                dd { (record.source_path) }
                dt { "Model" }
                dd { (record.model) " " span.source { "(" (record.model_source.to_string()) ")" } }
                @if let Some(device) = &record.device {
                    @if let Some(make) = &device.make {
                        dt { "Make" }
                        dd { (make) }
                    }
                    @if let Some(model) = &device.model {
                        dt { "Camera" }
                        dd { (model) }
                    }
                    @if let Some(lens) = &device.lens {
                        dt { "Lens" }
                        dd { (lens) }
                    }
                }
                @if let Some((width, height)) = record.dimensions {
                    dt { "Size" }
                    dd { (width) " × " (height) }
                }
            }
            @if let Some(text) = &record.extracted_text {
                section.extracted-text {
                    h2 { "Recognized text" }
                    pre { (text) }
                }
            }
            nav.photo-nav {
                @if let Some(prev) = prev {
                    a.prev href={ (prev.slug) ".html" } { "‹ " (prev.title) }
                }
                a.up href=(model_href) { "All " (group.label) }
                @if let Some(next) = next {
                    a.next href={ (next.slug) ".html" } { (next.title) " ›" }
                }
            }
        }
    };

    let title = format!("{} - {}", photo.title, site.title);
    base_document(&title, "../", Some("photo-view"), content)
}
