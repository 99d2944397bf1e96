//! URL slugs and display titles for generated pages.
//!
//! Model labels and filenames end up in URLs and output filenames, so both go
//! through [`slugify`]. Slugs must also be unique within a site, which is what
//! [`SlugSet`] hands out: the first claim of `canon` gets `canon`, the next
//! gets `canon-2`, and so on. Claims happen in record order, so the same
//! input always produces the same slugs.

use std::collections::HashSet;
use std::path::Path;

const MAX_SLUG_LEN: usize = 80;

/// Lowercase, URL-safe form of `text`.
///
/// - Non-alphanumeric ASCII characters become dashes
/// - Consecutive dashes collapse, leading and trailing dashes are stripped
/// - Truncated to `MAX_SLUG_LEN`, breaking at the last dash before the limit
///
/// Non-ASCII text (e.g. CJK product names) yields an empty slug; callers
/// pick a fallback through [`SlugSet::claim`].
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    let trimmed = slug.trim_end_matches('-');

    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}

/// Human-readable title for a photo, taken from its filename.
///
/// The extension is dropped, `#` markers removed, and runs of whitespace,
/// underscores and dashes shown as single spaces. Falls back to the full
/// filename when nothing is left.
///
/// - `D5301-01#.jpg` → `D5301 01`
/// - `IMG_0042.HEIC` → `IMG 0042`
/// - `.jpg` → `.jpg`
pub fn display_title(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned = stem
        .replace('#', "")
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        filename.to_string()
    } else {
        cleaned
    }
}

/// Lowercased extension of `filename`, if any.
pub fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// Hands out unique slugs in claim order.
#[derive(Debug, Default)]
pub struct SlugSet {
    taken: HashSet<String>,
}

impl SlugSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a unique slug for `text`, using `fallback` when `text` has no
    /// URL-safe characters. Collisions get `-2`, `-3`, ... appended.
    pub fn claim(&mut self, text: &str, fallback: &str) -> String {
        let base = match slugify(text) {
            s if s.is_empty() => slugify(fallback),
            s => s,
        };
        if self.taken.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
