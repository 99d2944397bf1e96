//! Filename → device model detection.
//!
//! The detector walks an ordered table of `(pattern, label)` rules and returns
//! the label of the first rule whose pattern occurs in the lowercased
//! filename. Order is the tie-break: with rules `[canon → Canon,
//! iphone → iPhone]`, `iphone_canon_01.jpg` is a Canon.
//!
//! The table is configuration (`[[detect.rules]]` in the config file), so
//! adding a device never needs a code change.
//!
//! ## Product codes
//!
//! Inboxes fed from product shoots carry codes instead of camera names
//! (`D5301-01.HEIC`, `model_AB12.jpg`). With code inference switched on, a
//! filename that matches no rule is searched for such a code, and recognized
//! text can be searched the same way by the extractor ([`code_from_text`]).
//! Phone camera-roll names (`IMG_1234`) never count as codes.

use crate::config::DetectConfig;
use crate::types::UNKNOWN_MODEL;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// One entry of the detection table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelRule {
    /// Substring to look for; compared case-insensitively.
    pub pattern: String,
    /// Model label assigned on match.
    pub label: String,
}

impl ModelRule {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            label: label.into(),
        }
    }
}

/// The stock rule table.
pub fn default_rules() -> Vec<ModelRule> {
    vec![
        ModelRule::new("iphone", "iPhone"),
        ModelRule::new("ipad", "iPad"),
        ModelRule::new("pxl_", "Pixel"),
        ModelRule::new("canon", "Canon"),
        ModelRule::new("nikon", "Nikon"),
        ModelRule::new("sony", "Sony"),
        ModelRule::new("fuji", "Fujifilm"),
    ]
}

/// Ordered, case-insensitive substring matcher.
#[derive(Debug, Clone)]
pub struct ModelDetector {
    /// `(lowercased pattern, label)` in table order.
    rules: Vec<(String, String)>,
    infer_codes: bool,
}

impl ModelDetector {
    pub fn new(rules: &[ModelRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|r| (r.pattern.to_lowercase(), r.label.clone()))
                .collect(),
            infer_codes: false,
        }
    }

    pub fn from_config(config: &DetectConfig) -> Self {
        Self::new(&config.rules).with_code_inference(config.infer_codes)
    }

    /// Enable product-code inference for filenames no rule matches.
    pub fn with_code_inference(mut self, enabled: bool) -> Self {
        self.infer_codes = enabled;
        self
    }

    pub fn infers_codes(&self) -> bool {
        self.infer_codes
    }

    /// Label of the first rule matching `filename`.
    pub fn match_rules(&self, filename: &str) -> Option<&str> {
        let normalized = filename.to_lowercase();
        self.rules
            .iter()
            .find(|(pattern, _)| normalized.contains(pattern.as_str()))
            .map(|(_, label)| label.as_str())
    }

    /// Rule label, then (if enabled) a product code from the filename.
    pub fn detect_label(&self, filename: &str) -> Option<String> {
        if let Some(label) = self.match_rules(filename) {
            return Some(label.to_string());
        }
        if self.infer_codes {
            return code_from_filename(filename);
        }
        None
    }

    /// Model label for `filename`, or `"unknown"`.
    pub fn detect(&self, filename: &str) -> String {
        self.detect_label(filename)
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string())
    }
}

// ============================================================================
// Product code inference
// ============================================================================

static KEYWORD_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:model|型号|type)[\s_\-:：]*([A-Za-z0-9][A-Za-z0-9\-_.]{1,32})")
        .expect("keyword code pattern is valid")
});

static BARE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-_.]{1,32}$").expect("bare code pattern is valid")
});

static CAMERA_ROLL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^img_\d+$").expect("camera roll pattern is valid"));

static LEADING_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Z0-9][A-Z0-9\-_.]{2,32})\b").expect("leading code pattern is valid")
});

static ANY_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z0-9][A-Z0-9\-_.]{2,32}\b").expect("code token pattern is valid")
});

/// Tokens that look like codes but show up on every label or packaging shot.
const TEXT_NOISE: &[&str] = &[
    "WWW", "HTTP", "HTTPS", "MADE", "CHINA", "APPLE", "IPHONE", "IOS", "PCS", "XXL",
];

/// Find a product code in a filename.
///
/// Tried in order:
/// 1. a code introduced by a keyword: `model_AB12.jpg`, `型号：X9.png`
/// 2. a stem that is itself a code: `D5301-01.HEIC`
/// 3. the stem prefix before the first `_`, `-` or space: `SKU42 front.jpg`
///
/// Camera-roll stems (`IMG_1234`) and the bare prefix `IMG` never match.
pub fn code_from_filename(filename: &str) -> Option<String> {
    if let Some(caps) = KEYWORD_CODE.captures(filename) {
        return sanitize_code(&caps[1]);
    }

    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if CAMERA_ROLL.is_match(&stem) {
        return None;
    }
    if BARE_CODE.is_match(&stem) {
        return sanitize_code(&stem);
    }

    for sep in ['_', '-', ' '] {
        if let Some((candidate, _)) = stem.split_once(sep) {
            let len = candidate.chars().count();
            if (2..=40).contains(&len) && !candidate.eq_ignore_ascii_case("img") {
                return sanitize_code(candidate);
            }
        }
    }
    None
}

/// Find a product code in recognized text.
///
/// Prefers a keyword-introduced code, then a code-like token at the very
/// start of the text, then the first code-like token that is not common
/// packaging noise.
pub fn code_from_text(text: &str) -> Option<String> {
    let text = text.replace('\u{3000}', " ");
    if text.trim().is_empty() {
        return None;
    }

    if let Some(caps) = KEYWORD_CODE.captures(&text) {
        return sanitize_code(&caps[1]);
    }

    let upper = text.to_uppercase();
    if let Some(caps) = LEADING_CODE.captures(&upper) {
        let lead = &caps[1];
        if !CAMERA_ROLL.is_match(lead) {
            return sanitize_code(lead);
        }
    }

    ANY_CODE
        .find_iter(&upper)
        .map(|m| m.as_str())
        .find(|token| !TEXT_NOISE.contains(token) && !CAMERA_ROLL.is_match(token))
        .and_then(sanitize_code)
}

/// Normalize a raw code: uppercase, runs of characters outside
/// `[A-Z0-9._-]` become one dash, and `-`, `.`, `_` are stripped from both
/// ends. Returns `None` when nothing is left.
pub fn sanitize_code(raw: &str) -> Option<String> {
    let mut code = String::with_capacity(raw.len());
    for c in raw.trim().to_uppercase().chars() {
        let keep = c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-');
        let ch = if keep { c } else { '-' };
        if ch == '-' && code.ends_with('-') {
            continue;
        }
        code.push(ch);
    }
    let trimmed = code.trim_matches(|c| matches!(c, '-' | '.' | '_'));
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
