//! Gallery configuration.
//!
//! Everything is optional: with no config file the tool reads `inbox/` and
//! writes `site/` using the stock detection table and no text recognition.
//! A config file overrides just the keys it names; stock defaults fill the
//! rest (see [`merge_toml`]).
//!
//! ## Configuration Options
//!
//! ```toml
//! inbox = "inbox"            # Directory new photos are dropped into
//! output = "site"            # Generated static site
//!
//! [scan]
//! extensions = ["jpg", "jpeg", "png", "webp", "heic"]
//! recursive = false
//!
//! [detect]
//! prefer = "embedded"        # or "filename"
//! infer_codes = false        # product codes from filenames / recognized text
//!
//! [[detect.rules]]           # ordered, first match wins
//! pattern = "iphone"
//! label = "iPhone"
//!
//! [ocr]
//! provider = "disabled"      # "disabled" | "vision" | "command"
//! script = "scripts/ocr_text.swift"
//! command = []               # e.g. ["tesseract", "{path}", "stdout"]
//! languages = ["zh-Hans", "zh-Hant", "en-US"]
//! timeout_secs = 45
//! only_unknown = false
//! # max_images = 4
//!
//! [site]
//! title = "Photo Library"
//! # intro = "Markdown shown above the model grid"
//! ```
//!
//! Arrays replace the stock value as a whole: a config that lists its own
//! `[[detect.rules]]` gets exactly those rules. Unknown keys are rejected to
//! catch typos early.

use crate::detect::{ModelRule, default_rules};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "inbox-gallery.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Directory scanned for new photos.
    pub inbox: String,
    /// Directory the static site is written to.
    pub output: String,
    pub scan: ScanConfig,
    pub detect: DetectConfig,
    pub ocr: OcrConfig,
    pub site: SiteConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            inbox: "inbox".to_string(),
            output: "site".to_string(),
            scan: ScanConfig::default(),
            detect: DetectConfig::default(),
            ocr: OcrConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

impl GalleryConfig {
    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "scan.extensions must name at least one extension".into(),
            ));
        }
        for (i, rule) in self.detect.rules.iter().enumerate() {
            if rule.pattern.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "detect.rules[{i}].pattern must not be empty"
                )));
            }
            if rule.label.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "detect.rules[{i}].label must not be empty"
                )));
            }
        }
        if self.ocr.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "ocr.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.ocr.provider == OcrProvider::Command && self.ocr.command.is_empty() {
            return Err(ConfigError::Validation(
                "ocr.command is required when ocr.provider = \"command\"".into(),
            ));
        }
        Ok(())
    }
}

/// Inbox enumeration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Recognized image extensions, compared case-insensitively, without dot.
    pub extensions: Vec<String>,
    /// Descend into subdirectories of the inbox.
    pub recursive: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "webp", "heic"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            recursive: false,
        }
    }
}

/// Which source names the model when both embedded metadata and a filename
/// rule are available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelPreference {
    #[default]
    Embedded,
    Filename,
}

/// Model detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectConfig {
    pub prefer: ModelPreference,
    /// Infer product codes from filenames and recognized text when no rule matches.
    pub infer_codes: bool,
    /// Ordered `(pattern, label)` table; first match wins.
    pub rules: Vec<ModelRule>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            prefer: ModelPreference::default(),
            infer_codes: false,
            rules: default_rules(),
        }
    }
}

/// Text recognition backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// No recognition; records never carry text.
    #[default]
    Disabled,
    /// The platform's on-device recognizer (macOS Vision through a Swift script).
    Vision,
    /// Any external program that prints recognized text on stdout.
    Command,
}

/// Text recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrConfig {
    pub provider: OcrProvider,
    /// Swift script run by the `vision` provider.
    pub script: String,
    /// Program and arguments for the `command` provider. `{path}` is replaced
    /// by the image path; without a placeholder the path is appended.
    pub command: Vec<String>,
    /// Recognition language hints passed to the `vision` provider.
    pub languages: Vec<String>,
    /// Seconds a single recognition may take before it is killed.
    pub timeout_secs: u64,
    /// Only run recognition for photos no other source could name.
    pub only_unknown: bool,
    /// Upper bound on recognizer runs per build. Cached results don't count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_images: Option<usize>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            provider: OcrProvider::default(),
            script: "scripts/ocr_text.swift".to_string(),
            command: Vec::new(),
            languages: ["zh-Hans", "zh-Hant", "en-US"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_secs: 45,
            only_unknown: false,
            max_images: None,
        }
    }
}

/// Presentation settings for the generated site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Page title and index heading.
    pub title: String,
    /// Markdown rendered above the model grid on the index page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Photo Library".to_string(),
            intro: None,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a TOML table, the base layer for user overrides.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse config text into a validated config, stock defaults filling gaps.
pub fn parse_config(content: &str) -> Result<GalleryConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let merged = merge_toml(stock_defaults_value(), overlay);
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`.
///
/// A missing file yields the stock defaults unless `required` is set, in
/// which case it is an error (an explicitly named file must exist).
pub fn load_config(path: &Path, required: bool) -> Result<GalleryConfig, ConfigError> {
    if !path.is_file() {
        if required {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        return Ok(GalleryConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// A fully commented stock config file, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# inbox-gallery configuration
# ===========================
# All settings are optional. Values shown are the defaults.
# Unknown keys cause an error.

# Directory new photos are dropped into (overridden by --inbox).
inbox = "inbox"

# Directory the static site is written to (overridden by --output).
# It is replaced on every build; a non-empty directory that was not
# produced by inbox-gallery is never touched.
output = "site"

# ---------------------------------------------------------------------------
# Scanning
# ---------------------------------------------------------------------------
[scan]
# Image extensions to pick up, case-insensitive.
extensions = ["jpg", "jpeg", "png", "webp", "heic"]

# Also pick up images in subdirectories of the inbox.
recursive = false

# ---------------------------------------------------------------------------
# Model detection
# ---------------------------------------------------------------------------
[detect]
# Source that wins when both are available: "embedded" (EXIF make/model)
# or "filename" (the rule table below).
prefer = "embedded"

# When nothing else matches, look for product codes such as D5301-01 in
# the filename and in recognized text.
infer_codes = false

# Ordered rules, first match wins. Patterns are matched case-insensitively
# as substrings of the filename. Listing any rule replaces this whole table.
[[detect.rules]]
pattern = "iphone"
label = "iPhone"

[[detect.rules]]
pattern = "ipad"
label = "iPad"

[[detect.rules]]
pattern = "pxl_"
label = "Pixel"

[[detect.rules]]
pattern = "canon"
label = "Canon"

[[detect.rules]]
pattern = "nikon"
label = "Nikon"

[[detect.rules]]
pattern = "sony"
label = "Sony"

[[detect.rules]]
pattern = "fuji"
label = "Fujifilm"

# ---------------------------------------------------------------------------
# Text recognition (best effort; failures never stop a build)
# ---------------------------------------------------------------------------
[ocr]
# "disabled", "vision" (macOS on-device recognition via a Swift script),
# or "command" (any program that prints recognized text on stdout).
provider = "disabled"

# Swift script used by the "vision" provider.
script = "scripts/ocr_text.swift"

# Program and arguments used by the "command" provider. "{path}" is
# replaced by the image path; without it the path is appended.
# command = ["tesseract", "{path}", "stdout", "-l", "chi_sim+eng"]
command = []

# Language hints passed to the "vision" provider.
languages = ["zh-Hans", "zh-Hant", "en-US"]

# Seconds a single recognition may run before it is killed.
timeout_secs = 45

# Only recognize text for photos no other source could name.
only_unknown = false

# Cap on recognizer runs per build (cached results don't count).
# max_images = 4

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
title = "Photo Library"

# Markdown shown above the model grid.
# intro = "Drop images into `inbox/` and rebuild."
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_paths() {
        let config = GalleryConfig::default();
        assert_eq!(config.inbox, "inbox");
        assert_eq!(config.output, "site");
        assert!(!config.scan.recursive);
    }

    #[test]
    fn default_ocr_is_disabled() {
        let config = GalleryConfig::default();
        assert_eq!(config.ocr.provider, OcrProvider::Disabled);
        assert_eq!(config.ocr.timeout_secs, 45);
        assert_eq!(config.ocr.max_images, None);
    }

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
inbox = "drop"

[site]
title = "Samples"
"#,
        )
        .unwrap();
        assert_eq!(config.inbox, "drop");
        assert_eq!(config.output, "site");
        assert_eq!(config.site.title, "Samples");
        assert_eq!(config.detect.rules, default_rules());
    }

    #[test]
    fn user_rules_replace_stock_table() {
        let config = parse_config(
            r#"
[[detect.rules]]
pattern = "canon"
label = "Canon"

[[detect.rules]]
pattern = "iphone"
label = "iPhone"
"#,
        )
        .unwrap();
        assert_eq!(
            config.detect.rules,
            vec![
                ModelRule::new("canon", "Canon"),
                ModelRule::new("iphone", "iPhone"),
            ]
        );
    }

    #[test]
    fn parse_enums() {
        let config = parse_config(
            r#"
[detect]
prefer = "filename"

[ocr]
provider = "command"
command = ["tesseract", "{path}", "stdout"]
"#,
        )
        .unwrap();
        assert_eq!(config.detect.prefer, ModelPreference::Filename);
        assert_eq!(config.ocr.provider, OcrProvider::Command);
        assert_eq!(config.ocr.command.len(), 3);
    }

    #[test]
    fn unknown_key_is_error() {
        let result = parse_config("[scan]\nrecurse = true\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn command_provider_requires_command() {
        let result = parse_config("[ocr]\nprovider = \"command\"\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn empty_rule_label_is_rejected() {
        let result = parse_config("[[detect.rules]]\npattern = \"x\"\nlabel = \" \"\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = parse_config("[ocr]\ntimeout_secs = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn merge_toml_overrides_nested_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn missing_optional_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(DEFAULT_CONFIG_FILE), false).unwrap();
        assert_eq!(config.site.title, "Photo Library");
    }

    #[test]
    fn missing_required_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(&tmp.path().join("custom.toml"), true);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "output = \"docs\"\n[scan]\nrecursive = true\n").unwrap();

        let config = load_config(&path, true).unwrap();
        assert_eq!(config.output, "docs");
        assert!(config.scan.recursive);
    }

    #[test]
    fn invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(
            load_config(&path, false),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        let defaults = GalleryConfig::default();
        assert_eq!(config.inbox, defaults.inbox);
        assert_eq!(config.detect.rules, defaults.detect.rules);
        assert_eq!(config.scan.extensions, defaults.scan.extensions);
        assert_eq!(config.ocr.languages, defaults.ocr.languages);
        assert_eq!(config.ocr.timeout_secs, defaults.ocr.timeout_secs);
    }
}
