//! Text recognition cache for incremental builds.
//!
//! Recognition is the slow step of a build: an external process per image,
//! each allowed up to the configured timeout. This module lets the extractor
//! skip it when neither the image nor the recognizer has changed.
//!
//! ## Cache keys
//!
//! Entries are **content-addressed** by `"{source_hash}:{params_hash}"`:
//!
//! - **`source_hash`**: SHA-256 of the image bytes. Renaming or moving a file
//!   inside the inbox keeps its cached text.
//! - **`params_hash`**: SHA-256 of the recognizer fingerprint (program,
//!   arguments, language hints). Switching providers or languages misses.
//!
//! Only runs that produced text are stored. Failed, timed-out or empty runs
//! are retried on the next build.
//!
//! ## Storage
//!
//! The cache is a JSON file at `<output_dir>/.ocr-cache.json` and is carried
//! across site rebuilds. Only entries looked up or inserted during the current
//! run are saved, so text for photos that left the inbox is dropped.
//!
//! Pass `--no-cache` to start from an empty cache.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache file within the output directory.
pub const CACHE_FILENAME: &str = ".ocr-cache.json";

/// Version of the cache format. Bump to invalidate existing caches.
const CACHE_VERSION: u32 = 2;

/// Recognized text for one image under one recognizer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrCache {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
    /// Keys touched this run. Never serialized.
    #[serde(skip)]
    used: BTreeSet<String>,
}

impl OcrCache {
    /// Create an empty cache (used for `--no-cache` or a first build).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: BTreeMap::new(),
            used: BTreeSet::new(),
        }
    }

    /// Load from the output directory. Returns an empty cache if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(cache_path(output_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(cache) if cache.version == CACHE_VERSION => cache,
            _ => Self::empty(),
        }
    }

    /// Save the entries used this run to the output directory.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let kept = Self {
            version: self.version,
            entries: self
                .entries
                .iter()
                .filter(|(key, _)| self.used.contains(*key))
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect(),
            used: BTreeSet::new(),
        };
        let json = serde_json::to_string_pretty(&kept)?;
        std::fs::write(cache_path(output_dir), json)
    }

    /// Cached text for `key`, marking the entry as used.
    pub fn lookup(&mut self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        self.used.insert(key.to_string());
        Some(entry.text.clone())
    }

    pub fn insert(&mut self, key: String, text: String) {
        self.used.insert(key.clone());
        self.entries.insert(key, CacheEntry { text });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Combined lookup key for an image and a recognizer.
pub fn cache_key(source_hash: &str, params_hash: &str) -> String {
    format!("{source_hash}:{params_hash}")
}

/// SHA-256 of `bytes` as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of a recognizer fingerprint.
pub fn hash_params(fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"ocr\0");
    hasher.update(fingerprint.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolve the cache file path for an output directory.
pub fn cache_path(output_dir: &Path) -> PathBuf {
    output_dir.join(CACHE_FILENAME)
}

/// Summary of text recognition for a build run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OcrStats {
    /// Results served from the cache.
    pub hits: u32,
    /// Recognizer runs that produced text.
    pub recognized: u32,
    /// Recognizer runs that failed, timed out or printed nothing.
    pub failed: u32,
    /// Photos skipped because `ocr.max_images` was reached.
    pub capped: u32,
}

impl OcrStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn recognize(&mut self) {
        self.recognized += 1;
    }

    pub fn fail(&mut self) {
        self.failed += 1;
    }

    pub fn cap(&mut self) {
        self.capped += 1;
    }

    /// Recognizer runs started this build, successful or not.
    pub fn runs(&self) -> u32 {
        self.recognized + self.failed
    }

    pub fn total(&self) -> u32 {
        self.hits + self.runs() + self.capped
    }
}

impl fmt::Display for OcrStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cached, {} recognized", self.hits, self.recognized)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.capped > 0 {
            write!(f, ", {} over limit", self.capped)?;
        }
        write!(f, " ({} total)", self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // OcrCache basics
    // =========================================================================

    #[test]
    fn empty_cache_has_no_entries() {
        let c = OcrCache::empty();
        assert_eq!(c.version, CACHE_VERSION);
        assert!(c.is_empty());
    }

    #[test]
    fn lookup_hit_and_miss() {
        let mut c = OcrCache::empty();
        c.insert("s:p".into(), "MODEL D5301".into());

        assert_eq!(c.lookup("s:p").as_deref(), Some("MODEL D5301"));
        assert_eq!(c.lookup("u:p"), None);
    }

    // =========================================================================
    // Save / Load
    // =========================================================================

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut c = OcrCache::empty();
        c.insert(cache_key("s1", "p1"), "text".into());
        c.insert(cache_key("s2", "p1"), "more".into());
        c.save(tmp.path()).unwrap();

        let mut loaded = OcrCache::load(tmp.path());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.lookup("s1:p1").as_deref(), Some("text"));
        assert_eq!(loaded.lookup("s2:p1").as_deref(), Some("more"));
    }

    #[test]
    fn save_drops_unused_entries() {
        let tmp = TempDir::new().unwrap();
        let mut first = OcrCache::empty();
        first.insert("kept:p".into(), "a".into());
        first.insert("gone:p".into(), "b".into());
        first.save(tmp.path()).unwrap();

        let mut second = OcrCache::load(tmp.path());
        assert!(second.lookup("kept:p").is_some());
        second.save(tmp.path()).unwrap();

        let third = OcrCache::load(tmp.path());
        assert!(third.entries.contains_key("kept:p"));
        assert!(!third.entries.contains_key("gone:p"));
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(OcrCache::load(tmp.path()).is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CACHE_FILENAME), "not json").unwrap();
        assert!(OcrCache::load(tmp.path()).is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"a:b": {{"text": "x"}}}}}}"#,
            CACHE_VERSION + 1
        );
        fs::write(tmp.path().join(CACHE_FILENAME), json).unwrap();
        assert!(OcrCache::load(tmp.path()).is_empty());
    }

    // =========================================================================
    // Hash functions
    // =========================================================================

    #[test]
    fn hash_bytes_is_sha256_hex() {
        let h = hash_bytes(b"hello world");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_bytes(b"hello world"));
        assert_ne!(h, hash_bytes(b"hello world!"));
    }

    #[test]
    fn hash_params_varies_with_fingerprint() {
        assert_eq!(hash_params("swift a"), hash_params("swift a"));
        assert_ne!(hash_params("swift a"), hash_params("swift b"));
    }

    // =========================================================================
    // OcrStats
    // =========================================================================

    #[test]
    fn stats_display_plain() {
        let s = OcrStats {
            hits: 3,
            recognized: 2,
            ..Default::default()
        };
        assert_eq!(s.to_string(), "3 cached, 2 recognized (5 total)");
    }

    #[test]
    fn stats_display_with_failures_and_cap() {
        let s = OcrStats {
            hits: 1,
            recognized: 2,
            failed: 1,
            capped: 4,
        };
        assert_eq!(
            s.to_string(),
            "1 cached, 2 recognized, 1 failed, 4 over limit (8 total)"
        );
        assert_eq!(s.runs(), 3);
    }
}
