//! # inbox-gallery
//!
//! Turns a directory of dropped photos into a static gallery grouped by the
//! device that took them. Drop images into `inbox/`, run the tool, and host
//! `site/` anywhere.
//!
//! # Pipeline
//!
//! ```text
//! 1. Scan      inbox/        →  ScanReport   (one PhotoRecord per image)
//! 2. Build     ScanReport    →  site/        (index, model and photo pages)
//! ```
//!
//! Scanning runs the [`metadata::Extractor`] on every image. It resolves a
//! model label from embedded EXIF, the filename rule table, and optionally
//! recognized text, in that order by default. Nothing ever fails the whole
//! run except a missing inbox, a bad config, or an output directory that
//! cannot be written: unreadable files are skipped, and unidentifiable
//! photos are grouped under `unknown`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1: lists inbox images and extracts a record for each |
//! | [`generate`] | Stage 2: renders the static site with Maud, atomically replacing the output |
//! | [`metadata`] | Per-file extraction and model resolution |
//! | [`detect`] | Ordered filename rules and product-code inference |
//! | [`embedded`] | EXIF make/model/lens reading |
//! | [`ocr`] | Pluggable text recognition with a bounded timeout |
//! | [`cache`] | Content-addressed cache of recognized text |
//! | [`config`] | `inbox-gallery.toml` loading, merging, and validation |
//! | [`types`] | `PhotoRecord` and the device/model types it carries |
//! | [`naming`] | Slugs and display titles |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Rules Are Data
//!
//! Filename detection is an ordered `(pattern, label)` table read from the
//! config file. Supporting a new device is a config edit, and the order of
//! the table is the only tie-break.
//!
//! ## Recognition Is Optional and Bounded
//!
//! Text recognition shells out to an external program, each run capped by a
//! timeout. It is off by default, and a failure only ever costs that photo
//! its text. Results are cached by image content inside the output directory,
//! so no state lives anywhere else.
//!
//! ## Deterministic Output
//!
//! The generated tree has no timestamps, and every ordering and slug is a
//! function of the inbox contents. Building twice yields identical bytes,
//! which keeps deploys diff-friendly.

pub mod cache;
pub mod config;
pub mod detect;
pub mod embedded;
pub mod generate;
pub mod metadata;
pub mod naming;
pub mod ocr;
pub mod output;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
