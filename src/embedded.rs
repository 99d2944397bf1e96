//! Embedded device metadata (EXIF `Make`, `Model`, `LensModel`).
//!
//! Reading goes through the [`MetadataReader`] trait so the extractor can be
//! tested without real camera files. The production reader, [`ExifReader`],
//! parses the bytes the extractor already loaded; JPEG, TIFF, PNG, WebP and
//! HEIF containers are supported by `kamadak-exif`.
//!
//! A file without EXIF is the normal case for screenshots and exported
//! images, so it is `Ok(None)`, not an error. Only a container that claims to
//! carry EXIF and fails to parse is reported as [`EmbeddedError`].

use crate::types::DeviceInfo;
use exif::{In, Tag, Value};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddedError {
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
}

/// Source of embedded capture-device metadata.
pub trait MetadataReader {
    /// Device fields found in `bytes`, `None` when the file carries none.
    fn read_device(&self, bytes: &[u8]) -> Result<Option<DeviceInfo>, EmbeddedError>;
}

/// EXIF reader backed by `kamadak-exif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifReader;

impl ExifReader {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataReader for ExifReader {
    fn read_device(&self, bytes: &[u8]) -> Result<Option<DeviceInfo>, EmbeddedError> {
        if bytes.is_empty() {
            return Ok(None);
        }
        let mut cursor = Cursor::new(bytes);
        let exif = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) | Err(exif::Error::InvalidFormat(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let info = DeviceInfo {
            make: ascii_field(&exif, Tag::Make),
            model: ascii_field(&exif, Tag::Model),
            lens: ascii_field(&exif, Tag::LensModel),
        };
        Ok((!info.is_empty()).then_some(info))
    }
}

/// First ASCII value of `tag` in the primary image, trimmed of padding.
fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(values) => values.first().and_then(|raw| clean_ascii(raw)),
        _ => None,
    }
}

/// Decode an EXIF ASCII value: stop at the first NUL, trim whitespace,
/// drop empty results.
fn clean_ascii(raw: &[u8]) -> Option<String> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let text = String::from_utf8_lossy(&raw[..end]).trim().to_string();
    (!text.is_empty()).then_some(text)
}
