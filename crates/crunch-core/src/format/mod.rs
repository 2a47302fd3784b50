//! Serialisation of [`Document`]s to XML, JSON, legacy binary and the
//! compact aligned binary format.

mod binary;
mod bytes;
mod json;
mod xml;

use tracing::instrument;

pub use binary::{CompactHeader, LegacyHeader, MAGIC, has_magic};
pub(crate) use binary::{
    RecordLayout, decode_record, next_texture_block, peek_record_name,
    read_header as read_compact_header,
};
pub(crate) use bytes::ByteReader;

use crate::config::Alignment;
use crate::document::{Document, ImageRecord, Texture};
use crate::error::{CrunchError, Result};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Xml,
    Json,
    /// Legacy binary: no preamble, null-terminated names, unpadded records.
    Binary,
    /// Compact binary with fixed-size records of `alignment` bytes.
    Compact(Alignment),
}

impl Format {
    /// Conventional file extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            Format::Xml => "xml",
            Format::Json => "json",
            Format::Binary => "bin",
            Format::Compact(_) => "crch",
        }
    }
}

/// Input format selection for [`decode`].
///
/// Compact binary is recognised by its magic. A legacy binary file carries no
/// preamble, so the metadata it lacks must be supplied out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFormat {
    Xml,
    Json,
    Binary { legacy: Option<LegacyHeader> },
}

/// Encoded bytes plus the names of images that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// Only compact output skips records (those larger than the alignment).
    pub skipped: Vec<String>,
}

/// Encodes `doc`, discarding the skipped-record report.
pub fn encode(doc: &Document, format: Format) -> Result<Vec<u8>> {
    encode_report(doc, format).map(|e| e.bytes)
}

/// Encodes `doc` and reports records the format could not hold.
///
/// Images are written in ascending name order regardless of the order in
/// `doc`.
#[instrument(skip_all, fields(format = ?format, textures = doc.textures.len()))]
pub fn encode_report(doc: &Document, format: Format) -> Result<Encoded> {
    let (bytes, skipped) = match format {
        Format::Xml => (xml::encode(doc)?, Vec::new()),
        Format::Json => (json::encode(doc)?, Vec::new()),
        Format::Binary => (binary::encode_legacy(doc)?, Vec::new()),
        Format::Compact(alignment) => binary::encode_compact(doc, alignment)?,
    };
    Ok(Encoded { bytes, skipped })
}

/// Decodes an atlas document. Images come back sorted by name.
#[instrument(skip_all, fields(format = ?format, len = bytes.len()))]
pub fn decode(bytes: &[u8], format: &DecodeFormat) -> Result<Document> {
    let mut doc = match format {
        DecodeFormat::Xml => xml::decode(bytes)?,
        DecodeFormat::Json => json::decode(bytes)?,
        DecodeFormat::Binary { legacy } => {
            if has_magic(bytes) {
                binary::decode_compact(bytes)?
            } else if let Some(header) = legacy {
                binary::decode_legacy(bytes, header)?
            } else {
                return Err(CrunchError::NotAtlas);
            }
        }
    };
    doc.sort();
    Ok(doc)
}

/// A texture's images in ascending byte-wise name order.
pub(crate) fn sorted_images(t: &Texture) -> Vec<&ImageRecord> {
    let mut v: Vec<&ImageRecord> = t.images.iter().collect();
    v.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    v
}
