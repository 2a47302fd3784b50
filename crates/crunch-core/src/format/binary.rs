//! Legacy and compact binary atlas documents.
//!
//! Compact layout (little-endian):
//!
//! ```text
//! magic[7] version:u8 alignment:i16 max_size:i16 padding:i8 flags:u8 num_textures:i16
//! per texture:
//!     name_len:i16 name[name_len] num_images:i16 <zero pad to alignment>
//!     num_images records of exactly `alignment` bytes:
//!         x y w h:i16 [fx fy fw fh:i16 if TRIM] [rotated:u8 if ROTATE]
//!         name_len:i16 name[name_len] <zero pad>
//! ```
//!
//! Legacy layout has no preamble beyond `num_textures`; names are
//! null-terminated and come first in each record, and records are unpadded.

use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::bytes::{ByteReader, ByteWriter};
use super::sorted_images;
use crate::config::Alignment;
use crate::document::{Document, FORMAT_VERSION, ImageRecord, Texture};
use crate::error::{CrunchError, Result};
use crate::model::AtlasFlags;

/// First seven bytes of every compact file; the eighth is the version.
pub const MAGIC: [u8; 7] = [0x63, 0x72, 0x6E, 0xC7, 0x49, 0x31, 0x5B];

/// True when `bytes` starts with the compact magic (any version).
pub fn has_magic(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && bytes[..MAGIC.len()] == MAGIC
}

/// Document metadata a legacy file does not carry; supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyHeader {
    pub max_size: u16,
    pub padding: u8,
    /// Only TRIM and ROTATE change the record layout.
    pub flags: AtlasFlags,
}

impl LegacyHeader {
    pub fn new(flags: AtlasFlags) -> Self {
        Self {
            max_size: 0,
            padding: 0,
            flags,
        }
    }

    pub fn of(doc: &Document) -> Self {
        Self {
            max_size: doc.max_size,
            padding: doc.padding,
            flags: doc.flags,
        }
    }
}

/// Parsed compact preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactHeader {
    pub version: u8,
    pub alignment: Alignment,
    pub max_size: u16,
    pub padding: u8,
    pub flags: AtlasFlags,
    pub num_textures: u16,
}

/// Which optional numeric fields a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordLayout {
    trim: bool,
    rotate: bool,
}

impl RecordLayout {
    pub fn from_flags(flags: AtlasFlags) -> Self {
        Self {
            trim: flags.contains(AtlasFlags::TRIM),
            rotate: flags.contains(AtlasFlags::ROTATE),
        }
    }

    /// Bytes before the name field.
    pub fn fixed_len(self) -> usize {
        8 + if self.trim { 8 } else { 0 } + if self.rotate { 1 } else { 0 }
    }

    /// Bytes a compact record needs before padding.
    pub fn record_len(self, name: &str) -> usize {
        self.fixed_len() + 2 + name.len()
    }

    fn write_fields(self, w: &mut ByteWriter, img: &ImageRecord) {
        w.write_u16(img.x);
        w.write_u16(img.y);
        w.write_u16(img.width);
        w.write_u16(img.height);
        if self.trim {
            w.write_i16(img.frame_x);
            w.write_i16(img.frame_y);
            w.write_u16(img.frame_width);
            w.write_u16(img.frame_height);
        }
        if self.rotate {
            w.write_u8(img.rotated as u8);
        }
    }

    fn read_fields(self, r: &mut ByteReader<'_>, name: &str) -> Result<ImageRecord> {
        let x = r.read_u16()?;
        let y = r.read_u16()?;
        let width = r.read_u16()?;
        let height = r.read_u16()?;
        let (frame_x, frame_y, frame_width, frame_height) = if self.trim {
            (r.read_i16()?, r.read_i16()?, r.read_u16()?, r.read_u16()?)
        } else {
            (0, 0, width, height)
        };
        let rotated = if self.rotate {
            match r.read_u8()? {
                0 => false,
                1 => true,
                other => {
                    return Err(CrunchError::Malformed(format!(
                        "rotation byte {other} for image '{name}'"
                    )));
                }
            }
        } else {
            false
        };
        Ok(ImageRecord {
            name: name.to_string(),
            x,
            y,
            width,
            height,
            frame_x,
            frame_y,
            frame_width,
            frame_height,
            rotated,
        })
    }
}

// ---------- legacy ----------

pub(crate) fn encode_legacy(doc: &Document) -> Result<Vec<u8>> {
    let layout = RecordLayout::from_flags(doc.flags);
    let mut w = ByteWriter::new();
    w.write_count("num_textures", doc.textures.len())?;
    for tex in &doc.textures {
        w.write_cstr(&tex.name)?;
        w.write_count("num_images", tex.images.len())?;
        for img in sorted_images(tex) {
            w.write_cstr(&img.name)?;
            layout.write_fields(&mut w, img);
        }
    }
    Ok(w.into_inner())
}

pub(crate) fn decode_legacy(bytes: &[u8], header: &LegacyHeader) -> Result<Document> {
    let layout = RecordLayout::from_flags(header.flags);
    let mut r = ByteReader::new(bytes);
    let mut doc = Document::new(header.max_size, header.padding, header.flags);
    let num_textures = r.read_u16()?;
    for _ in 0..num_textures {
        let name = r.read_cstr()?.to_string();
        let count = r.read_u16()? as usize;
        let mut images = Vec::with_capacity(count);
        for _ in 0..count {
            let img_name = r.read_cstr()?;
            images.push(layout.read_fields(&mut r, img_name)?);
        }
        doc.textures.push(Texture { name, images });
    }
    trailing(&r)?;
    Ok(doc)
}

// ---------- compact ----------

pub(crate) fn encode_compact(doc: &Document, alignment: Alignment) -> Result<(Vec<u8>, Vec<String>)> {
    let layout = RecordLayout::from_flags(doc.flags);
    let align = alignment.bytes();
    let mut skipped = Vec::new();
    let mut w = ByteWriter::new();

    w.write_bytes(&MAGIC);
    w.write_u8(FORMAT_VERSION);
    w.write_u16(alignment.get());
    w.write_count("max_size", doc.max_size as usize)?;
    w.write_u8(doc.padding);
    w.write_u8(doc.flags.bits());
    w.write_count("num_textures", doc.textures.len())?;

    for tex in &doc.textures {
        let mut kept = Vec::with_capacity(tex.images.len());
        for img in sorted_images(tex) {
            let need = layout.record_len(&img.name);
            if need > align {
                warn!(
                    image = %img.name,
                    need,
                    alignment = align,
                    "record exceeds alignment, skipping in compact output (try a larger alignment)"
                );
                skipped.push(img.name.clone());
            } else {
                kept.push(img);
            }
        }

        w.write_prefixed_str(&tex.name)?;
        w.write_count("num_images", kept.len())?;
        w.pad_to(align);
        for img in kept {
            layout.write_fields(&mut w, img);
            w.write_prefixed_str(&img.name)?;
            w.pad_to(align);
        }
    }
    Ok((w.into_inner(), skipped))
}

/// Reads and validates the compact preamble, leaving `r` after it.
pub(crate) fn read_header(r: &mut ByteReader<'_>) -> Result<CompactHeader> {
    let magic = r.take(MAGIC.len()).map_err(|_| CrunchError::NotAtlas)?;
    if magic != MAGIC {
        return Err(CrunchError::NotAtlas);
    }
    let version = r.read_u8()?;
    if version != FORMAT_VERSION {
        return Err(CrunchError::UnsupportedVersion(version));
    }
    let alignment = Alignment::new(r.read_u16()?)?;
    let max_size = r.read_u16()?;
    let padding = r.read_u8()?;
    let flags = AtlasFlags::from_bits_retain(r.read_u8()?);
    let num_textures = r.read_u16()?;
    Ok(CompactHeader {
        version,
        alignment,
        max_size,
        padding,
        flags,
        num_textures,
    })
}

/// Location of one texture's fixed-size record block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextureBlock<'a> {
    pub name: &'a str,
    pub count: usize,
    /// Offset of record 0; record `i` starts at `start + i * alignment`.
    pub start: usize,
}

/// Reads one texture header and leaves `r` just past its record block.
pub(crate) fn next_texture_block<'a>(
    r: &mut ByteReader<'a>,
    alignment: Alignment,
) -> Result<TextureBlock<'a>> {
    let name = r.read_prefixed_str()?;
    let count = r.read_u16()? as usize;
    r.align(alignment.bytes())?;
    let start = r.position();
    r.seek(start + count * alignment.bytes())?;
    Ok(TextureBlock { name, count, start })
}

/// Reads only the name field of the record at `offset`.
pub(crate) fn peek_record_name(
    bytes: &[u8],
    offset: usize,
    layout: RecordLayout,
    alignment: Alignment,
) -> Result<&[u8]> {
    let mut r = ByteReader::at(bytes, offset + layout.fixed_len())?;
    let name = r.read_prefixed_bytes()?;
    if layout.fixed_len() + 2 + name.len() > alignment.bytes() {
        return Err(CrunchError::Malformed(format!(
            "record at offset {offset} overruns its {alignment}-byte slot"
        )));
    }
    Ok(name)
}

/// Decodes the full record at `offset`.
pub(crate) fn decode_record(
    bytes: &[u8],
    offset: usize,
    layout: RecordLayout,
    alignment: Alignment,
) -> Result<ImageRecord> {
    let name = peek_record_name(bytes, offset, layout, alignment)?;
    let name = std::str::from_utf8(name).map_err(|_| {
        CrunchError::Malformed(format!("name of record at offset {offset} is not valid UTF-8"))
    })?;
    let mut r = ByteReader::at(bytes, offset)?;
    layout.read_fields(&mut r, name)
}

pub(crate) fn decode_compact(bytes: &[u8]) -> Result<Document> {
    let mut r = ByteReader::new(bytes);
    let header = read_header(&mut r)?;
    let layout = RecordLayout::from_flags(header.flags);
    let align = header.alignment.bytes();
    let mut doc = Document::new(header.max_size, header.padding, header.flags);

    for _ in 0..header.num_textures {
        let block = next_texture_block(&mut r, header.alignment)?;
        debug!(texture = block.name, images = block.count, "decoding texture block");

        #[cfg(feature = "parallel")]
        let images = (0..block.count)
            .into_par_iter()
            .map(|i| decode_record(bytes, block.start + i * align, layout, header.alignment))
            .collect::<Result<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let images = (0..block.count)
            .map(|i| decode_record(bytes, block.start + i * align, layout, header.alignment))
            .collect::<Result<Vec<_>>>()?;

        doc.textures.push(Texture {
            name: block.name.to_string(),
            images,
        });
    }
    trailing(&r)?;
    Ok(doc)
}

fn trailing(r: &ByteReader<'_>) -> Result<()> {
    if r.position() != r.len() {
        return Err(CrunchError::Malformed(format!(
            "{} trailing bytes after the last texture",
            r.len() - r.position()
        )));
    }
    Ok(())
}
