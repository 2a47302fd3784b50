//! Name lookup directly over compact binary bytes.
//!
//! Records in a compact texture block are fixed-size and sorted by name, so a
//! single image can be located with a binary search that only touches
//! `O(log n)` name fields instead of decoding the whole document.

use std::cmp::Ordering;

use tracing::trace;

use crate::document::ImageRecord;
use crate::error::{CrunchError, Result};
use crate::format::{
    ByteReader, CompactHeader, RecordLayout, decode_record, next_texture_block, peek_record_name,
};

/// Three-way binary search over `0..len`.
///
/// `compare(i)` compares element `i` against the key. Returns the lowest index
/// that compares `Equal`, or `None` when no element does.
pub(crate) fn search_sorted<E>(
    len: usize,
    mut compare: impl FnMut(usize) -> std::result::Result<Ordering, E>,
) -> std::result::Result<Option<usize>, E> {
    let (mut lo, mut hi) = (0usize, len);
    let mut found = None;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match compare(mid)? {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => {
                found = Some(mid);
                hi = mid;
            }
        }
    }
    Ok(found)
}

/// Parses and validates only the compact preamble.
pub fn read_header(bytes: &[u8]) -> Result<CompactHeader> {
    crate::format::read_compact_header(&mut ByteReader::new(bytes))
}

/// An image located by [`find_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundImage {
    /// Index of the owning texture in file order.
    pub texture: usize,
    pub image: ImageRecord,
}

/// Looks up `name` in compact binary `bytes` without a full decode.
///
/// Textures are searched in file order and the first match wins. Returns
/// `Ok(None)` when no texture holds the name; structural damage met along
/// the way is reported as an error.
pub fn find_image(bytes: &[u8], name: &str) -> Result<Option<FoundImage>> {
    let mut r = ByteReader::new(bytes);
    let header = crate::format::read_compact_header(&mut r)?;
    let layout = RecordLayout::from_flags(header.flags);
    let align = header.alignment.bytes();
    let key = name.as_bytes();

    for texture in 0..header.num_textures as usize {
        let block = next_texture_block(&mut r, header.alignment)?;
        let hit = search_sorted::<CrunchError>(block.count, |i| {
            let field = peek_record_name(bytes, block.start + i * align, layout, header.alignment)?;
            Ok(field.cmp(key))
        })?;
        if let Some(i) = hit {
            trace!(texture, index = i, "image found");
            let image = decode_record(bytes, block.start + i * align, layout, header.alignment)?;
            return Ok(Some(FoundImage { texture, image }));
        }
    }
    Ok(None)
}
