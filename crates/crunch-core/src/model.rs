use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge (`y + h`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    pub fn intersects(&self, r: &Rect) -> bool {
        !(self.x >= r.right() || r.x >= self.right() || self.y >= r.bottom() || r.y >= self.bottom())
    }
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Untrimmed bounds of a sprite relative to its trimmed content.
///
/// `x`/`y` are zero or negative: trimming `n` transparent columns off the left
/// edge yields `x = -n`. `w`/`h` are the size before trimming.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Frame {
    /// Frame of an image that was not trimmed.
    pub fn untrimmed(w: u32, h: u32) -> Self {
        Self { x: 0, y: 0, w, h }
    }
}

bitflags::bitflags! {
    /// Document-level switches, stored verbatim in the compact binary header.
    ///
    /// Bits 6 and 7 belong to the caller and are carried through untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AtlasFlags: u8 {
        const PREMULTIPLIED = 0b0000_0001;
        const TRIM = 0b0000_0010;
        const ROTATE = 0b0000_0100;
        const UNIQUE = 0b0000_1000;
        const USER_0 = 0b0100_0000;
        const USER_1 = 0b1000_0000;
    }
}

impl Serialize for AtlasFlags {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AtlasFlags {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(AtlasFlags::from_bits_retain(bits))
    }
}

/// One input sprite before packing.
///
/// Owns its pixel buffer until the packing engine copies it into an atlas
/// canvas (or identifies it as a duplicate), after which only the [`Sprite`]
/// metadata survives.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Unique key, usually the input path without extension.
    pub name: String,
    /// Size after trimming.
    pub width: u32,
    pub height: u32,
    pub frame: Frame,
    /// Opaque content hash; equality key for dedup only.
    pub hash: u64,
    pub pixels: RgbaImage,
}

impl SourceImage {
    /// Builds an image whose frame equals its own bounds.
    pub fn new(name: impl Into<String>, pixels: RgbaImage, hash: u64) -> Self {
        let (w, h) = pixels.dimensions();
        Self::with_frame(name, pixels, Frame::untrimmed(w, h), hash)
    }

    /// Builds an image from already trimmed pixels and their frame.
    pub fn with_frame(name: impl Into<String>, pixels: RgbaImage, frame: Frame, hash: u64) -> Self {
        let (width, height) = pixels.dimensions();
        Self {
            name: name.into(),
            width,
            height,
            frame,
            hash,
            pixels,
        }
    }

    /// True when both images hold the same pixels. Used to confirm hash hits.
    pub fn same_pixels(&self, other: &SourceImage) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.pixels.as_raw() == other.pixels.as_raw()
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Drops the pixel buffer, keeping the metadata.
    pub fn into_sprite(self) -> Sprite {
        Sprite {
            name: self.name,
            width: self.width,
            height: self.height,
            frame: self.frame,
        }
    }
}

/// Sprite metadata once its pixels have been released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub frame: Frame,
}

impl Sprite {
    pub fn is_trimmed(&self) -> bool {
        self.frame.x != 0 || self.frame.y != 0 || self.frame.w != self.width || self.frame.h != self.height
    }
}

/// Where one sprite instance landed in its atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    /// Rotated 90° clockwise; the on-atlas footprint swaps width and height.
    pub rotated: bool,
    /// Index of the canonical entry (in packing order) this one duplicates.
    pub duplicate_of: Option<usize>,
}

/// A sprite paired with its placement. Sorting entries keeps the pair intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasEntry {
    pub sprite: Sprite,
    pub placement: Placement,
}

impl AtlasEntry {
    /// On-atlas rectangle covered by the sprite's pixels (no padding).
    pub fn footprint(&self) -> Rect {
        let (w, h) = if self.placement.rotated {
            (self.sprite.height, self.sprite.width)
        } else {
            (self.sprite.width, self.sprite.height)
        };
        Rect::new(self.placement.x, self.placement.y, w, h)
    }

    pub fn is_duplicate(&self) -> bool {
        self.placement.duplicate_of.is_some()
    }
}

/// One finished atlas: shrunk dimensions, entries in packing order, pixels.
#[derive(Debug, Clone)]
pub struct PackedAtlas {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub entries: Vec<AtlasEntry>,
    pub rgba: RgbaImage,
}

/// Statistics about atlas packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PackStats {
    pub num_atlases: usize,
    /// All placements, duplicates included.
    pub num_images: usize,
    pub num_duplicates: usize,
    pub num_rotated: usize,
    pub num_trimmed: usize,
    /// Sum of final atlas areas.
    pub total_atlas_area: u64,
    /// Area covered by non-duplicate sprites.
    pub used_area: u64,
    /// used_area / total_atlas_area (0.0 to 1.0).
    pub occupancy: f64,
}

impl PackStats {
    pub fn from_atlases(atlases: &[PackedAtlas]) -> Self {
        let mut stats = PackStats {
            num_atlases: atlases.len(),
            num_images: 0,
            num_duplicates: 0,
            num_rotated: 0,
            num_trimmed: 0,
            total_atlas_area: 0,
            used_area: 0,
            occupancy: 0.0,
        };
        for atlas in atlases {
            stats.total_atlas_area += atlas.width as u64 * atlas.height as u64;
            for e in &atlas.entries {
                stats.num_images += 1;
                if e.placement.rotated {
                    stats.num_rotated += 1;
                }
                if e.sprite.is_trimmed() {
                    stats.num_trimmed += 1;
                }
                if e.is_duplicate() {
                    stats.num_duplicates += 1;
                } else {
                    stats.used_area += e.sprite.width as u64 * e.sprite.height as u64;
                }
            }
        }
        if stats.total_atlas_area > 0 {
            stats.occupancy = stats.used_area as f64 / stats.total_atlas_area as f64;
        }
        stats
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Atlases: {}, Images: {} ({} duplicates), Occupancy: {:.2}%, Rotated: {}, Trimmed: {}",
            self.num_atlases,
            self.num_images,
            self.num_duplicates,
            self.occupancy * 100.0,
            self.num_rotated,
            self.num_trimmed,
        )
    }
}
