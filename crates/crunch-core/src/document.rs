use serde::{Deserialize, Serialize};

use crate::lookup::search_sorted;
use crate::model::AtlasFlags;

/// Current version byte of the compact binary format (also written to
/// XML/JSON roots).
pub const FORMAT_VERSION: u8 = 0;

/// One image as stored in an atlas document.
///
/// When the document's trim flag is off the frame fields are
/// `(0, 0, width, height)`; when its rotate flag is off `rotated` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub name: String,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub frame_x: i16,
    pub frame_y: i16,
    pub frame_width: u16,
    pub frame_height: u16,
    pub rotated: bool,
}

impl ImageRecord {
    /// Resets the fields the given flags do not carry to their defaults.
    pub fn normalized(mut self, flags: AtlasFlags) -> Self {
        if !flags.contains(AtlasFlags::TRIM) {
            self.frame_x = 0;
            self.frame_y = 0;
            self.frame_width = self.width;
            self.frame_height = self.height;
        }
        if !flags.contains(AtlasFlags::ROTATE) {
            self.rotated = false;
        }
        self
    }
}

/// One atlas texture and its images, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Texture {
    pub name: String,
    pub images: Vec<ImageRecord>,
}

/// A complete atlas document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub max_size: u16,
    pub padding: u8,
    pub flags: AtlasFlags,
    pub textures: Vec<Texture>,
}

impl Document {
    pub fn new(max_size: u16, padding: u8, flags: AtlasFlags) -> Self {
        Self {
            max_size,
            padding,
            flags,
            textures: Vec::new(),
        }
    }

    pub fn trim(&self) -> bool {
        self.flags.contains(AtlasFlags::TRIM)
    }

    pub fn rotate(&self) -> bool {
        self.flags.contains(AtlasFlags::ROTATE)
    }

    /// Sorts every texture's images by name (byte-wise).
    pub fn sort(&mut self) {
        for t in &mut self.textures {
            t.images.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        }
    }

    /// True when every texture's images are in ascending name order.
    pub fn is_sorted(&self) -> bool {
        self.textures.iter().all(|t| {
            t.images
                .windows(2)
                .all(|w| w[0].name.as_bytes() <= w[1].name.as_bytes())
        })
    }

    /// Finds an image by name with a binary search per texture.
    ///
    /// Requires sorted textures (as produced by every decoder). Returns the
    /// owning texture index and the first matching record.
    pub fn find(&self, name: &str) -> Option<(usize, &ImageRecord)> {
        let key = name.as_bytes();
        self.textures.iter().enumerate().find_map(|(ti, t)| {
            let hit = search_sorted::<std::convert::Infallible>(t.images.len(), |i| {
                Ok(t.images[i].name.as_bytes().cmp(key))
            })
            .ok()
            .flatten()?;
            Some((ti, &t.images[hit]))
        })
    }
}
