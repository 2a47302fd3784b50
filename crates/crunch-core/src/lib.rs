//! Core library for crunching sprites into texture atlases.
//!
//! - Packing: MaxRects (best short side fit) with optional 90° rotation,
//!   padding, duplicate sharing and power-of-two shrinking
//! - Pipeline: `pack_images` takes in-memory images and returns finished
//!   atlases; `PackOutput::to_document` turns them into a serializable
//!   [`Document`]
//! - Formats: XML, JSON, legacy binary and a compact aligned binary that
//!   supports lookup by name without a full decode (see [`lookup`])
//!
//! Quick example:
//! ```ignore
//! use crunch_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let img = image::open("hero.png")?.to_rgba8();
//! let inputs = vec![SourceImage::new("hero", img, 0)];
//! let cfg = PackerConfig::builder().max_size(1024).rotate(true).build();
//! let out = pack_images("atlas", inputs, &cfg)?;
//! let bytes = encode(&out.to_document()?, Format::Compact(Alignment::default()))?;
//! let hero = find_image(&bytes, "hero")?;
//! # Ok(()) }
//! ```

pub mod compositing;
pub mod config;
pub mod document;
pub mod error;
pub mod format;
pub mod lookup;
pub mod model;
pub mod packer;
pub mod pipeline;

pub use config::*;
pub use document::*;
pub use error::*;
pub use format::{
    CompactHeader, DecodeFormat, Encoded, Format, LegacyHeader, decode, encode, encode_report,
};
pub use lookup::{FoundImage, find_image, read_header};
pub use model::*;
pub use pipeline::*;

/// Convenience prelude for common types and functions.
/// Importing `crunch_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{Alignment, PackerConfig, PackerConfigBuilder, SortOrder};
    pub use crate::document::{Document, ImageRecord, Texture};
    pub use crate::error::{CrunchError, Result};
    pub use crate::format::{DecodeFormat, Format, LegacyHeader, decode, encode};
    pub use crate::lookup::{FoundImage, find_image};
    pub use crate::model::{AtlasFlags, Frame, PackStats, PackedAtlas, SourceImage};
    pub use crate::pipeline::{PackOutput, pack_images, trim_image};
}
