use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CrunchError, Result};
use crate::model::AtlasFlags;

/// Largest atlas edge accepted; the compact format stores sizes as int16.
pub const MAX_ATLAS_SIZE: u32 = 16384;
/// Largest uniform gap between placed images.
pub const MAX_PADDING: u32 = 16;

/// Order in which images enter the packing queue.
///
/// Order never affects correctness, only which images land in which atlas
/// once more than one atlas is needed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    AreaDesc,
    MaxSideDesc,
    HeightDesc,
    WidthDesc,
    NameAsc,
    None,
}

impl FromStr for SortOrder {
    type Err = CrunchError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "area_desc" => Ok(Self::AreaDesc),
            "max_side_desc" => Ok(Self::MaxSideDesc),
            "height_desc" => Ok(Self::HeightDesc),
            "width_desc" => Ok(Self::WidthDesc),
            "name_asc" => Ok(Self::NameAsc),
            "none" => Ok(Self::None),
            other => Err(CrunchError::InvalidConfig(format!(
                "unknown sort order: {other}"
            ))),
        }
    }
}

/// Record size (and texture-block alignment) of the compact binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Alignment(u16);

impl Alignment {
    pub const ALLOWED: [u16; 7] = [64, 128, 256, 512, 1024, 2048, 4096];

    pub fn new(bytes: u16) -> Result<Self> {
        if Self::ALLOWED.contains(&bytes) {
            Ok(Self(bytes))
        } else {
            Err(CrunchError::InvalidAlignment(bytes))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn bytes(self) -> usize {
        self.0 as usize
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self(4096)
    }
}

impl TryFrom<u16> for Alignment {
    type Error = CrunchError;
    fn try_from(v: u16) -> Result<Self> {
        Self::new(v)
    }
}

impl From<Alignment> for u16 {
    fn from(a: Alignment) -> u16 {
        a.0
    }
}

impl FromStr for Alignment {
    type Err = CrunchError;
    fn from_str(s: &str) -> Result<Self> {
        let v: u16 = s
            .trim()
            .parse()
            .map_err(|_| CrunchError::InvalidConfig(format!("invalid alignment: {s}")))?;
        Self::new(v)
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackerConfig {
    /// Maximum atlas edge in pixels (atlases are square before shrinking).
    pub max_size: u32,
    /// Pixels reserved to the right of and below every placed image.
    pub padding: u32,
    /// Pixels were premultiplied before packing. Recorded only.
    #[serde(default)]
    pub premultiply: bool,
    /// Images carry trim frames.
    #[serde(default)]
    pub trim: bool,
    /// Allow 90° clockwise rotation.
    #[serde(default)]
    pub rotate: bool,
    /// Share atlas space between identical images.
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_size: 4096,
            padding: 1,
            premultiply: false,
            trim: false,
            rotate: false,
            unique: false,
            sort_order: default_sort_order(),
        }
    }
}

impl PackerConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if `max_size` is not a power of two in `1..=16384`
    /// or `padding` exceeds 16.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 || self.max_size > MAX_ATLAS_SIZE || !self.max_size.is_power_of_two()
        {
            return Err(CrunchError::InvalidConfig(format!(
                "max_size ({}) must be a power of two between 1 and {}",
                self.max_size, MAX_ATLAS_SIZE
            )));
        }
        if self.padding > MAX_PADDING {
            return Err(CrunchError::InvalidConfig(format!(
                "padding ({}) exceeds {}",
                self.padding, MAX_PADDING
            )));
        }
        Ok(())
    }

    /// Flag set recorded in every document produced with this configuration.
    pub fn flags(&self) -> AtlasFlags {
        let mut flags = AtlasFlags::empty();
        flags.set(AtlasFlags::PREMULTIPLIED, self.premultiply);
        flags.set(AtlasFlags::TRIM, self.trim);
        flags.set(AtlasFlags::ROTATE, self.rotate);
        flags.set(AtlasFlags::UNIQUE, self.unique);
        flags
    }

    /// Create a fluent builder for `PackerConfig`.
    pub fn builder() -> PackerConfigBuilder {
        PackerConfigBuilder::new()
    }
}

fn default_sort_order() -> SortOrder {
    SortOrder::AreaDesc
}

/// Builder for `PackerConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct PackerConfigBuilder {
    cfg: PackerConfig,
}

impl PackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: PackerConfig::default(),
        }
    }
    pub fn max_size(mut self, v: u32) -> Self {
        self.cfg.max_size = v;
        self
    }
    pub fn padding(mut self, v: u32) -> Self {
        self.cfg.padding = v;
        self
    }
    pub fn premultiply(mut self, v: bool) -> Self {
        self.cfg.premultiply = v;
        self
    }
    pub fn trim(mut self, v: bool) -> Self {
        self.cfg.trim = v;
        self
    }
    pub fn rotate(mut self, v: bool) -> Self {
        self.cfg.rotate = v;
        self
    }
    pub fn unique(mut self, v: bool) -> Self {
        self.cfg.unique = v;
        self
    }
    pub fn sort_order(mut self, v: SortOrder) -> Self {
        self.cfg.sort_order = v;
        self
    }
    pub fn build(self) -> PackerConfig {
        self.cfg
    }
}
