use std::collections::{HashMap, HashSet, VecDeque};

use image::{RgbaImage, imageops};
use tracing::{debug, info, instrument};

use crate::compositing::blit_rgba;
use crate::config::{PackerConfig, SortOrder};
use crate::document::{Document, ImageRecord, Texture};
use crate::error::{CrunchError, Result};
use crate::model::{AtlasEntry, Frame, PackStats, PackedAtlas, Placement, SourceImage};
use crate::packer::{Packer, maxrects::MaxRectsPacker};

/// Output of a packing run: the configuration used and every finished atlas.
#[derive(Debug, Clone)]
pub struct PackOutput {
    pub config: PackerConfig,
    pub atlases: Vec<PackedAtlas>,
}

impl PackOutput {
    pub fn stats(&self) -> PackStats {
        PackStats::from_atlases(&self.atlases)
    }

    /// Builds the serializable document, sorting each atlas's entries by name.
    pub fn to_document(&self) -> Result<Document> {
        let max_size = to_u16("max_size", self.config.max_size as i64)?;
        let padding = u8::try_from(self.config.padding).map_err(|_| CrunchError::OutOfRange {
            field: "padding",
            value: self.config.padding as i64,
        })?;
        let mut textures = Vec::with_capacity(self.atlases.len());
        for atlas in &self.atlases {
            let mut entries: Vec<&AtlasEntry> = atlas.entries.iter().collect();
            entries.sort_by(|a, b| a.sprite.name.as_bytes().cmp(b.sprite.name.as_bytes()));
            let images = entries
                .into_iter()
                .map(|e| record_for(e, &self.config))
                .collect::<Result<Vec<_>>>()?;
            textures.push(Texture {
                name: atlas.name.clone(),
                images,
            });
        }
        Ok(Document {
            max_size,
            padding,
            flags: self.config.flags(),
            textures,
        })
    }
}

fn to_u16(field: &'static str, v: i64) -> Result<u16> {
    u16::try_from(v).map_err(|_| CrunchError::OutOfRange { field, value: v })
}

fn to_i16(field: &'static str, v: i64) -> Result<i16> {
    i16::try_from(v).map_err(|_| CrunchError::OutOfRange { field, value: v })
}

fn record_for(e: &AtlasEntry, cfg: &PackerConfig) -> Result<ImageRecord> {
    let s = &e.sprite;
    let frame = if cfg.trim {
        s.frame
    } else {
        Frame::untrimmed(s.width, s.height)
    };
    Ok(ImageRecord {
        name: s.name.clone(),
        x: to_u16("x", e.placement.x as i64)?,
        y: to_u16("y", e.placement.y as i64)?,
        width: to_u16("width", s.width as i64)?,
        height: to_u16("height", s.height as i64)?,
        frame_x: to_i16("frame_x", frame.x as i64)?,
        frame_y: to_i16("frame_y", frame.y as i64)?,
        frame_width: to_u16("frame_width", frame.w as i64)?,
        frame_height: to_u16("frame_height", frame.h as i64)?,
        rotated: cfg.rotate && e.placement.rotated,
    })
}

/// Name of the `index`-th atlas: the base name, then base name + index.
pub fn atlas_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}{index}")
    }
}

/// Crops border rows/columns whose alpha is `<= threshold`.
///
/// Returns the cropped pixels and the frame that restores the original
/// bounds. A fully transparent image is returned whole.
pub fn trim_image(rgba: &RgbaImage, threshold: u8) -> (RgbaImage, Frame) {
    let (w, h) = rgba.dimensions();
    let opaque = |x: u32, y: u32| rgba.get_pixel(x, y)[3] > threshold;
    let col_empty = |x: u32, y1: u32, y2: u32| (y1..=y2).all(|y| !opaque(x, y));
    let row_empty = |y: u32, x1: u32, x2: u32| (x1..=x2).all(|x| !opaque(x, y));

    if w == 0 || h == 0 {
        return (rgba.clone(), Frame::untrimmed(w, h));
    }
    let mut y1 = 0;
    while y1 < h && row_empty(y1, 0, w - 1) {
        y1 += 1;
    }
    if y1 >= h {
        return (rgba.clone(), Frame::untrimmed(w, h));
    }
    let mut y2 = h - 1;
    while y2 > y1 && row_empty(y2, 0, w - 1) {
        y2 -= 1;
    }
    let mut x1 = 0;
    while x1 < w - 1 && col_empty(x1, y1, y2) {
        x1 += 1;
    }
    let mut x2 = w - 1;
    while x2 > x1 && col_empty(x2, y1, y2) {
        x2 -= 1;
    }
    let (tw, th) = (x2 - x1 + 1, y2 - y1 + 1);
    let cropped = imageops::crop_imm(rgba, x1, y1, tw, th).to_image();
    let frame = Frame {
        x: -(x1 as i32),
        y: -(y1 as i32),
        w,
        h,
    };
    (cropped, frame)
}

fn sort_queue(images: &mut [SourceImage], order: SortOrder) {
    match order {
        SortOrder::None => {}
        SortOrder::NameAsc => images.sort_by(|a, b| a.name.cmp(&b.name)),
        SortOrder::AreaDesc => {
            images.sort_by(|a, b| b.area().cmp(&a.area()).then_with(|| a.name.cmp(&b.name)))
        }
        SortOrder::MaxSideDesc => images.sort_by(|a, b| {
            b.width
                .max(b.height)
                .cmp(&a.width.max(a.height))
                .then_with(|| a.name.cmp(&b.name))
        }),
        SortOrder::HeightDesc => {
            images.sort_by(|a, b| b.height.cmp(&a.height).then_with(|| a.name.cmp(&b.name)))
        }
        SortOrder::WidthDesc => {
            images.sort_by(|a, b| b.width.cmp(&a.width).then_with(|| a.name.cmp(&b.name)))
        }
    }
}

/// Rejects duplicate names, empty images, and images that no empty atlas
/// of the configured size could hold.
fn check_inputs(images: &[SourceImage], cfg: &PackerConfig) -> Result<()> {
    let max = cfg.max_size;
    let mut names = HashSet::with_capacity(images.len());
    for img in images {
        if !names.insert(img.name.as_str()) {
            return Err(CrunchError::InvalidInput(format!(
                "duplicate image name '{}'",
                img.name
            )));
        }
        if img.width == 0 || img.height == 0 {
            return Err(CrunchError::InvalidInput(format!(
                "image '{}' has zero size",
                img.name
            )));
        }
        // Atlases are square, so rotation never rescues an oversized side.
        let (w, h) = (img.width + cfg.padding, img.height + cfg.padding);
        if w > max || h > max {
            return Err(CrunchError::ImageTooLarge {
                name: img.name.clone(),
                width: img.width,
                height: img.height,
                max_size: max,
            });
        }
    }
    Ok(())
}

/// Packs `inputs` into as many atlases as needed.
///
/// Atlases are named `base_name`, `base_name1`, `base_name2`, ... Images are
/// queued per `cfg.sort_order`; each atlas takes images from the front of the
/// queue until one does not fit, and the rest carry over to the next atlas.
/// An image that cannot fit an empty atlas fails the whole run.
#[instrument(skip_all, fields(base = base_name, count = inputs.len()))]
pub fn pack_images(
    base_name: &str,
    mut inputs: Vec<SourceImage>,
    cfg: &PackerConfig,
) -> Result<PackOutput> {
    cfg.validate()?;
    check_inputs(&inputs, cfg)?;
    sort_queue(&mut inputs, cfg.sort_order);

    let mut queue: VecDeque<SourceImage> = inputs.into();
    let mut atlases = Vec::new();
    while !queue.is_empty() {
        let name = atlas_name(base_name, atlases.len());
        let before = queue.len();
        let atlas = pack_atlas(name, &mut queue, cfg);
        if queue.len() == before {
            // Unreachable after check_inputs; guards against looping forever.
            let img = &queue[0];
            return Err(CrunchError::ImageTooLarge {
                name: img.name.clone(),
                width: img.width,
                height: img.height,
                max_size: cfg.max_size,
            });
        }
        info!(
            atlas = %atlas.name,
            width = atlas.width,
            height = atlas.height,
            images = atlas.entries.len(),
            remaining = queue.len(),
            "atlas packed"
        );
        atlases.push(atlas);
    }
    Ok(PackOutput {
        config: cfg.clone(),
        atlases,
    })
}

/// Fills one atlas from the front of `queue`.
///
/// Stops at the first image the packer cannot place; that image and all
/// after it stay queued. Placed images are composited and their pixel
/// buffers released.
pub fn pack_atlas(name: String, queue: &mut VecDeque<SourceImage>, cfg: &PackerConfig) -> PackedAtlas {
    let mut packer = MaxRectsPacker::new(cfg.max_size, cfg.max_size);
    let pad = cfg.padding;
    let mut placed: Vec<SourceImage> = Vec::new();
    let mut placements: Vec<Placement> = Vec::new();
    let mut dup_lookup: HashMap<u64, usize> = HashMap::new();
    let (mut ww, mut hh) = (0u32, 0u32);
    debug!(atlas = %name, queued = queue.len(), "starting atlas");

    while let Some(img) = queue.pop_front() {
        if cfg.unique {
            if let Some(&canon) = dup_lookup.get(&img.hash) {
                if img.same_pixels(&placed[canon]) {
                    let mut p = placements[canon];
                    p.duplicate_of = Some(canon);
                    debug!(image = %img.name, of = %placed[canon].name, "duplicate");
                    placements.push(p);
                    placed.push(img);
                    continue;
                }
            }
        }

        let Some(rect) = packer.insert(img.width + pad, img.height + pad, cfg.rotate) else {
            queue.push_front(img);
            break;
        };
        if cfg.unique {
            dup_lookup.entry(img.hash).or_insert(placements.len());
        }
        let rotated = cfg.rotate && img.width + pad != rect.w;
        debug!(image = %img.name, x = rect.x, y = rect.y, rotated, "placed");
        placements.push(Placement {
            x: rect.x,
            y: rect.y,
            rotated,
            duplicate_of: None,
        });
        placed.push(img);
        ww = ww.max(rect.right());
        hh = hh.max(rect.bottom());
    }

    let width = shrink(cfg.max_size, ww);
    let height = shrink(cfg.max_size, hh);
    let mut rgba = RgbaImage::new(width, height);
    let entries = placed
        .into_iter()
        .zip(placements)
        .map(|(img, placement)| {
            if placement.duplicate_of.is_none() {
                blit_rgba(&img.pixels, &mut rgba, placement.x, placement.y, placement.rotated);
            }
            AtlasEntry {
                sprite: img.into_sprite(),
                placement,
            }
        })
        .collect();
    PackedAtlas {
        name,
        width,
        height,
        entries,
        rgba,
    }
}

/// Halves `size` while half still covers `used`.
pub fn shrink(mut size: u32, used: u32) -> u32 {
    while size > 1 && size / 2 >= used {
        size /= 2;
    }
    size
}
