use std::path::{Path, PathBuf};

use anyhow::Context;
use crunch_core::{SourceImage, trim_image};
use globset::{Glob, GlobSet, GlobSetBuilder};
use image::{ImageReader, RgbaImage};
use tracing::{debug, error};
use walkdir::WalkDir;

/// One image file found on disk, with the sprite name derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    /// Path relative to its input root, without extension, `/`-separated.
    pub name: String,
}

/// Per-image preprocessing applied while loading.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocess {
    pub premultiply: bool,
    pub trim: bool,
    pub trim_threshold: u8,
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("invalid glob '{pat}'"))?);
    }
    Ok(Some(b.build()?))
}

/// Collects image files under every root, sorted by name within each root.
pub fn gather_paths(
    roots: &[PathBuf],
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<InputFile>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    let mut list = Vec::new();
    for root in roots {
        if !root.exists() {
            anyhow::bail!("input {} does not exist", root.display());
        }
        if root.is_file() {
            if !should_skip(root, inc_set.as_ref(), exc_set.as_ref()) && is_image(root) {
                let name = root
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                list.push(InputFile {
                    path: root.clone(),
                    name,
                });
            }
            continue;
        }
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let p = entry.path();
            if p.is_file() && !should_skip(p, inc_set.as_ref(), exc_set.as_ref()) && is_image(p) {
                list.push(InputFile {
                    path: p.to_path_buf(),
                    name: sprite_name(root, p),
                });
            }
        }
    }
    Ok(list)
}

fn sprite_name(root: &Path, p: &Path) -> String {
    let rel = p.strip_prefix(root).unwrap_or(p).with_extension("");
    rel.to_string_lossy().replace('\\', "/")
}

fn should_skip(p: &Path, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if let Some(ex) = exclude {
        if ex.is_match(&s) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(&s) {
            return true;
        }
    }
    false
}

fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "bmp" | "tga" | "gif")
    )
}

/// Decodes every file into a [`SourceImage`]. Unreadable files are logged
/// and skipped.
pub fn load_sources_with_progress(
    files: &[InputFile],
    pre: Preprocess,
    progress: bool,
) -> anyhow::Result<Vec<SourceImage>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(files.len() as u64);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };
    let mut list = Vec::with_capacity(files.len());
    for f in files {
        if let Some(b) = &bar {
            b.set_message(f.name.clone());
        }
        match load_rgba(&f.path) {
            Ok(rgba) => list.push(prepare(&f.name, rgba, pre)),
            Err(e) => {
                error!(path = ?f.path, error = %e, "skip image");
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(list)
}

fn load_rgba(p: &Path) -> anyhow::Result<RgbaImage> {
    let img = ImageReader::open(p)?.with_guessed_format()?.decode()?;
    Ok(img.to_rgba8())
}

/// Applies premultiplication and trimming, then hashes the result.
pub fn prepare(name: &str, mut rgba: RgbaImage, pre: Preprocess) -> SourceImage {
    if pre.premultiply {
        premultiply_alpha(&mut rgba);
    }
    if pre.trim {
        let (trimmed, frame) = trim_image(&rgba, pre.trim_threshold);
        let hash = content_hash(&trimmed);
        debug!(name, w = trimmed.width(), h = trimmed.height(), "trimmed");
        SourceImage::with_frame(name, trimmed, frame, hash)
    } else {
        let hash = content_hash(&rgba);
        SourceImage::new(name, rgba, hash)
    }
}

/// Scales colour channels by alpha, rounding to nearest.
pub fn premultiply_alpha(rgba: &mut RgbaImage) {
    for p in rgba.pixels_mut() {
        let a = p[3] as u16;
        for c in 0..3 {
            p[c] = ((p[c] as u16 * a + 127) / 255) as u8;
        }
    }
}

/// xxh3 over dimensions and pixels; used only as the dedup key.
pub fn content_hash(rgba: &RgbaImage) -> u64 {
    use xxhash_rust::xxh3::Xxh3;
    let mut hasher = Xxh3::new();
    hasher.update(&rgba.width().to_le_bytes());
    hasher.update(&rgba.height().to_le_bytes());
    hasher.update(rgba.as_raw());
    hasher.digest()
}
