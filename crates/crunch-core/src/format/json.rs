use serde::{Deserialize, Serialize};

use super::sorted_images;
use crate::document::{Document, FORMAT_VERSION, ImageRecord, Texture};
use crate::error::{CrunchError, Result};
use crate::model::AtlasFlags;

// Required keys are still `Option` so that a missing one surfaces as
// `MissingKey` instead of a serde message.
#[derive(Serialize, Deserialize)]
struct JsonDocument {
    version: Option<u8>,
    size: Option<u16>,
    padding: Option<u8>,
    premultiplied: Option<bool>,
    trim: Option<bool>,
    rotate: Option<bool>,
    unique: Option<bool>,
    textures: Option<Vec<JsonTexture>>,
}

#[derive(Serialize, Deserialize)]
struct JsonTexture {
    name: Option<String>,
    images: Option<Vec<JsonImage>>,
}

#[derive(Serialize, Deserialize)]
struct JsonImage {
    n: Option<String>,
    x: Option<u16>,
    y: Option<u16>,
    w: Option<u16>,
    h: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fx: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fy: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fw: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fh: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    r: Option<bool>,
}

pub(crate) fn encode(doc: &Document) -> Result<Vec<u8>> {
    let (trim, rotate) = (doc.trim(), doc.rotate());
    let textures = doc
        .textures
        .iter()
        .map(|t| JsonTexture {
            name: Some(t.name.clone()),
            images: Some(
                sorted_images(t)
                    .into_iter()
                    .map(|img| JsonImage {
                        n: Some(img.name.clone()),
                        x: Some(img.x),
                        y: Some(img.y),
                        w: Some(img.width),
                        h: Some(img.height),
                        fx: trim.then_some(img.frame_x),
                        fy: trim.then_some(img.frame_y),
                        fw: trim.then_some(img.frame_width),
                        fh: trim.then_some(img.frame_height),
                        r: rotate.then_some(img.rotated),
                    })
                    .collect(),
            ),
        })
        .collect();
    let out = JsonDocument {
        version: Some(FORMAT_VERSION),
        size: Some(doc.max_size),
        padding: Some(doc.padding),
        premultiplied: Some(doc.flags.contains(AtlasFlags::PREMULTIPLIED)),
        trim: Some(trim),
        rotate: Some(rotate),
        unique: Some(doc.flags.contains(AtlasFlags::UNIQUE)),
        textures: Some(textures),
    };
    Ok(serde_json::to_vec_pretty(&out)?)
}

fn required<T>(v: Option<T>, key: &str) -> Result<T> {
    v.ok_or_else(|| CrunchError::MissingKey(key.to_string()))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Document> {
    let parsed: JsonDocument = serde_json::from_slice(bytes)?;
    let version = required(parsed.version, "version")?;
    if version != FORMAT_VERSION {
        return Err(CrunchError::UnsupportedVersion(version));
    }
    let trim = required(parsed.trim, "trim")?;
    let rotate = required(parsed.rotate, "rotate")?;
    let mut flags = AtlasFlags::empty();
    flags.set(
        AtlasFlags::PREMULTIPLIED,
        required(parsed.premultiplied, "premultiplied")?,
    );
    flags.set(AtlasFlags::TRIM, trim);
    flags.set(AtlasFlags::ROTATE, rotate);
    flags.set(AtlasFlags::UNIQUE, required(parsed.unique, "unique")?);

    let mut doc = Document::new(
        required(parsed.size, "size")?,
        required(parsed.padding, "padding")?,
        flags,
    );
    for t in required(parsed.textures, "textures")? {
        let name = required(t.name, "name")?;
        let list = required(t.images, "images")?;
        let mut images = Vec::with_capacity(list.len());
        for img in list {
            let width = required(img.w, "w")?;
            let height = required(img.h, "h")?;
            let (frame_x, frame_y, frame_width, frame_height) = if trim {
                (
                    required(img.fx, "fx")?,
                    required(img.fy, "fy")?,
                    required(img.fw, "fw")?,
                    required(img.fh, "fh")?,
                )
            } else {
                (0, 0, width, height)
            };
            let rotated = if rotate { required(img.r, "r")? } else { false };
            images.push(ImageRecord {
                name: required(img.n, "n")?,
                x: required(img.x, "x")?,
                y: required(img.y, "y")?,
                width,
                height,
                frame_x,
                frame_y,
                frame_width,
                frame_height,
                rotated,
            });
        }
        doc.textures.push(Texture { name, images });
    }
    Ok(doc)
}
