use std::fmt::Write as _;
use std::str::FromStr;

use roxmltree::Node;

use super::sorted_images;
use crate::document::{Document, FORMAT_VERSION, ImageRecord, Texture};
use crate::error::{CrunchError, Result};
use crate::model::AtlasFlags;

pub(crate) fn encode(doc: &Document) -> Result<Vec<u8>> {
    let (trim, rotate) = (doc.trim(), doc.rotate());
    let flag = |f: AtlasFlags| if doc.flags.contains(f) { "true" } else { "false" };
    let mut s = String::new();
    s.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    // Writing into a String cannot fail.
    let _ = writeln!(
        s,
        "<atlas version=\"{}\" size=\"{}\" padding=\"{}\" premultiplied=\"{}\" trim=\"{}\" rotate=\"{}\" unique=\"{}\">",
        FORMAT_VERSION,
        doc.max_size,
        doc.padding,
        flag(AtlasFlags::PREMULTIPLIED),
        flag(AtlasFlags::TRIM),
        flag(AtlasFlags::ROTATE),
        flag(AtlasFlags::UNIQUE),
    );
    for tex in &doc.textures {
        let _ = writeln!(s, "\t<tex n=\"{}\">", xml_escape(&tex.name)?);
        for img in sorted_images(tex) {
            let _ = write!(
                s,
                "\t\t<img n=\"{}\" x=\"{}\" y=\"{}\" w=\"{}\" h=\"{}\" ",
                xml_escape(&img.name)?,
                img.x,
                img.y,
                img.width,
                img.height
            );
            if trim {
                let _ = write!(
                    s,
                    "fx=\"{}\" fy=\"{}\" fw=\"{}\" fh=\"{}\" ",
                    img.frame_x, img.frame_y, img.frame_width, img.frame_height
                );
            }
            if rotate {
                let _ = write!(s, "r=\"{}\" ", img.rotated as u8);
            }
            s.push_str("/>\n");
        }
        s.push_str("\t</tex>\n");
    }
    s.push_str("</atlas>\n");
    Ok(s.into_bytes())
}

/// Escapes an attribute value. Tab, LF and CR become character references
/// so attribute normalization on parse leaves them intact. Characters XML 1.0
/// cannot carry at all are rejected.
fn xml_escape(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\u{0}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}' => {
                return Err(CrunchError::InvalidInput(format!(
                    "name {s:?} contains U+{:04X}, which XML cannot represent",
                    c as u32
                )));
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

fn attr<'a>(node: Node<'a, '_>, key: &str) -> Result<&'a str> {
    node.attribute(key)
        .ok_or_else(|| CrunchError::MissingKey(format!("{}@{}", node.tag_name().name(), key)))
}

fn number<T: FromStr>(node: Node<'_, '_>, key: &str) -> Result<T> {
    let raw = attr(node, key)?;
    raw.trim().parse().map_err(|_| {
        CrunchError::Malformed(format!(
            "attribute {}@{}=\"{}\" is out of range",
            node.tag_name().name(),
            key,
            raw
        ))
    })
}

fn boolean(node: Node<'_, '_>, key: &str) -> Result<bool> {
    match attr(node, key)?.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(CrunchError::Malformed(format!(
            "attribute {}@{}=\"{}\" is not a boolean",
            node.tag_name().name(),
            key,
            other
        ))),
    }
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Document> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| CrunchError::Malformed("XML document is not valid UTF-8".into()))?;
    let xml = roxmltree::Document::parse(text)?;
    let root = xml.root_element();
    if root.tag_name().name() != "atlas" {
        return Err(CrunchError::NotAtlas);
    }
    let version: u8 = number(root, "version")?;
    if version != FORMAT_VERSION {
        return Err(CrunchError::UnsupportedVersion(version));
    }
    let mut flags = AtlasFlags::empty();
    flags.set(AtlasFlags::PREMULTIPLIED, boolean(root, "premultiplied")?);
    flags.set(AtlasFlags::TRIM, boolean(root, "trim")?);
    flags.set(AtlasFlags::ROTATE, boolean(root, "rotate")?);
    flags.set(AtlasFlags::UNIQUE, boolean(root, "unique")?);
    let (trim, rotate) = (flags.contains(AtlasFlags::TRIM), flags.contains(AtlasFlags::ROTATE));

    let mut doc = Document::new(number(root, "size")?, number(root, "padding")?, flags);
    for tex in root.children().filter(|n| n.has_tag_name("tex")) {
        let mut images = Vec::new();
        for img in tex.children().filter(|n| n.has_tag_name("img")) {
            let width = number(img, "w")?;
            let height = number(img, "h")?;
            let (frame_x, frame_y, frame_width, frame_height) = if trim {
                (
                    number(img, "fx")?,
                    number(img, "fy")?,
                    number(img, "fw")?,
                    number(img, "fh")?,
                )
            } else {
                (0, 0, width, height)
            };
            images.push(ImageRecord {
                name: attr(img, "n")?.to_string(),
                x: number(img, "x")?,
                y: number(img, "y")?,
                width,
                height,
                frame_x,
                frame_y,
                frame_width,
                frame_height,
                rotated: rotate && boolean(img, "r")?,
            });
        }
        doc.textures.push(Texture {
            name: attr(tex, "n")?.to_string(),
            images,
        });
    }
    Ok(doc)
}
