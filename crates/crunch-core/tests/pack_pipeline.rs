use std::collections::HashSet;

use crunch_core::prelude::*;
use crunch_core::{atlas_name, shrink};
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn solid(name: &str, w: u32, h: u32, v: u8, hash: u64) -> SourceImage {
    SourceImage::new(name, RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255])), hash)
}

fn cfg(max_size: u32, padding: u32) -> PackerConfig {
    PackerConfig::builder()
        .max_size(max_size)
        .padding(padding)
        .build()
}

#[test]
fn empty_input_yields_no_atlases() {
    let out = pack_images("atlas", Vec::new(), &cfg(256, 1)).unwrap();
    assert!(out.atlases.is_empty());
    assert_eq!(out.stats().num_atlases, 0);
    assert!(out.to_document().unwrap().textures.is_empty());
}

#[test]
fn single_image_shrinks_to_smallest_power_of_two() {
    let out = pack_images("atlas", vec![solid("a", 100, 50, 1, 1)], &cfg(1024, 0)).unwrap();
    assert_eq!(out.atlases.len(), 1);
    let atlas = &out.atlases[0];
    assert_eq!((atlas.width, atlas.height), (128, 64));
    assert_eq!(atlas.rgba.dimensions(), (128, 64));
    assert_eq!(*atlas.rgba.get_pixel(99, 49), Rgba([1, 1, 1, 255]));
    assert_eq!(*atlas.rgba.get_pixel(100, 0), Rgba([0, 0, 0, 0]));
}

#[test]
fn shrink_halves_while_half_still_covers() {
    assert_eq!(shrink(2048, 1015), 1024);
    assert_eq!(shrink(2048, 257), 512);
    assert_eq!(shrink(2048, 256), 256);
    assert_eq!(shrink(64, 64), 64);
    assert_eq!(shrink(16, 1), 1);
}

#[test]
fn duplicates_share_placement_when_unique() {
    let inputs = vec![solid("a", 16, 16, 7, 42), solid("b", 16, 16, 7, 42)];
    let c = PackerConfig::builder().max_size(64).padding(0).unique(true).build();
    let out = pack_images("atlas", inputs, &c).unwrap();
    let entries = &out.atlases[0].entries;
    assert_eq!(entries.len(), 2);
    assert!(!entries[0].is_duplicate());
    assert_eq!(entries[1].placement.duplicate_of, Some(0));
    assert_eq!(
        (entries[0].placement.x, entries[0].placement.y),
        (entries[1].placement.x, entries[1].placement.y)
    );
    assert_eq!((out.atlases[0].width, out.atlases[0].height), (16, 16));
    let stats = out.stats();
    assert_eq!(stats.num_duplicates, 1);
    assert_eq!(stats.used_area, 16 * 16);
}

#[test]
fn duplicates_placed_separately_without_unique() {
    let inputs = vec![solid("a", 16, 16, 7, 42), solid("b", 16, 16, 7, 42)];
    let out = pack_images("atlas", inputs, &cfg(64, 0)).unwrap();
    let entries = &out.atlases[0].entries;
    assert!(entries.iter().all(|e| !e.is_duplicate()));
    assert!(!entries[0].footprint().intersects(&entries[1].footprint()));
}

#[test]
fn hash_collision_with_different_pixels_is_not_a_duplicate() {
    let inputs = vec![solid("a", 16, 16, 1, 9), solid("b", 16, 16, 2, 9)];
    let c = PackerConfig::builder().max_size(64).padding(0).unique(true).build();
    let out = pack_images("atlas", inputs, &c).unwrap();
    let entries = &out.atlases[0].entries;
    assert!(entries.iter().all(|e| !e.is_duplicate()));
    assert!(!entries[0].footprint().intersects(&entries[1].footprint()));
}

#[test]
fn overflow_opens_numbered_atlases() {
    let inputs = (0..5).map(|i| solid(&format!("img{i}"), 40, 40, i as u8, i)).collect();
    let out = pack_images("sheet", inputs, &cfg(64, 0)).unwrap();
    let names: Vec<&str> = out.atlases.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["sheet", "sheet1", "sheet2", "sheet3", "sheet4"]);
    for (i, atlas) in out.atlases.iter().enumerate() {
        assert_eq!(atlas.entries.len(), 1);
        // equal areas fall back to name order
        assert_eq!(atlas.entries[0].sprite.name, format!("img{i}"));
        assert_eq!((atlas.width, atlas.height), (64, 64));
    }
    assert_eq!(atlas_name("sheet", 0), "sheet");
    assert_eq!(atlas_name("sheet", 12), "sheet12");
}

#[test]
fn oversized_image_fails_up_front() {
    // 64 + 1 padding exceeds a 64 atlas
    let err = pack_images("atlas", vec![solid("big", 64, 10, 1, 1)], &cfg(64, 1)).unwrap_err();
    match err {
        CrunchError::ImageTooLarge { name, max_size, .. } => {
            assert_eq!(name, "big");
            assert_eq!(max_size, 64);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn bad_inputs_are_rejected() {
    let dup = vec![solid("a", 4, 4, 1, 1), solid("a", 2, 2, 1, 2)];
    assert!(matches!(
        pack_images("atlas", dup, &cfg(64, 0)),
        Err(CrunchError::InvalidInput(_))
    ));
    let empty = vec![SourceImage::new("z", RgbaImage::new(0, 3), 0)];
    assert!(matches!(
        pack_images("atlas", empty, &cfg(64, 0)),
        Err(CrunchError::InvalidInput(_))
    ));
    assert!(matches!(
        pack_images("atlas", Vec::new(), &cfg(100, 0)),
        Err(CrunchError::InvalidConfig(_))
    ));
    assert!(matches!(
        pack_images("atlas", Vec::new(), &cfg(64, 17)),
        Err(CrunchError::InvalidConfig(_))
    ));
}

#[test]
fn rotated_image_is_composited_clockwise() {
    // 2 wide, 6 tall: only fits a 8x4 atlas on its side
    let mut px = RgbaImage::new(2, 6);
    for (x, y, p) in px.enumerate_pixels_mut() {
        *p = Rgba([x as u8, y as u8, 0, 255]);
    }
    let c = PackerConfig::builder().max_size(4).padding(0).rotate(true).build();
    let err = pack_images("atlas", vec![SourceImage::new("tall", px.clone(), 0)], &c);
    assert!(matches!(err, Err(CrunchError::ImageTooLarge { .. })));

    let c = PackerConfig::builder().max_size(8).padding(0).rotate(true).build();
    let mut inputs = vec![SourceImage::new("tall", px, 0)];
    // a wide blocker forces the tall image onto its side in the remaining 8x2 strip
    inputs.push(solid("wide", 8, 6, 9, 1));
    let out = pack_images("atlas", inputs, &c).unwrap();
    let atlas = &out.atlases[0];
    let tall = atlas.entries.iter().find(|e| e.sprite.name == "tall").unwrap();
    assert!(tall.placement.rotated);
    let fp = tall.footprint();
    assert_eq!((fp.w, fp.h), (6, 2));
    // clockwise: source bottom-left lands at the footprint's top-left
    assert_eq!(*atlas.rgba.get_pixel(fp.x, fp.y), Rgba([0, 5, 0, 255]));
    assert_eq!(*atlas.rgba.get_pixel(fp.x + 5, fp.y + 1), Rgba([1, 0, 0, 255]));

    let doc = out.to_document().unwrap();
    let rec = doc.find("tall").unwrap().1;
    assert!(rec.rotated);
    assert_eq!((rec.width, rec.height), (2, 6));
}

#[test]
fn document_normalizes_frames_without_trim() {
    let frame = Frame { x: -3, y: -1, w: 20, h: 10 };
    let img = SourceImage::with_frame("t", RgbaImage::from_pixel(10, 5, Rgba([1, 1, 1, 255])), frame, 0);
    let out = pack_images("atlas", vec![img.clone()], &cfg(32, 0)).unwrap();
    let doc = out.to_document().unwrap();
    let rec = &doc.textures[0].images[0];
    assert_eq!((rec.frame_x, rec.frame_y, rec.frame_width, rec.frame_height), (0, 0, 10, 5));
    assert!(!doc.trim());

    let c = PackerConfig::builder().max_size(32).padding(0).trim(true).build();
    let doc = pack_images("atlas", vec![img], &c).unwrap().to_document().unwrap();
    let rec = &doc.textures[0].images[0];
    assert_eq!((rec.frame_x, rec.frame_y, rec.frame_width, rec.frame_height), (-3, -1, 20, 10));
    assert!(doc.trim());
    assert_eq!(doc.max_size, 32);
}

#[test]
fn random_packs_respect_padding_and_bounds() {
    let mut rng = StdRng::seed_from_u64(7);
    for round in 0..12 {
        let padding: u32 = rng.gen_range(0..=3);
        let c = PackerConfig::builder()
            .max_size(128)
            .padding(padding)
            .rotate(rng.gen_range(0..2) == 1)
            .unique(rng.gen_range(0..2) == 1)
            .build();
        let count = rng.gen_range(1..40);
        let inputs: Vec<SourceImage> = (0..count)
            .map(|i| {
                let w: u32 = rng.gen_range(1..=48);
                let h: u32 = rng.gen_range(1..=48);
                // a handful of shared hashes exercise the dedup path
                let v = rng.gen_range(0..4u8);
                let hash = (w as u64) << 32 | (h as u64) << 8 | v as u64;
                solid(&format!("r{round}_{i}"), w, h, v, hash)
            })
            .collect();
        let names: HashSet<String> = inputs.iter().map(|i| i.name.clone()).collect();

        let out = pack_images("atlas", inputs, &c).unwrap();
        let mut seen = HashSet::new();
        for atlas in &out.atlases {
            assert!(atlas.width.is_power_of_two() && atlas.width <= 128);
            assert!(atlas.height.is_power_of_two() && atlas.height <= 128);
            let padded: Vec<_> = atlas
                .entries
                .iter()
                .filter(|e| !e.is_duplicate())
                .map(|e| {
                    let mut r = e.footprint();
                    r.w += padding;
                    r.h += padding;
                    r
                })
                .collect();
            for (i, a) in padded.iter().enumerate() {
                assert!(a.right() <= atlas.width && a.bottom() <= atlas.height);
                for b in &padded[i + 1..] {
                    assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
                }
            }
            for e in &atlas.entries {
                if let Some(canon) = e.placement.duplicate_of {
                    assert!(!atlas.entries[canon].is_duplicate());
                    assert_eq!(atlas.entries[canon].footprint(), e.footprint());
                }
                assert!(seen.insert(e.sprite.name.clone()));
            }
        }
        assert_eq!(seen, names);
    }
}
