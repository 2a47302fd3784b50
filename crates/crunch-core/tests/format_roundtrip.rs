use crunch_core::prelude::*;
use crunch_core::{Encoded, encode_report};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_doc(rng: &mut StdRng, flags: AtlasFlags, textures: usize) -> Document {
    let mut doc = Document::new(2048, 2, flags);
    for t in 0..textures {
        let count = rng.gen_range(0..12);
        let mut images: Vec<ImageRecord> = (0..count)
            .map(|i| {
                let width = rng.gen_range(1..500);
                let height = rng.gen_range(1..500);
                ImageRecord {
                    name: format!("sprites/{t}/img_{i:02}"),
                    x: rng.gen_range(0..2000),
                    y: rng.gen_range(0..2000),
                    width,
                    height,
                    frame_x: -rng.gen_range(0..20i16),
                    frame_y: -rng.gen_range(0..20i16),
                    frame_width: width + rng.gen_range(0..40),
                    frame_height: height + rng.gen_range(0..40),
                    rotated: rng.gen_range(0..2) == 1,
                }
                .normalized(flags)
            })
            .collect();
        images.sort_by(|a, b| a.name.cmp(&b.name));
        doc.textures.push(Texture {
            name: format!("atlas{t}"),
            images,
        });
    }
    doc
}

fn flag_sets() -> Vec<AtlasFlags> {
    let mut out = Vec::new();
    for bits in 0..16u8 {
        out.push(AtlasFlags::from_bits_truncate(bits));
    }
    out
}

#[test]
fn every_format_round_trips() {
    let mut rng = StdRng::seed_from_u64(11);
    for flags in flag_sets() {
        for textures in [0, 1, 3] {
            let doc = random_doc(&mut rng, flags, textures);

            let xml = encode(&doc, Format::Xml).unwrap();
            assert_eq!(decode(&xml, &DecodeFormat::Xml).unwrap(), doc);

            let json = encode(&doc, Format::Json).unwrap();
            assert_eq!(decode(&json, &DecodeFormat::Json).unwrap(), doc);

            let legacy = encode(&doc, Format::Binary).unwrap();
            let fmt = DecodeFormat::Binary {
                legacy: Some(LegacyHeader::of(&doc)),
            };
            assert_eq!(decode(&legacy, &fmt).unwrap(), doc);

            let compact = encode(&doc, Format::Compact(Alignment::new(64).unwrap())).unwrap();
            if textures > 0 {
                assert_eq!(compact.len() % 64, 0);
            }
            assert_eq!(
                decode(&compact, &DecodeFormat::Binary { legacy: None }).unwrap(),
                doc
            );
        }
    }
}

#[test]
fn decoders_sort_unsorted_input() {
    let flags = AtlasFlags::TRIM | AtlasFlags::ROTATE;
    let mut doc = random_doc(&mut StdRng::seed_from_u64(3), flags, 2);
    for t in &mut doc.textures {
        t.images.reverse();
    }
    let mut sorted = doc.clone();
    sorted.sort();
    assert!(sorted.is_sorted());

    for (format, decode_as) in [
        (Format::Xml, DecodeFormat::Xml),
        (Format::Json, DecodeFormat::Json),
        (Format::Compact(Alignment::default()), DecodeFormat::Binary { legacy: None }),
    ] {
        let bytes = encode(&doc, format).unwrap();
        assert_eq!(decode(&bytes, &decode_as).unwrap(), sorted);
    }
}

#[test]
fn reserved_flag_bits_survive_compact() {
    let flags = AtlasFlags::TRIM | AtlasFlags::USER_0 | AtlasFlags::from_bits_retain(0x20);
    let doc = random_doc(&mut StdRng::seed_from_u64(5), flags, 1);
    let bytes = encode(&doc, Format::Compact(Alignment::new(128).unwrap())).unwrap();
    assert_eq!(bytes[13], flags.bits());
    let back = decode(&bytes, &DecodeFormat::Binary { legacy: None }).unwrap();
    assert_eq!(back.flags.bits(), 0x62);
}

#[test]
fn xml_escapes_names() {
    let mut doc = Document::new(64, 0, AtlasFlags::empty());
    doc.textures.push(Texture {
        name: "a&b".into(),
        images: vec![ImageRecord {
            name: "<\"quoted\">".into(),
            x: 1,
            y: 2,
            width: 3,
            height: 4,
            frame_x: 0,
            frame_y: 0,
            frame_width: 3,
            frame_height: 4,
            rotated: false,
        }],
    });
    let xml = encode(&doc, Format::Xml).unwrap();
    let text = String::from_utf8(xml.clone()).unwrap();
    assert!(text.contains("n=\"a&amp;b\""));
    assert!(text.contains("n=\"&lt;&quot;quoted&quot;&gt;\""));
    assert!(!text.contains("fx="));
    assert!(!text.contains(" r="));
    assert_eq!(decode(&xml, &DecodeFormat::Xml).unwrap(), doc);
}

fn single_image(texture: &str, image: &str) -> Document {
    let mut doc = Document::new(64, 0, AtlasFlags::empty());
    doc.textures.push(Texture {
        name: texture.into(),
        images: vec![ImageRecord {
            name: image.into(),
            x: 0,
            y: 0,
            width: 2,
            height: 2,
            frame_x: 0,
            frame_y: 0,
            frame_width: 2,
            frame_height: 2,
            rotated: false,
        }],
    });
    doc
}

#[test]
fn xml_keeps_whitespace_in_names() {
    let doc = single_image("sheet\t1", "a\tb\nc\rd");
    let xml = encode(&doc, Format::Xml).unwrap();
    let text = String::from_utf8(xml.clone()).unwrap();
    assert!(text.contains("n=\"a&#9;b&#10;c&#13;d\""));
    assert!(text.contains("n=\"sheet&#9;1\""));
    let back = decode(&xml, &DecodeFormat::Xml).unwrap();
    assert_eq!(back.textures[0].images[0].name, "a\tb\nc\rd");
    assert_eq!(back, doc);
}

#[test]
fn xml_rejects_unrepresentable_names() {
    for (tex, img) in [("ok", "a\u{1}b"), ("bad\u{1b}", "ok"), ("ok", "x\u{ffff}")] {
        let doc = single_image(tex, img);
        assert!(matches!(
            encode(&doc, Format::Xml),
            Err(CrunchError::InvalidInput(_))
        ));
        // The other formats carry any string.
        let json = encode(&doc, Format::Json).unwrap();
        assert_eq!(decode(&json, &DecodeFormat::Json).unwrap(), doc);
    }
}

#[test]
fn json_omits_fields_of_unset_flags() {
    let doc = random_doc(&mut StdRng::seed_from_u64(9), AtlasFlags::empty(), 1);
    let json: serde_json::Value = serde_json::from_slice(&encode(&doc, Format::Json).unwrap()).unwrap();
    assert_eq!(json["version"], 0);
    assert_eq!(json["trim"], false);
    for img in json["textures"][0]["images"].as_array().unwrap() {
        assert!(img.get("fx").is_none());
        assert!(img.get("r").is_none());
        assert!(img.get("n").is_some());
    }
}

#[test]
fn compact_skips_records_larger_than_alignment() {
    let long = "x".repeat(60);
    let mut doc = Document::new(256, 1, AtlasFlags::TRIM | AtlasFlags::ROTATE);
    let rec = |name: &str| ImageRecord {
        name: name.to_string(),
        x: 0,
        y: 0,
        width: 1,
        height: 1,
        frame_x: 0,
        frame_y: 0,
        frame_width: 1,
        frame_height: 1,
        rotated: false,
    };
    doc.textures.push(Texture {
        name: "t".into(),
        images: vec![rec("a"), rec(&long), rec("b")],
    });

    let Encoded { bytes, skipped } =
        encode_report(&doc, Format::Compact(Alignment::new(64).unwrap())).unwrap();
    assert_eq!(skipped, vec![long.clone()]);
    // header + texture block + two kept records
    assert_eq!(bytes.len(), 64 + 2 * 64);
    let back = decode(&bytes, &DecodeFormat::Binary { legacy: None }).unwrap();
    let names: Vec<&str> = back.textures[0].images.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);

    // a larger alignment keeps everything
    let wide = encode_report(&doc, Format::Compact(Alignment::new(128).unwrap())).unwrap();
    assert!(wide.skipped.is_empty());
}
