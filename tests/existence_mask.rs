//! Existence-mask gating: a 4-byte unsigned mask where each bit switches one block of fields on.
//!
//! Bit 31 (0x80000000) gates the first field, bit 30 the second, and so on down to bit 8 for
//! the 24th. The low byte gates a trailer block as a whole: any of its bits turns it on.

use nitf_tre::codec::Codec;
use nitf_tre::value::{Scalar, Tre};
use nitf_tre::{FormatError, Registry, SegmentKind, TreError};

const GATED: usize = 24;

fn descriptor() -> String {
    let mut src = String::from("tre EXMASK {\n    VERSION: integer(2);\n    EXISTENCE_MASK: binary(4);\n");
    for i in 0..GATED {
        let bit = 1u32 << (31 - i);
        src += &format!("    if \"EXISTENCE_MASK & 0x{:08X}\" {{\n        F{:02}: string(2);\n    }}\n", bit, i);
    }
    src += "    if \"EXISTENCE_MASK & 0x000000FF\" {\n        TRAILER: integer(4);\n    }\n}\n";
    src
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(&descriptor()).expect("register");
    registry
}

fn payload(mask: u32) -> Vec<u8> {
    let mut out = b"01".to_vec();
    out.extend_from_slice(&mask.to_be_bytes());
    for i in 0..GATED {
        if mask & (1 << (31 - i)) != 0 {
            out.extend_from_slice(format!("{:02}", i).as_bytes());
        }
    }
    if mask & 0xFF != 0 {
        out.extend_from_slice(b"0042");
    }
    out
}

fn field_names(tre: &Tre) -> Vec<String> {
    tre.entries()
        .expect("structured")
        .iter()
        .map(|e| e.name.clone())
        .collect()
}

#[test]
fn empty_mask_decodes_header_only() {
    let registry = registry();
    let codec = Codec::new(&registry);
    let tre = codec
        .decode_payload("EXMASK", &payload(0), SegmentKind::ImageSubheader)
        .expect("decode");
    assert_eq!(field_names(&tre), ["VERSION", "EXISTENCE_MASK"]);
    assert_eq!(tre.scalar("EXISTENCE_MASK"), Some(&Scalar::Unsigned(0)));
}

#[test]
fn each_bit_gates_exactly_one_field() {
    let registry = registry();
    let codec = Codec::new(&registry);
    for i in 0..GATED {
        let mask = 1u32 << (31 - i);
        let bytes = payload(mask);
        let tre = codec
            .decode_payload("EXMASK", &bytes, SegmentKind::ImageSubheader)
            .expect("decode");
        let names = field_names(&tre);
        assert_eq!(names.len(), 3, "mask {:08X}", mask);
        assert_eq!(names[2], format!("F{:02}", i));
        assert_eq!(codec.encode(&tre).expect("encode"), bytes);
    }
}

#[test]
fn all_bits_set_decodes_every_field() {
    let registry = registry();
    let codec = Codec::new(&registry);
    let bytes = payload(0xFFFF_FFFF);
    let tre = codec
        .decode_payload("EXMASK", &bytes, SegmentKind::ImageSubheader)
        .expect("decode");
    assert_eq!(field_names(&tre).len(), 2 + GATED + 1);
    assert_eq!(tre.text("F23"), Some("23"));
    assert_eq!(tre.integer("TRAILER"), Some(42));
    assert_eq!(codec.encode(&tre).expect("encode"), bytes);
}

#[test]
fn multi_bit_mask_matches_any_bit() {
    let registry = registry();
    let codec = Codec::new(&registry);
    for mask in [0x01u32, 0x10, 0x80, 0x8000_0004] {
        let tre = codec
            .decode_payload("EXMASK", &payload(mask), SegmentKind::ImageSubheader)
            .expect("decode");
        assert_eq!(tre.integer("TRAILER"), Some(42), "mask {:08X}", mask);
    }
    let tre = codec
        .decode_payload("EXMASK", &payload(0x0000_0100), SegmentKind::ImageSubheader)
        .expect("decode");
    assert!(tre.scalar("TRAILER").is_none());
    assert_eq!(tre.text("F23"), Some("23"));
}

#[test]
fn sparse_mask_round_trips_authored_tree() {
    let registry = registry();
    let codec = Codec::new(&registry);
    let mask = 0xA000_0100u32;
    let mut tre = Tre::new("EXMASK");
    tre.push_field("VERSION", 1i64)
        .push_field("EXISTENCE_MASK", u64::from(mask))
        .push_field("F00", "00")
        .push_field("F02", "02")
        .push_field("F23", "23");
    assert_eq!(codec.encode(&tre).expect("encode"), payload(mask));
}

#[test]
fn gated_entry_missing_from_tree_is_null() {
    let registry = registry();
    let codec = Codec::new(&registry);
    let mut tre = Tre::new("EXMASK");
    tre.push_field("VERSION", 1i64)
        .push_field("EXISTENCE_MASK", 0x4000_0000u64);
    match codec.encode(&tre) {
        Err(TreError::Format(FormatError::NullEntry { field })) => assert_eq!(field, "F01"),
        other => panic!("expected null entry, got {:?}", other),
    }
}

#[test]
fn entry_present_but_gated_off_is_unexpected() {
    let registry = registry();
    let codec = Codec::new(&registry);
    let mut tre = Tre::new("EXMASK");
    tre.push_field("VERSION", 1i64)
        .push_field("EXISTENCE_MASK", 0u64)
        .push_field("F00", "00");
    match codec.encode(&tre) {
        Err(TreError::Format(FormatError::UnexpectedEntry { field })) => assert_eq!(field, "F00"),
        other => panic!("expected unexpected entry, got {:?}", other),
    }
}
