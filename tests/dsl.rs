//! Descriptor language tests: syntax (parse success/failure), registration-time validation and
//! registry behaviour.

use nitf_tre::ast::{FieldKind, FieldLength, FormatHint, Node, RepeatCount};
use nitf_tre::condition::ConditionOp;
use nitf_tre::{parse, Location, Registry, TreError};
use std::fs;

fn schema_error(src: &str) -> String {
    match parse(src) {
        Err(TreError::Schema(msg)) => msg,
        other => panic!("expected schema error, got {:?}", other),
    }
}

// ==================== Syntax: valid documents ====================

#[test]
fn parse_empty_document() {
    assert!(parse("").expect("empty document").is_empty());
    assert!(parse("// only a comment\n").expect("comment only").is_empty());
}

#[test]
fn parse_minimal_descriptor() {
    let src = r#"
tre MINI {
    A: string(3);
}
"#;
    let d = parse(src).expect("parse");
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].tag, "MINI");
    assert_eq!(d[0].location, Location::Any);
    assert_eq!(d[0].fixed_length(), Some(3));
}

#[test]
fn parse_all_field_types() {
    let src = r#"
tre TYPES {
    S: string(4);
    I: integer(3);
    R: real(8) [format = "%E"];
    B: binary(2);
    F: ieee754(8);
}
"#;
    let d = parse(src).expect("parse");
    let kinds: Vec<FieldKind> = d[0]
        .nodes
        .iter()
        .filter_map(|n| match n {
            Node::Field(f) => Some(f.kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        [
            FieldKind::String,
            FieldKind::FixedInteger,
            FieldKind::FixedReal,
            FieldKind::UnsignedBinary,
            FieldKind::Ieee754Binary
        ]
    );
    assert_eq!(d[0].find_field("R").and_then(|f| f.format), Some(FormatHint::Scientific));
    assert_eq!(d[0].fixed_length(), Some(25));
}

#[test]
fn parse_locations() {
    let src = r#"
tre AAA location file { A: string(1); }
tre BBB location image { A: string(1); }
tre CCC location subheader { A: string(1); }
tre DDD location overflow { A: string(1); }
"#;
    let d = parse(src).expect("parse");
    let locations: Vec<Location> = d.iter().map(|t| t.location).collect();
    assert_eq!(
        locations,
        [
            Location::FileHeader,
            Location::ImageSubheader,
            Location::AnySubheader,
            Location::OverflowOnly
        ]
    );
}

#[test]
fn parse_bounds_and_length_var() {
    let src = r#"
tre BOUND {
    N: integer(3) [minval = 2, maxval = 104];
    LEN: integer(2);
    TEXT: string(LEN);
    X: real(6) [minval = -1.5e2];
}
"#;
    let d = parse(src).expect("parse");
    let n = d[0].find_field("N").expect("N");
    assert_eq!((n.min, n.max), (Some(2.0), Some(104.0)));
    let text = d[0].find_field("TEXT").expect("TEXT");
    assert_eq!(text.length, FieldLength::Field("LEN".to_string()));
    assert_eq!(d[0].find_field("X").and_then(|f| f.min), Some(-150.0));
    assert_eq!(d[0].fixed_length(), None);
}

#[test]
fn fixed_length_does_not_overflow() {
    let src = r#"
tre HUGE {
    repeat MANY(18446744073709551615) { A: string(2); }
}
"#;
    let d = parse(src).expect("parse");
    assert_eq!(d[0].fixed_length(), None);
}

#[test]
fn parse_repeat_forms() {
    let src = r#"
tre REPS {
    COUNT: integer(2);
    repeat BY_FIELD(COUNT) prefix "F" { A: string(1); }
    repeat LITERAL(3) { B: string(1); }
    NCOEF: integer(1);
    repeat IMPLICIT { C: string(1); }
}
"#;
    let d = parse(src).expect("parse");
    let by_field = d[0].find_repeat("BY_FIELD").expect("by field");
    assert_eq!(by_field.count, RepeatCount::Field("COUNT".to_string()));
    assert_eq!(by_field.prefix(), "F");
    let literal = d[0].find_repeat("LITERAL").expect("literal");
    assert_eq!(literal.count, RepeatCount::Literal(3));
    assert_eq!(literal.prefix(), "LITERAL");
    let implicit = d[0].find_repeat("IMPLICIT").expect("implicit");
    assert_eq!(implicit.count, RepeatCount::Field("NCOEF".to_string()));
}

#[test]
fn parse_conditions() {
    let src = r#"
tre CONDS {
    MASK: binary(4);
    FLAG: string(1);
    if "MASK & 0xC0000000" { A: string(1); }
    if "FLAG = I" { B: string(1); }
    if "FLAG != 0" { C: string(1); }
}
"#;
    let d = parse(src).expect("parse");
    let ops: Vec<ConditionOp> = d[0]
        .nodes
        .iter()
        .filter_map(|n| match n {
            Node::Conditional(c) => Some(c.condition.op),
            _ => None,
        })
        .collect();
    assert_eq!(ops, [ConditionOp::BitAnd, ConditionOp::Equals, ConditionOp::NotEquals]);
}

#[test]
fn repeat_body_sees_outer_fields() {
    let src = r#"
tre SCOPE {
    MODE: string(1);
    N: integer(1);
    repeat ITEMS(N) {
        LEN: integer(1);
        if "MODE = A" { V: string(LEN); }
    }
}
"#;
    parse(src).expect("outer fields are visible inside repeats");
}

#[test]
fn builtins_parse() {
    let registry = Registry::with_builtins().expect("built-ins");
    assert_eq!(registry.tags(), ["BLOCKA", "HISTOA", "MSTGTA", "MTIRPB"]);
    let mstgta = registry.resolve("MSTGTA").expect("MSTGTA");
    assert_eq!(mstgta.fixed_length(), Some(101));
    assert_eq!(registry.resolve("BLOCKA").and_then(|d| d.fixed_length()), Some(123));
}

// ==================== Syntax and schema errors ====================

#[test]
fn reject_syntax_errors() {
    for bad in [
        "tre A { X: string(1) }",
        "tre A { X: float(1); }",
        "tre A { X string(1); }",
        "tre A location nowhere { X: string(1); }",
        "tre { X: string(1); }",
        "tre A { X: string(1);",
    ] {
        let msg = schema_error(bad);
        assert!(msg.contains("parse error"), "{}: {}", bad, msg);
    }
}

#[test]
fn reject_bad_widths() {
    schema_error("tre A { X: string(0); }");
    schema_error("tre A { X: binary(9); }");
    schema_error("tre A { X: ieee754(6); }");
    schema_error("tre A { N: integer(1); X: ieee754(N); }");
}

#[test]
fn reject_bad_attributes() {
    schema_error("tre A { X: string(2) [minval = 1]; }");
    schema_error("tre A { X: integer(2) [minval = 5, maxval = 1]; }");
    schema_error("tre A { X: integer(2) [format = \"scientific\"]; }");
    schema_error("tre A { X: real(6) [format = \"%g\"]; }");
}

#[test]
fn reject_forward_references() {
    let msg = schema_error("tre A { X: string(LEN); LEN: integer(1); }");
    assert!(msg.contains("LEN"), "{}", msg);
    schema_error("tre A { if \"F = 1\" { X: string(1); } F: integer(1); }");
    schema_error("tre A { repeat R(N) { X: string(1); } N: integer(1); }");
    schema_error("tre A { repeat R { X: string(1); } }");
}

#[test]
fn repeat_fields_are_not_visible_after_the_repeat() {
    schema_error("tre A { N: integer(1); repeat R(N) { L: integer(1); } X: string(L); }");
}

#[test]
fn reject_tag_problems() {
    schema_error("tre TOOLONG { X: string(1); }");
    schema_error("tre EMPTY { }");
    let msg = schema_error("tre DUP { X: string(1); } tre DUP { Y: string(1); }");
    assert!(msg.contains("duplicate"), "{}", msg);
}

#[test]
fn unsupported_condition_fails_registration() {
    let src = r#"
tre BADC {
    A: integer(1);
    B: integer(1);
    if "A = 1 AND B = 2" { X: string(1); }
}
"#;
    let mut registry = Registry::new();
    let err = registry.register(src).expect_err("compound condition");
    assert!(matches!(err, TreError::UnsupportedCondition { .. }));
    assert!(registry.is_empty());
}

// ==================== Registry ====================

#[test]
fn failed_document_registers_nothing() {
    let mut registry = Registry::new();
    let err = registry.register("tre OK { A: string(1); } tre BAD { B: binary(12); }");
    assert!(err.is_err());
    assert!(registry.resolve("OK").is_none());
}

#[test]
fn later_registration_shadows_earlier() {
    let mut registry = Registry::with_builtins().expect("built-ins");
    let before = registry.len();
    let tags = registry.register("tre MSTGTA { ONLY: string(4); }").expect("register");
    assert_eq!(tags, ["MSTGTA"]);
    assert_eq!(registry.len(), before);
    assert_eq!(registry.resolve("MSTGTA").and_then(|d| d.fixed_length()), Some(4));
}

#[test]
fn resolve_ignores_tag_padding() {
    let mut registry = Registry::new();
    registry.register("tre AB { X: string(1); }").expect("register");
    assert!(registry.resolve("AB    ").is_some());
    assert!(registry.resolve("ABC").is_none());
}

#[test]
fn register_dir_loads_descriptor_files_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a.tre"), "tre FIRST { X: string(1); }\ntre SAME { Y: string(1); }").expect("write");
    fs::write(dir.path().join("b.tre"), "tre SAME { Y: string(7); }").expect("write");
    fs::write(dir.path().join("notes.txt"), "not a descriptor").expect("write");

    let mut registry = Registry::new();
    let tags = registry.register_path(dir.path()).expect("register dir");
    assert_eq!(tags, ["FIRST", "SAME", "SAME"]);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.resolve("SAME").and_then(|d| d.fixed_length()), Some(7));
}

#[test]
fn register_file_reports_path_on_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.tre");
    fs::write(&path, "tre BAD { X: string(0); }").expect("write");
    let mut registry = Registry::new();
    match registry.register_file(&path) {
        Err(TreError::Schema(msg)) => assert!(msg.contains("bad.tre"), "{}", msg),
        other => panic!("expected schema error, got {:?}", other),
    }
}
