//! Format decoded TREs for display: a flat key/value listing and an indented tree.
//!
//! Keys inside repeated records are `{prefix}{index}_{NAME}` with a 1-based index; nested
//! groups concatenate, e.g. `EVENT2_IPCOM1_IPCOM`.

use crate::ast::{find_field_in, find_repeat_in, FormatHint, Node};
use crate::codec::scientific;
use crate::registry::Registry;
use crate::value::{Entry, EntryValue, Scalar, Tre, TreBody};
use std::fmt::Write;

/// Key used for the single entry of a raw TRE.
pub const RAW_KEY: &str = "RAW";

/// Digits after the point for values shown in scientific form.
const SCIENTIFIC_PRECISION: usize = 6;

/// Ordered `(key, value)` pairs for one TRE.
pub fn flatten(tre: &Tre, registry: &Registry) -> Vec<(String, String)> {
    let mut out = Vec::new();
    match &tre.body {
        TreBody::Raw(bytes) => out.push((RAW_KEY.to_string(), format_raw(bytes))),
        TreBody::Entries(entries) => {
            let nodes = registry.resolve(&tre.name).map(|d| d.nodes.as_slice()).unwrap_or(&[]);
            flatten_entries(entries, nodes, "", &mut out);
        }
    }
    out
}

fn flatten_entries(entries: &[Entry], nodes: &[Node], key_prefix: &str, out: &mut Vec<(String, String)>) {
    for entry in entries {
        match &entry.value {
            EntryValue::Scalar(s) => {
                let hint = find_field_in(nodes, &entry.name).and_then(|f| f.format);
                out.push((format!("{}{}", key_prefix, entry.name), format_scalar(s, hint)));
            }
            EntryValue::Group(records) => {
                let block = find_repeat_in(nodes, &entry.name);
                let prefix = block.map_or(entry.name.as_str(), |b| b.prefix());
                let inner = block.map_or(&[][..], |b| b.nodes.as_slice());
                for (i, record) in records.iter().enumerate() {
                    let nested = format!("{}{}{}_", key_prefix, prefix, i + 1);
                    flatten_entries(&record.entries, inner, &nested, out);
                }
            }
        }
    }
}

/// Indented multi-line rendering of one TRE.
pub fn format_tre(tre: &Tre, registry: &Registry) -> String {
    let mut out = String::new();
    match &tre.body {
        TreBody::Raw(bytes) => {
            let _ = writeln!(out, "{} (raw, {} bytes)", tre.name, bytes.len());
            let _ = writeln!(out, "  {}", format_raw(bytes));
        }
        TreBody::Entries(entries) => {
            let _ = writeln!(out, "{}", tre.name);
            let nodes = registry.resolve(&tre.name).map(|d| d.nodes.as_slice()).unwrap_or(&[]);
            write_entries(&mut out, entries, nodes, 1);
        }
    }
    out
}

fn write_entries(out: &mut String, entries: &[Entry], nodes: &[Node], depth: usize) {
    let indent = "  ".repeat(depth);
    for entry in entries {
        match &entry.value {
            EntryValue::Scalar(s) => {
                let hint = find_field_in(nodes, &entry.name).and_then(|f| f.format);
                let _ = writeln!(out, "{}{} = {}", indent, entry.name, format_scalar(s, hint));
            }
            EntryValue::Group(records) => {
                let inner = find_repeat_in(nodes, &entry.name).map_or(&[][..], |b| b.nodes.as_slice());
                let _ = writeln!(out, "{}{} [{}]", indent, entry.name, records.len());
                for (i, record) in records.iter().enumerate() {
                    let _ = writeln!(out, "{}  #{}", indent, i + 1);
                    write_entries(out, &record.entries, inner, depth + 2);
                }
            }
        }
    }
}

/// Display text for a scalar. Decoded reals keep their text; otherwise the format hint picks
/// fixed or scientific notation.
pub fn format_scalar(s: &Scalar, hint: Option<FormatHint>) -> String {
    let v = match s {
        Scalar::Text(t) => return t.trim_end().to_string(),
        Scalar::Real(r) if r.text().is_some() => return s.to_string(),
        Scalar::Real(r) => r.value(),
        Scalar::Ieee754(b) => b.to_f64(),
        Scalar::Integer(_) | Scalar::Unsigned(_) => return s.to_string(),
        Scalar::Blank(_) => return String::new(),
    };
    match hint {
        Some(FormatHint::Scientific) if v.is_finite() => scientific(v, SCIENTIFIC_PRECISION),
        _ => v.to_string(),
    }
}

/// Printable ASCII as text, anything else as hex.
fn format_raw(bytes: &[u8]) -> String {
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        bytes.iter().map(|&b| b as char).collect()
    } else {
        bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            let _ = write!(s, "{:02X}", b);
            s
        })
    }
}
