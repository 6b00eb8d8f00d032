//! Decode TRE payloads into value trees and encode them back, driven by registry descriptors.
//!
//! Handles fixed and `length_var` fields, ASCII integers/reals (decoded text reused, authored
//! values zero-padded, all-space fields kept blank), big-endian
//! unsigned binaries of 1..=8 bytes, raw IEEE-754 patterns, conditional blocks and (nested)
//! repeats. Tags without a usable descriptor are carried as raw bytes.

use crate::ast::*;
use crate::error::{FormatError, TreError};
use crate::registry::Registry;
use crate::segment::SegmentKind;
use crate::value::{parse_ascii_int, Entry, EntryValue, Ieee754, Integer, Real, Record, Scalar, Tre, TreBody};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};
use tracing::{debug, warn};

/// Most records a repeat may produce without consuming payload bytes, beyond the bytes left.
const MAX_EMPTY_RECORDS: u64 = 99_999;

/// What to do when a TRE with a known descriptor fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Surface the field-named error.
    #[default]
    Fail,
    /// Log it and keep the payload as raw bytes.
    Raw,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodecOptions {
    pub on_malformed: MalformedPolicy,
}

/// Decoder/encoder context. Holds the registry by reference, so one registry can serve
/// many codecs (and threads) at once.
#[derive(Debug, Clone, Copy)]
pub struct Codec<'r> {
    registry: &'r Registry,
    options: CodecOptions,
}

/// Input side of the boundary with the outer file parser: forward-only reads.
pub trait TreRead {
    fn read_exact_bytes(&mut self, n: usize) -> std::io::Result<Vec<u8>>;
    fn position(&self) -> u64;
}

impl<T: AsRef<[u8]>> TreRead for Cursor<T> {
    fn read_exact_bytes(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn position(&self) -> u64 {
        Cursor::position(self)
    }
}

impl<R: TreRead + ?Sized> TreRead for &mut R {
    fn read_exact_bytes(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        (**self).read_exact_bytes(n)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }
}

impl<'r> Codec<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Codec::with_options(registry, CodecOptions::default())
    }

    pub fn with_options(registry: &'r Registry, options: CodecOptions) -> Self {
        Codec { registry, options }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn options(&self) -> CodecOptions {
        self.options
    }

    /// Read `len` payload bytes for `tag` and decode them for a segment of `kind`.
    pub fn decode<R: TreRead + ?Sized>(
        &self,
        tag: &str,
        reader: &mut R,
        len: usize,
        kind: SegmentKind,
    ) -> Result<Tre, TreError> {
        let payload = reader.read_exact_bytes(len).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TreError::from(FormatError::BadHeader {
                    field: tag.trim_end().to_string(),
                    reason: format!("payload shorter than declared length {}", len),
                })
            } else {
                TreError::Io(e)
            }
        })?;
        self.decode_payload(tag, &payload, kind)
    }

    /// Decode an in-memory payload. Unknown tags and tags not allowed in `kind` come back raw.
    pub fn decode_payload(&self, tag: &str, payload: &[u8], kind: SegmentKind) -> Result<Tre, TreError> {
        let tag = tag.trim_end();
        let descriptor = match self.registry.resolve(tag) {
            Some(d) => d,
            None => {
                debug!(tag, len = payload.len(), "no descriptor, keeping raw payload");
                return Ok(Tre::raw(tag, payload.to_vec()));
            }
        };
        if !descriptor.location.permits(kind) {
            debug!(tag, location = %descriptor.location, segment = %kind, "tag not valid here, keeping raw payload");
            return Ok(Tre::raw(tag, payload.to_vec()));
        }
        match self.decode_with(descriptor, payload) {
            Err(e) if self.options.on_malformed == MalformedPolicy::Raw => {
                warn!(tag, error = %e, "malformed TRE kept as raw payload");
                Ok(Tre::raw(tag, payload.to_vec()))
            }
            other => other,
        }
    }

    /// Decode a payload against a specific descriptor. The walk must consume it exactly.
    pub fn decode_with(&self, descriptor: &Descriptor, payload: &[u8]) -> Result<Tre, TreError> {
        let mut r = Cursor::new(payload);
        let mut entries = Vec::new();
        self.decode_nodes(&descriptor.nodes, &mut r, &mut entries, None)?;
        let consumed = r.position() as usize;
        if consumed != payload.len() {
            return Err(FormatError::TrailingData {
                field: descriptor.tag.clone(),
                consumed,
                declared: payload.len(),
            }
            .into());
        }
        Ok(Tre::with_entries(descriptor.tag.clone(), entries))
    }

    /// Serialize the payload (no TAG/LENGTH prefix), without a segment location check.
    pub fn encode(&self, tre: &Tre) -> Result<Vec<u8>, TreError> {
        self.encode_checked(tre, None)
    }

    /// Serialize the payload for a segment of `kind`.
    pub fn encode_for(&self, tre: &Tre, kind: SegmentKind) -> Result<Vec<u8>, TreError> {
        self.encode_checked(tre, Some(kind))
    }

    fn encode_checked(&self, tre: &Tre, kind: Option<SegmentKind>) -> Result<Vec<u8>, TreError> {
        let entries = match &tre.body {
            TreBody::Raw(bytes) => return Ok(bytes.clone()),
            TreBody::Entries(e) => e,
        };
        let descriptor = self
            .registry
            .resolve(&tre.name)
            .ok_or_else(|| FormatError::UnknownDescriptor { field: tre.name.clone() })?;
        if let Some(kind) = kind {
            if !descriptor.location.permits(kind) {
                return Err(FormatError::LocationViolation {
                    field: tre.name.clone(),
                    location: descriptor.location,
                    segment: kind,
                }
                .into());
            }
        }
        self.encode_with(descriptor, entries)
    }

    /// Serialize entries against a specific descriptor. Entries must follow descriptor order.
    pub fn encode_with(&self, descriptor: &Descriptor, entries: &[Entry]) -> Result<Vec<u8>, TreError> {
        let mut out = Vec::new();
        let mut cursor = 0;
        self.encode_nodes(&descriptor.nodes, entries, &mut cursor, None, &mut out)?;
        if let Some(extra) = entries.get(cursor) {
            return Err(FormatError::UnexpectedEntry { field: extra.name.clone() }.into());
        }
        Ok(out)
    }

    fn decode_nodes(
        &self,
        nodes: &[Node],
        r: &mut Cursor<&[u8]>,
        entries: &mut Vec<Entry>,
        parent: Option<&Scope<'_>>,
    ) -> Result<(), TreError> {
        for node in nodes {
            match node {
                Node::Field(f) => {
                    let scalar = {
                        let scope = Scope { entries: entries.as_slice(), parent };
                        self.decode_field(f, r, &scope)?
                    };
                    entries.push(Entry {
                        name: f.name.clone(),
                        value: EntryValue::Scalar(scalar),
                    });
                }
                Node::Conditional(c) => {
                    let taken = {
                        let scope = Scope { entries: entries.as_slice(), parent };
                        evaluate(c, &scope)?
                    };
                    if taken {
                        self.decode_nodes(&c.nodes, r, entries, parent)?;
                    }
                }
                Node::Repeat(rep) => {
                    let records = {
                        let scope = Scope { entries: entries.as_slice(), parent };
                        let count = repeat_count(rep, &scope)?;
                        let mut records = Vec::new();
                        for _ in 0..count {
                            let start = r.position();
                            let mut record = Vec::new();
                            self.decode_nodes(&rep.nodes, r, &mut record, Some(&scope))?;
                            records.push(Record { entries: record });
                            // An empty record reads nothing, so every later one would be empty too.
                            let available = r.get_ref().len().saturating_sub(r.position() as usize);
                            if r.position() == start && count > (available as u64).max(MAX_EMPTY_RECORDS) {
                                return Err(FormatError::CountOverrun {
                                    field: rep.name.clone(),
                                    count,
                                    available,
                                }
                                .into());
                            }
                        }
                        records
                    };
                    entries.push(Entry::group(rep.name.clone(), records));
                }
            }
        }
        Ok(())
    }

    fn decode_field(&self, f: &FieldDescriptor, r: &mut Cursor<&[u8]>, scope: &Scope<'_>) -> Result<Scalar, TreError> {
        let width = field_width(f, scope)?;
        check_binary_width(f, width)?;
        let available = r.get_ref().len().saturating_sub(r.position() as usize);
        if width > available {
            return Err(FormatError::Truncated {
                field: f.name.clone(),
                needed: width,
                available,
            }
            .into());
        }
        let scalar = match f.kind {
            FieldKind::UnsignedBinary => Scalar::Unsigned(r.read_uint::<BigEndian>(width)?),
            _ => {
                let mut buf = vec![0u8; width];
                r.read_exact(&mut buf)?;
                match f.kind {
                    FieldKind::Ieee754Binary => Scalar::Ieee754(Ieee754::from_bytes(&buf).ok_or_else(|| {
                        FormatError::BadWidth {
                            field: f.name.clone(),
                            kind: f.kind.name(),
                            width,
                        }
                    })?),
                    FieldKind::FixedInteger | FieldKind::FixedReal if buf.iter().all(|&b| b == b' ') => {
                        Scalar::Blank(latin1_decode(&buf))
                    }
                    FieldKind::FixedInteger => {
                        let text = latin1_decode(&buf);
                        let n = parse_ascii_int(&text)
                            .ok_or_else(|| FormatError::BadNumber { field: f.name.clone(), text: text.clone() })?;
                        Scalar::Integer(Integer::decoded(n, text))
                    }
                    FieldKind::FixedReal => {
                        let text = latin1_decode(&buf);
                        let v = parse_ascii_real(&text)
                            .ok_or_else(|| FormatError::BadNumber { field: f.name.clone(), text: text.clone() })?;
                        Scalar::Real(Real::decoded(v, text))
                    }
                    _ => Scalar::Text(latin1_decode(&buf)),
                }
            }
        };
        check_bounds(f, &scalar)?;
        Ok(scalar)
    }

    fn encode_nodes(
        &self,
        nodes: &[Node],
        record: &[Entry],
        cursor: &mut usize,
        parent: Option<&Scope<'_>>,
        out: &mut Vec<u8>,
    ) -> Result<(), TreError> {
        for node in nodes {
            match node {
                Node::Field(f) => {
                    let index = take_entry(record, cursor, &f.name)?;
                    let scalar = record[index].as_scalar().ok_or_else(|| FormatError::KindMismatch {
                        field: f.name.clone(),
                        expected: f.kind.name(),
                        found: "group",
                    })?;
                    let scope = Scope { entries: &record[..index], parent };
                    self.encode_field(f, scalar, &scope, out)?;
                }
                Node::Conditional(c) => {
                    let scope = Scope { entries: &record[..*cursor], parent };
                    if evaluate(c, &scope)? {
                        self.encode_nodes(&c.nodes, record, cursor, parent, out)?;
                    }
                }
                Node::Repeat(rep) => {
                    let index = take_entry(record, cursor, &rep.name)?;
                    let records = match &record[index].value {
                        EntryValue::Group(g) => g,
                        EntryValue::Scalar(s) => {
                            return Err(FormatError::KindMismatch {
                                field: rep.name.clone(),
                                expected: "group",
                                found: s.kind_name(),
                            }
                            .into())
                        }
                    };
                    if let RepeatCount::Literal(n) = rep.count {
                        if records.len() as u64 != n {
                            return Err(FormatError::LengthMismatch {
                                field: rep.name.clone(),
                                expected: usize::try_from(n).unwrap_or(usize::MAX),
                                actual: records.len(),
                            }
                            .into());
                        }
                    }
                    let scope = Scope { entries: &record[..index], parent };
                    for rec in records {
                        let mut inner = 0;
                        self.encode_nodes(&rep.nodes, &rec.entries, &mut inner, Some(&scope), out)?;
                        if let Some(extra) = rec.entries.get(inner) {
                            return Err(FormatError::UnexpectedEntry { field: extra.name.clone() }.into());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn encode_field(
        &self,
        f: &FieldDescriptor,
        scalar: &Scalar,
        scope: &Scope<'_>,
        out: &mut Vec<u8>,
    ) -> Result<(), TreError> {
        check_bounds(f, scalar)?;
        let width = field_width(f, scope)?;
        check_binary_width(f, width)?;
        let mismatch = || FormatError::KindMismatch {
            field: f.name.clone(),
            expected: f.kind.name(),
            found: scalar.kind_name(),
        };
        let bytes = match (f.kind, scalar) {
            (FieldKind::FixedInteger | FieldKind::FixedReal, Scalar::Blank(text)) => latin1_encode(text, &f.name)?,
            (FieldKind::String, _) => {
                let text = scalar.as_str().ok_or_else(mismatch)?;
                let mut bytes = latin1_encode(text, &f.name)?;
                if matches!(f.length, FieldLength::Literal(_)) && bytes.len() < width {
                    bytes.resize(width, b' ');
                }
                bytes
            }
            (FieldKind::FixedInteger, _) => {
                let n = match scalar {
                    Scalar::Integer(n) => n.clone(),
                    Scalar::Unsigned(u) => Integer::new(i64::try_from(*u).map_err(|_| FormatError::TooWide {
                        field: f.name.clone(),
                        value: u.to_string(),
                        width,
                    })?),
                    _ => return Err(mismatch().into()),
                };
                integer_text(&n, width).into_bytes()
            }
            (FieldKind::FixedReal, _) => {
                let real = match scalar {
                    Scalar::Real(r) => r.clone(),
                    Scalar::Integer(n) => Real::new(n.value() as f64),
                    _ => return Err(mismatch().into()),
                };
                format_real(&real, width, f.format)
                    .unwrap_or_else(|| real.value().to_string())
                    .into_bytes()
            }
            (FieldKind::UnsignedBinary, _) => {
                let v = match scalar {
                    Scalar::Unsigned(u) => *u,
                    Scalar::Integer(n) => u64::try_from(n.value()).map_err(|_| mismatch())?,
                    _ => return Err(mismatch().into()),
                };
                if width < 8 && v >> (8 * width) != 0 {
                    return Err(FormatError::TooWide {
                        field: f.name.clone(),
                        value: v.to_string(),
                        width,
                    }
                    .into());
                }
                let mut buf = Vec::with_capacity(width);
                buf.write_uint::<BigEndian>(v, width)?;
                buf
            }
            (FieldKind::Ieee754Binary, _) => match scalar {
                Scalar::Ieee754(b) => b.bytes().to_vec(),
                Scalar::Real(_) | Scalar::Integer(_) => {
                    let v = scalar.as_f64().ok_or_else(mismatch)?;
                    if width == 4 {
                        Ieee754::from_f32(v as f32).bytes().to_vec()
                    } else {
                        Ieee754::from_f64(v).bytes().to_vec()
                    }
                }
                _ => return Err(mismatch().into()),
            },
        };
        if bytes.len() != width {
            return Err(match f.length {
                FieldLength::Field(_) => FormatError::LengthMismatch {
                    field: f.name.clone(),
                    expected: width,
                    actual: bytes.len(),
                },
                FieldLength::Literal(_) => FormatError::TooWide {
                    field: f.name.clone(),
                    value: latin1_decode(&bytes),
                    width,
                },
            }
            .into());
        }
        out.extend_from_slice(&bytes);
        Ok(())
    }
}

/// Decoded values visible from the current record: its own entries so far, then enclosing
/// records outward.
struct Scope<'a> {
    entries: &'a [Entry],
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// Latest scalar with this name, searching outward.
    fn lookup(&self, name: &str) -> Option<&'a Scalar> {
        self.entries
            .iter()
            .rev()
            .find_map(|e| if e.name == name { e.as_scalar() } else { None })
            .or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }

    fn number(&self, owner: &str, reference: &str) -> Result<u64, FormatError> {
        let value = self.lookup(reference).ok_or_else(|| FormatError::MissingReference {
            field: owner.to_string(),
            reference: reference.to_string(),
        })?;
        value.as_u64().ok_or_else(|| FormatError::BadNumber {
            field: reference.to_string(),
            text: value.to_string(),
        })
    }
}

fn evaluate(c: &ConditionalBlock, scope: &Scope<'_>) -> Result<bool, FormatError> {
    c.condition
        .evaluate(scope.lookup(&c.condition.field), &format!("if \"{}\"", c.condition))
}

fn repeat_count(rep: &RepeatBlock, scope: &Scope<'_>) -> Result<u64, FormatError> {
    match &rep.count {
        RepeatCount::Literal(n) => Ok(*n),
        RepeatCount::Field(name) => scope.number(&rep.name, name),
    }
}

fn field_width(f: &FieldDescriptor, scope: &Scope<'_>) -> Result<usize, FormatError> {
    match &f.length {
        FieldLength::Literal(n) => Ok(*n),
        FieldLength::Field(name) => {
            let n = scope.number(&f.name, name)?;
            usize::try_from(n).map_err(|_| FormatError::BadWidth {
                field: f.name.clone(),
                kind: f.kind.name(),
                width: usize::MAX,
            })
        }
    }
}

/// Binary widths are checked at registration for literals; `length_var` widths land here.
fn check_binary_width(f: &FieldDescriptor, width: usize) -> Result<(), FormatError> {
    let ok = match f.kind {
        FieldKind::UnsignedBinary => (1..=8).contains(&width),
        FieldKind::Ieee754Binary => width == 4 || width == 8,
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(FormatError::BadWidth {
            field: f.name.clone(),
            kind: f.kind.name(),
            width,
        })
    }
}

fn check_bounds(f: &FieldDescriptor, scalar: &Scalar) -> Result<(), FormatError> {
    if f.min.is_none() && f.max.is_none() {
        return Ok(());
    }
    let v = match scalar.as_f64() {
        Some(v) if !v.is_nan() => v,
        _ => return Ok(()),
    };
    if let Some(min) = f.min {
        if v < min {
            return Err(FormatError::BelowMinimum {
                field: f.name.clone(),
                value: scalar.to_string(),
                min,
                max: f.max,
            });
        }
    }
    if let Some(max) = f.max {
        if v > max {
            return Err(FormatError::AboveMaximum {
                field: f.name.clone(),
                value: scalar.to_string(),
                min: f.min,
                max,
            });
        }
    }
    Ok(())
}

/// Position of the entry for `name`, which must be the next unconsumed one.
fn take_entry(record: &[Entry], cursor: &mut usize, name: &str) -> Result<usize, FormatError> {
    match record.get(*cursor) {
        Some(e) if e.name == name => {
            let index = *cursor;
            *cursor += 1;
            Ok(index)
        }
        Some(e) if record[*cursor..].iter().any(|x| x.name == name) => {
            Err(FormatError::UnexpectedEntry { field: e.name.clone() })
        }
        _ => Err(FormatError::NullEntry { field: name.to_string() }),
    }
}

fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn latin1_encode(text: &str, field: &str) -> Result<Vec<u8>, FormatError> {
    text.chars()
        .map(|c| u8::try_from(c).map_err(|_| FormatError::BadText { field: field.to_string() }))
        .collect()
}

/// Parse an ASCII real. `NaN` in any case is a legal value.
pub(crate) fn parse_ascii_real(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    if t.is_empty() {
        return None;
    }
    t.parse().ok()
}

/// Decoded text when it still denotes the same value at this width, zero-padded digits otherwise.
fn integer_text(n: &Integer, width: usize) -> String {
    match n.text() {
        Some(text) if text.len() == width && parse_ascii_int(text) == Some(n.value()) => text.to_string(),
        _ => format_integer(n.value(), width),
    }
}

fn format_integer(n: i64, width: usize) -> String {
    if n < 0 {
        format!("-{:0>w$}", n.unsigned_abs(), w = width.saturating_sub(1))
    } else {
        format!("{:0>w$}", n, w = width)
    }
}

/// Format a real into exactly `width` characters if possible. The decoded text is reused when
/// it still denotes the same value at this width.
pub(crate) fn format_real(real: &Real, width: usize, hint: Option<FormatHint>) -> Option<String> {
    let v = real.value();
    if let Some(text) = real.text() {
        if text.len() == width && parse_ascii_real(text).map_or(false, |t| t == v || (t.is_nan() && v.is_nan())) {
            return Some(text.to_string());
        }
    }
    if !v.is_finite() {
        let s = if v.is_nan() { "NaN".to_string() } else { v.to_string() };
        return (s.len() <= width).then(|| format!("{:>w$}", s, w = width));
    }
    let candidate = |precision: usize| match hint.unwrap_or(FormatHint::Fixed) {
        FormatHint::Fixed => format!("{:.*}", precision, v),
        FormatHint::Scientific => scientific(v, precision),
    };
    (0..=width)
        .rev()
        .map(candidate)
        .find(|s| s.len() <= width)
        .map(|s| zero_pad(&s, width))
}

/// `1.500E+02` style: upper-case exponent marker, signed two-digit exponent.
pub(crate) fn scientific(v: f64, precision: usize) -> String {
    let s = format!("{:.*e}", precision, v);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            format!("{}E{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
        }
        None => s,
    }
}

fn zero_pad(s: &str, width: usize) -> String {
    let pad = width.saturating_sub(s.len());
    if pad == 0 {
        return s.to_string();
    }
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    format!("{}{}{}", sign, "0".repeat(pad), digits)
}
