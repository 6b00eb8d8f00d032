//! Value tree: decoded (or hand-built) TRE content.

use crate::ast::FieldKind;
use std::fmt;

/// One TRE instance. Structured when a descriptor matched, raw otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Tre {
    pub name: String,
    pub body: TreBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreBody {
    Entries(Vec<Entry>),
    /// Payload kept verbatim (unknown tag, disallowed location, or lenient fallback).
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: String,
    pub value: EntryValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Scalar(Scalar),
    /// One record per repetition.
    Group(Vec<Record>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub entries: Vec<Entry>,
}

/// Leaf value; the variant is the kind it was decoded as.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Latin-1 text, padding included.
    Text(String),
    Integer(Integer),
    Real(Real),
    Unsigned(u64),
    Ieee754(Ieee754),
    /// ASCII numeric field left all spaces. Carries no value and is written back verbatim.
    Blank(String),
}

/// ASCII integer; keeps the text it was decoded from (space padding, leading `+`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integer {
    value: i64,
    text: Option<String>,
}

/// ASCII real; keeps the text it was decoded from so padding and precision survive a round trip.
#[derive(Debug, Clone)]
pub struct Real {
    value: f64,
    text: Option<String>,
}

/// Raw big-endian IEEE-754 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ieee754 {
    Single([u8; 4]),
    Double([u8; 8]),
}

impl Tre {
    pub fn new(name: impl Into<String>) -> Self {
        Tre {
            name: name.into(),
            body: TreBody::Entries(Vec::new()),
        }
    }

    pub fn raw(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Tre {
            name: name.into(),
            body: TreBody::Raw(bytes),
        }
    }

    pub fn with_entries(name: impl Into<String>, entries: Vec<Entry>) -> Self {
        Tre {
            name: name.into(),
            body: TreBody::Entries(entries),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self.body, TreBody::Raw(_))
    }

    pub fn entries(&self) -> Option<&[Entry]> {
        match &self.body {
            TreBody::Entries(e) => Some(e),
            TreBody::Raw(_) => None,
        }
    }

    pub fn raw_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            TreBody::Raw(b) => Some(b),
            TreBody::Entries(_) => None,
        }
    }

    /// Append a scalar entry. No-op on a raw TRE.
    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<Scalar>) -> &mut Self {
        if let TreBody::Entries(e) = &mut self.body {
            e.push(Entry::scalar(name, value));
        }
        self
    }

    pub fn push_group(&mut self, name: impl Into<String>, records: Vec<Record>) -> &mut Self {
        if let TreBody::Entries(e) = &mut self.body {
            e.push(Entry::group(name, records));
        }
        self
    }

    /// First entry with this name.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries()?.iter().find(|e| e.name == name)
    }

    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.get(name)?.as_scalar()
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.scalar(name)?.as_i64()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.scalar(name)?.as_str()
    }

    pub fn group(&self, name: &str) -> Option<&[Record]> {
        self.get(name)?.as_group()
    }
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<Scalar>) -> &mut Self {
        self.entries.push(Entry::scalar(name, value));
        self
    }

    pub fn push_group(&mut self, name: impl Into<String>, records: Vec<Record>) -> &mut Self {
        self.entries.push(Entry::group(name, records));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.get(name)?.as_scalar()
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.scalar(name)?.as_i64()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.scalar(name)?.as_str()
    }

    pub fn group(&self, name: &str) -> Option<&[Record]> {
        self.get(name)?.as_group()
    }
}

impl Entry {
    pub fn scalar(name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Entry {
            name: name.into(),
            value: EntryValue::Scalar(value.into()),
        }
    }

    pub fn group(name: impl Into<String>, records: Vec<Record>) -> Self {
        Entry {
            name: name.into(),
            value: EntryValue::Group(records),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.value {
            EntryValue::Scalar(s) => Some(s),
            EntryValue::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&[Record]> {
        match &self.value {
            EntryValue::Group(g) => Some(g),
            EntryValue::Scalar(_) => None,
        }
    }
}

impl Scalar {
    /// Field kind this value was decoded as. `None` for a blank, which fits either ASCII
    /// numeric kind.
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Scalar::Text(_) => Some(FieldKind::String),
            Scalar::Integer(_) => Some(FieldKind::FixedInteger),
            Scalar::Real(_) => Some(FieldKind::FixedReal),
            Scalar::Unsigned(_) => Some(FieldKind::UnsignedBinary),
            Scalar::Ieee754(_) => Some(FieldKind::Ieee754Binary),
            Scalar::Blank(_) => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        self.kind().map_or("blank", FieldKind::name)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Blank(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(n) => Some(n.value()),
            Scalar::Unsigned(n) => i64::try_from(*n).ok(),
            Scalar::Text(s) => parse_ascii_int(s),
            Scalar::Real(_) | Scalar::Ieee754(_) | Scalar::Blank(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::Unsigned(n) => Some(*n),
            Scalar::Integer(n) => u64::try_from(n.value()).ok(),
            Scalar::Text(s) => parse_ascii_int(s).and_then(|n| u64::try_from(n).ok()),
            Scalar::Real(_) | Scalar::Ieee754(_) | Scalar::Blank(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(n) => Some(n.value() as f64),
            Scalar::Unsigned(n) => Some(*n as f64),
            Scalar::Real(r) => Some(r.value()),
            Scalar::Ieee754(b) => Some(b.to_f64()),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Blank(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse ASCII digits with optional surrounding spaces and a leading sign.
pub(crate) fn parse_ascii_int(s: &str) -> Option<i64> {
    let t = s.trim();
    let t = t.strip_prefix('+').unwrap_or(t);
    if t.is_empty() {
        return None;
    }
    t.parse().ok()
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Integer(n) => write!(f, "{}", n.value()),
            Scalar::Real(r) => match r.text() {
                Some(t) => f.write_str(t.trim()),
                None => write!(f, "{}", r.value()),
            },
            Scalar::Unsigned(n) => write!(f, "{}", n),
            Scalar::Ieee754(b) => write!(f, "{}", b.to_f64()),
            Scalar::Blank(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Integer(Integer::new(n))
    }
}

impl From<Integer> for Scalar {
    fn from(n: Integer) -> Self {
        Scalar::Integer(n)
    }
}

impl From<u64> for Scalar {
    fn from(n: u64) -> Self {
        Scalar::Unsigned(n)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Real(Real::new(v))
    }
}

impl From<Real> for Scalar {
    fn from(r: Real) -> Self {
        Scalar::Real(r)
    }
}

impl From<Ieee754> for Scalar {
    fn from(b: Ieee754) -> Self {
        Scalar::Ieee754(b)
    }
}

impl Integer {
    pub fn new(value: i64) -> Self {
        Integer { value, text: None }
    }

    pub(crate) fn decoded(value: i64, text: String) -> Self {
        Integer { value, text: Some(text) }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl Real {
    pub fn new(value: f64) -> Self {
        Real { value, text: None }
    }

    pub(crate) fn decoded(value: f64, text: String) -> Self {
        Real { value, text: Some(text) }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Text this value was decoded from, padding included.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl PartialEq for Real {
    fn eq(&self, other: &Self) -> bool {
        let same = self.value == other.value || (self.value.is_nan() && other.value.is_nan());
        same && self.text == other.text
    }
}

impl Ieee754 {
    pub fn from_f32(v: f32) -> Self {
        Ieee754::Single(v.to_be_bytes())
    }

    pub fn from_f64(v: f64) -> Self {
        Ieee754::Double(v.to_be_bytes())
    }

    /// Wrap raw big-endian bytes; `None` unless 4 or 8 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            4 => bytes.try_into().ok().map(Ieee754::Single),
            8 => bytes.try_into().ok().map(Ieee754::Double),
            _ => None,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Ieee754::Single(b) => b,
            Ieee754::Double(b) => b,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Ieee754::Single(b) => f32::from_be_bytes(*b) as f64,
            Ieee754::Double(b) => f64::from_be_bytes(*b),
        }
    }
}
