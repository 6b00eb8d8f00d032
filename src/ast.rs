//! Descriptor model: the in-memory layout of one TRE tag.

use crate::condition::Condition;
use crate::segment::SegmentKind;
use std::fmt;

/// A named TRE layout.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub tag: String,
    pub location: Location,
    pub nodes: Vec<Node>,
}

/// One step of a layout, walked in order by the codec.
#[derive(Debug, Clone)]
pub enum Node {
    Field(FieldDescriptor),
    Conditional(ConditionalBlock),
    Repeat(RepeatBlock),
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub length: FieldLength,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub format: Option<FormatHint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Fixed-width text, padding preserved.
    String,
    /// ASCII digits.
    FixedInteger,
    /// ASCII decimal or exponential.
    FixedReal,
    /// Big-endian unsigned, 1..=8 bytes.
    UnsignedBinary,
    /// Raw IEEE-754 single or double.
    Ieee754Binary,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::FixedInteger => "integer",
            FieldKind::FixedReal => "real",
            FieldKind::UnsignedBinary => "binary",
            FieldKind::Ieee754Binary => "ieee754",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, FieldKind::String)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldLength {
    Literal(usize),
    /// `length_var`: value of a previously decoded integer field.
    Field(String),
}

/// Display hint for reals; also steers ASCII formatting of `real` fields on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Fixed,
    Scientific,
}

impl FormatHint {
    pub fn parse(s: &str) -> Option<FormatHint> {
        match s.trim() {
            "scientific" | "%e" | "%E" => Some(FormatHint::Scientific),
            "fixed" | "%f" => Some(FormatHint::Fixed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConditionalBlock {
    pub condition: Condition,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct RepeatBlock {
    /// Entry name of the materialized group.
    pub name: String,
    pub count: RepeatCount,
    /// Naming prefix for flattened sub-entries; defaults to `name`.
    pub prefix: Option<String>,
    pub nodes: Vec<Node>,
}

impl RepeatBlock {
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepeatCount {
    Literal(u64),
    Field(String),
}

/// Which segment kinds may carry a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    #[default]
    Any,
    FileHeader,
    ImageSubheader,
    AnySubheader,
    OverflowOnly,
}

impl Location {
    pub fn permits(self, kind: SegmentKind) -> bool {
        match self {
            Location::Any => true,
            Location::FileHeader => matches!(kind, SegmentKind::FileHeader | SegmentKind::DesOverflow),
            Location::ImageSubheader => {
                matches!(kind, SegmentKind::ImageSubheader | SegmentKind::DesOverflow)
            }
            Location::AnySubheader => kind != SegmentKind::FileHeader,
            Location::OverflowOnly => kind == SegmentKind::DesOverflow,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Location::Any => "any segment",
            Location::FileHeader => "file header",
            Location::ImageSubheader => "image subheader",
            Location::AnySubheader => "subheaders",
            Location::OverflowOnly => "DES overflow",
        };
        f.write_str(s)
    }
}

impl Descriptor {
    /// Look up a top-level or nested field by name (first match in document order).
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        find_field_in(&self.nodes, name)
    }

    /// Look up a repeat block by group name anywhere in the layout.
    pub fn find_repeat(&self, name: &str) -> Option<&RepeatBlock> {
        find_repeat_in(&self.nodes, name)
    }

    /// Byte length when every field has a literal length and there are no conditionals or
    /// field-counted repeats.
    pub fn fixed_length(&self) -> Option<usize> {
        fixed_length_of(&self.nodes)
    }
}

pub(crate) fn find_field_in<'a>(nodes: &'a [Node], name: &str) -> Option<&'a FieldDescriptor> {
    for node in nodes {
        let found = match node {
            Node::Field(f) if f.name == name => Some(f),
            Node::Field(_) => None,
            Node::Conditional(c) => find_field_in(&c.nodes, name),
            Node::Repeat(r) => find_field_in(&r.nodes, name),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

pub(crate) fn find_repeat_in<'a>(nodes: &'a [Node], name: &str) -> Option<&'a RepeatBlock> {
    for node in nodes {
        let found = match node {
            Node::Repeat(r) if r.name == name => Some(r),
            Node::Repeat(r) => find_repeat_in(&r.nodes, name),
            Node::Conditional(c) => find_repeat_in(&c.nodes, name),
            Node::Field(_) => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn fixed_length_of(nodes: &[Node]) -> Option<usize> {
    let mut total = 0usize;
    for node in nodes {
        let len = match node {
            Node::Field(f) => match f.length {
                FieldLength::Literal(n) => n,
                FieldLength::Field(_) => return None,
            },
            Node::Conditional(_) => return None,
            Node::Repeat(r) => match r.count {
                RepeatCount::Literal(k) => fixed_length_of(&r.nodes)?.checked_mul(usize::try_from(k).ok()?)?,
                RepeatCount::Field(_) => return None,
            },
        };
        total = total.checked_add(len)?;
    }
    Some(total)
}
