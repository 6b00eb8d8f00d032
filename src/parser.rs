//! Parse descriptor source into [`Descriptor`]s using PEST, validating as we build.

use crate::ast::*;
use crate::condition::Condition;
use crate::error::TreError;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct DescriptorParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Longest tag the 6-byte TAG field can hold.
const MAX_TAG_LEN: usize = 6;

/// Parse a descriptor document. Any defect rejects the whole document.
pub fn parse(source: &str) -> Result<Vec<Descriptor>, TreError> {
    let pairs = DescriptorParser::parse(Rule::document, source)
        .map_err(|e| TreError::schema(format!("parse error: {}", e)))?;
    let document = pairs
        .into_iter()
        .next()
        .ok_or_else(|| TreError::schema("empty parse"))?;
    let mut out: Vec<Descriptor> = Vec::new();
    for inner in document.into_inner() {
        if inner.as_rule() != Rule::tre_def {
            continue;
        }
        let descriptor = build_tre(inner)?;
        if out.iter().any(|d| d.tag == descriptor.tag) {
            return Err(TreError::schema(format!("duplicate tag: {}", descriptor.tag)));
        }
        out.push(descriptor);
    }
    Ok(out)
}

/// Names visible to `length_var`, conditions and repeat counts at the current point.
/// A repeat opens a frame that is dropped when the repeat closes; conditionals share their
/// enclosing frame.
struct Scopes {
    frames: Vec<Vec<String>>,
    last_field: Option<String>,
}

impl Scopes {
    fn new() -> Self {
        Scopes {
            frames: vec![Vec::new()],
            last_field: None,
        }
    }

    fn declare(&mut self, name: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(name.to_string());
        }
        self.last_field = Some(name.to_string());
    }

    fn visible(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.iter().any(|n| n == name))
    }
}

fn build_tre(pair: Pair) -> Result<Descriptor, TreError> {
    let mut tag = String::new();
    let mut location = Location::Any;
    let mut scopes = Scopes::new();
    let mut nodes = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::tag => {
                tag = inner.as_str().to_string();
                if tag.len() > MAX_TAG_LEN {
                    return Err(TreError::schema(format!(
                        "tag {} is longer than {} characters",
                        tag, MAX_TAG_LEN
                    )));
                }
            }
            Rule::location_clause => location = build_location(inner)?,
            _ => {
                if let Some(node) = build_node(inner, &tag, &mut scopes)? {
                    nodes.push(node);
                }
            }
        }
    }
    if nodes.is_empty() {
        return Err(TreError::schema(format!("{}: descriptor has no fields", tag)));
    }
    Ok(Descriptor { tag, location, nodes })
}

fn build_location(pair: Pair) -> Result<Location, TreError> {
    let kind = pair
        .into_inner()
        .next()
        .ok_or_else(|| TreError::schema("location: missing kind"))?;
    match kind.as_str() {
        "file" => Ok(Location::FileHeader),
        "image" => Ok(Location::ImageSubheader),
        "subheader" => Ok(Location::AnySubheader),
        "overflow" => Ok(Location::OverflowOnly),
        other => Err(TreError::schema(format!("unknown location: {}", other))),
    }
}

fn build_node(pair: Pair, tag: &str, scopes: &mut Scopes) -> Result<Option<Node>, TreError> {
    match pair.as_rule() {
        Rule::field_def => {
            let field = build_field(pair, tag, scopes)?;
            scopes.declare(&field.name);
            Ok(Some(Node::Field(field)))
        }
        Rule::if_block => Ok(Some(Node::Conditional(build_conditional(pair, tag, scopes)?))),
        Rule::repeat_block => Ok(Some(Node::Repeat(build_repeat(pair, tag, scopes)?))),
        _ => Ok(None),
    }
}

fn build_field(pair: Pair, tag: &str, scopes: &Scopes) -> Result<FieldDescriptor, TreError> {
    let mut it = pair.into_inner();
    let name = it
        .next()
        .ok_or_else(|| TreError::schema(format!("{}: field without name", tag)))?
        .as_str()
        .to_string();
    let at = |msg: String| TreError::schema(format!("{}.{}: {}", tag, name, msg));

    let kind = match it.next().map(|p| p.as_str()) {
        Some("string") => FieldKind::String,
        Some("integer") => FieldKind::FixedInteger,
        Some("real") => FieldKind::FixedReal,
        Some("binary") => FieldKind::UnsignedBinary,
        Some("ieee754") => FieldKind::Ieee754Binary,
        other => return Err(at(format!("unknown type {:?}", other))),
    };

    let length_pair = it
        .next()
        .and_then(|p| p.into_inner().next())
        .ok_or_else(|| at("missing length".to_string()))?;
    let length = match length_pair.as_rule() {
        Rule::num => FieldLength::Literal(
            length_pair
                .as_str()
                .parse()
                .map_err(|_| at(format!("bad length {}", length_pair.as_str())))?,
        ),
        _ => {
            let reference = length_pair.as_str().to_string();
            if !scopes.visible(&reference) {
                return Err(at(format!("length_var `{}` is not declared before use", reference)));
            }
            FieldLength::Field(reference)
        }
    };

    let mut field = FieldDescriptor {
        name: name.clone(),
        kind,
        length,
        min: None,
        max: None,
        format: None,
    };
    if let Some(attributes) = it.next() {
        for attr in attributes.into_inner() {
            let rule = attr.as_rule();
            let value = attr
                .into_inner()
                .next()
                .ok_or_else(|| at("attribute without value".to_string()))?
                .as_str();
            match rule {
                Rule::minval_attr => field.min = Some(parse_bound(value).map_err(at)?),
                Rule::maxval_attr => field.max = Some(parse_bound(value).map_err(at)?),
                Rule::format_attr => {
                    let text = unquote(value);
                    field.format = Some(
                        FormatHint::parse(text).ok_or_else(|| at(format!("unknown format \"{}\"", text)))?,
                    );
                }
                _ => {}
            }
        }
    }
    check_field(&field).map_err(at)?;
    Ok(field)
}

fn parse_bound(s: &str) -> Result<f64, String> {
    s.parse().map_err(|_| format!("bad bound {}", s))
}

/// Structural rules that the grammar cannot express.
fn check_field(f: &FieldDescriptor) -> Result<(), String> {
    match (&f.kind, &f.length) {
        (_, FieldLength::Literal(0)) => return Err("length must be at least 1".to_string()),
        (FieldKind::UnsignedBinary, FieldLength::Literal(n)) if *n > 8 => {
            return Err(format!("binary width {} outside 1..=8", n));
        }
        (FieldKind::Ieee754Binary, FieldLength::Literal(n)) if *n != 4 && *n != 8 => {
            return Err(format!("ieee754 width {} must be 4 or 8", n));
        }
        (FieldKind::Ieee754Binary, FieldLength::Field(_)) => {
            return Err("ieee754 width must be a literal".to_string());
        }
        _ => {}
    }
    if !f.kind.is_numeric() && (f.min.is_some() || f.max.is_some()) {
        return Err("minval/maxval require a numeric type".to_string());
    }
    if let (Some(lo), Some(hi)) = (f.min, f.max) {
        if lo > hi {
            return Err(format!("minval {} exceeds maxval {}", lo, hi));
        }
    }
    if f.format.is_some() && !matches!(f.kind, FieldKind::FixedReal | FieldKind::Ieee754Binary) {
        return Err("format applies to real and ieee754 fields only".to_string());
    }
    Ok(())
}

fn build_conditional(pair: Pair, tag: &str, scopes: &mut Scopes) -> Result<ConditionalBlock, TreError> {
    let mut it = pair.into_inner();
    let cond_text = it
        .next()
        .map(|p| unquote(p.as_str()).to_string())
        .ok_or_else(|| TreError::schema(format!("{}: if without condition", tag)))?;
    let condition = Condition::parse(&cond_text)?;
    if !scopes.visible(&condition.field) {
        return Err(TreError::schema(format!(
            "{}: condition `{}` references `{}` before it is declared",
            tag, cond_text, condition.field
        )));
    }
    let mut nodes = Vec::new();
    for inner in it {
        if let Some(node) = build_node(inner, tag, scopes)? {
            nodes.push(node);
        }
    }
    Ok(ConditionalBlock { condition, nodes })
}

fn build_repeat(pair: Pair, tag: &str, scopes: &mut Scopes) -> Result<RepeatBlock, TreError> {
    let mut name = String::new();
    let mut count = None;
    let mut prefix = None;
    let mut body = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident if name.is_empty() => name = inner.as_str().to_string(),
            Rule::repeat_count => {
                let c = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| TreError::schema(format!("{}.{}: empty count", tag, name)))?;
                count = Some(match c.as_rule() {
                    Rule::num => RepeatCount::Literal(c.as_str().parse().map_err(|_| {
                        TreError::schema(format!("{}.{}: bad iteration count {}", tag, name, c.as_str()))
                    })?),
                    _ => RepeatCount::Field(c.as_str().to_string()),
                });
            }
            Rule::prefix_clause => {
                prefix = inner.into_inner().next().map(|p| unquote(p.as_str()).to_string());
            }
            _ => body.push(inner),
        }
    }
    // No explicit count: bind to the most recently declared field.
    let count = match count {
        Some(c) => c,
        None => RepeatCount::Field(scopes.last_field.clone().ok_or_else(|| {
            TreError::schema(format!("{}.{}: repeat without count has no preceding field", tag, name))
        })?),
    };
    if let RepeatCount::Field(ref reference) = count {
        if !scopes.visible(reference) {
            return Err(TreError::schema(format!(
                "{}.{}: count field `{}` is not declared before use",
                tag, name, reference
            )));
        }
    }

    scopes.frames.push(Vec::new());
    let mut nodes = Vec::new();
    for inner in body {
        if let Some(node) = build_node(inner, tag, scopes)? {
            nodes.push(node);
        }
    }
    scopes.frames.pop();
    Ok(RepeatBlock { name, count, prefix, nodes })
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(s)
}
