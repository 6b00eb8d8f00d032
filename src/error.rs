//! Error taxonomy shared by the registry, parser and codec.

use crate::ast::Location;
use crate::segment::SegmentKind;

#[derive(Debug, thiserror::Error)]
pub enum TreError {
    /// Malformed descriptor document. Nothing from the document is registered.
    #[error("schema: {0}")]
    Schema(String),
    /// Condition string outside the `<field> <op> <literal>` grammar.
    #[error("unsupported condition `{condition}`: {reason}")]
    UnsupportedCondition { condition: String, reason: String },
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl TreError {
    /// Name of the offending field (or tag) for data errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            TreError::Format(e) => Some(e.field()),
            _ => None,
        }
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        TreError::Schema(msg.into())
    }
}

/// Decode/encode-time data violation. Every variant names the field it concerns.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormatError {
    #[error("{field}: value {value} is below minval {min} (allowed {})", bounds_text(Some(.min), .max.as_ref()))]
    BelowMinimum { field: String, value: String, min: f64, max: Option<f64> },
    #[error("{field}: value {value} is above maxval {max} (allowed {})", bounds_text(.min.as_ref(), Some(.max)))]
    AboveMaximum { field: String, value: String, min: Option<f64>, max: f64 },
    #[error("{field}: actual length did not match specified length (expected {expected}, actual {actual})")]
    LengthMismatch { field: String, expected: usize, actual: usize },
    #[error("{field}: formatted value `{value}` does not fit in {width} bytes")]
    TooWide { field: String, value: String, width: usize },
    #[error("cannot serialize null entry for {field}")]
    NullEntry { field: String },
    #[error("{field}: entry is out of descriptor order or not part of the descriptor")]
    UnexpectedEntry { field: String },
    #[error("{field}: expected a {expected} value, found {found}")]
    KindMismatch { field: String, expected: &'static str, found: &'static str },
    #[error("{field}: cannot parse `{text}` as a number")]
    BadNumber { field: String, text: String },
    #[error("{field}: text contains a character outside Latin-1")]
    BadText { field: String },
    #[error("{field}: references `{reference}`, which has no decoded value in scope")]
    MissingReference { field: String, reference: String },
    #[error("{field}: needed {needed} bytes, only {available} available")]
    Truncated { field: String, needed: usize, available: usize },
    #[error("{field}: repeat count {count} exceeds the {available} payload bytes left and records read nothing")]
    CountOverrun { field: String, count: u64, available: usize },
    #[error("{field}: descriptor consumed {consumed} of {declared} payload bytes")]
    TrailingData { field: String, consumed: usize, declared: usize },
    #[error("{field}: width {width} is not valid for {kind}")]
    BadWidth { field: String, kind: &'static str, width: usize },
    #[error("{field}: tag restricted to {location} cannot be written to {segment}")]
    LocationViolation { field: String, location: Location, segment: SegmentKind },
    #[error("{field}: no descriptor registered to serialize structured entries")]
    UnknownDescriptor { field: String },
    #[error("{field}: TREs exceed valid limit for source {segment} ({total} > {limit} bytes)")]
    BudgetExceeded { field: String, segment: SegmentKind, total: usize, limit: usize },
    #[error("{field}: malformed TRE header: {reason}")]
    BadHeader { field: String, reason: String },
}

impl FormatError {
    pub fn field(&self) -> &str {
        match self {
            FormatError::BelowMinimum { field, .. }
            | FormatError::AboveMaximum { field, .. }
            | FormatError::LengthMismatch { field, .. }
            | FormatError::TooWide { field, .. }
            | FormatError::NullEntry { field }
            | FormatError::UnexpectedEntry { field }
            | FormatError::KindMismatch { field, .. }
            | FormatError::BadNumber { field, .. }
            | FormatError::BadText { field }
            | FormatError::MissingReference { field, .. }
            | FormatError::Truncated { field, .. }
            | FormatError::CountOverrun { field, .. }
            | FormatError::TrailingData { field, .. }
            | FormatError::BadWidth { field, .. }
            | FormatError::LocationViolation { field, .. }
            | FormatError::UnknownDescriptor { field }
            | FormatError::BudgetExceeded { field, .. }
            | FormatError::BadHeader { field, .. } => field,
        }
    }
}

fn bounds_text(min: Option<&f64>, max: Option<&f64>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("{}..={}", lo, hi),
        (Some(lo), None) => format!(">= {}", lo),
        (None, Some(hi)) => format!("<= {}", hi),
        (None, None) => "any".to_string(),
    }
}
