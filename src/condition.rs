//! Condition evaluator for conditional blocks.
//!
//! The grammar is closed: `<field> <op> <literal>` where `op` is `=` (or `==`), `!=` or `&`.
//! Literals are decimal or `0x` hex integers; `=` and `!=` also accept a bare alphanumeric
//! token, compared against the referenced field's trimmed text. Everything else is rejected
//! when the condition is parsed, which happens at registration time.

use crate::error::{FormatError, TreError};
use crate::value::Scalar;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    Equals,
    NotEquals,
    /// `field & mask` is non-zero.
    BitAnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionLiteral {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: ConditionOp,
    pub literal: ConditionLiteral,
    source: String,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Condition, TreError> {
        let unsupported = |reason: &str| TreError::UnsupportedCondition {
            condition: source.to_string(),
            reason: reason.to_string(),
        };
        let s = source.trim();
        let (op_at, op, op_len) = find_operator(s).ok_or_else(|| unsupported("no operator"))?;
        let field = s[..op_at].trim();
        let rhs = s[op_at + op_len..].trim();
        if !is_ident(field) {
            return Err(unsupported("left operand must be a single field name"));
        }
        if rhs.is_empty() {
            return Err(unsupported("missing literal"));
        }
        if find_operator(rhs).is_some() {
            return Err(unsupported("only one operator is allowed"));
        }
        if rhs.split_whitespace().count() != 1 {
            return Err(unsupported("compound expressions are not supported"));
        }
        let literal = match parse_int(rhs) {
            Some(n) => ConditionLiteral::Int(n),
            None if op != ConditionOp::BitAnd && rhs.chars().all(|c| c.is_ascii_alphanumeric()) => {
                ConditionLiteral::Text(rhs.to_string())
            }
            None => return Err(unsupported("literal must be an integer")),
        };
        if op == ConditionOp::BitAnd && literal == ConditionLiteral::Int(0) {
            return Err(unsupported("bit mask must be non-zero"));
        }
        Ok(Condition {
            field: field.to_string(),
            op,
            literal,
            source: source.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against the value decoded for `self.field`. `owner` names the block for errors.
    pub fn evaluate(&self, value: Option<&Scalar>, owner: &str) -> Result<bool, FormatError> {
        let value = value.ok_or_else(|| FormatError::MissingReference {
            field: owner.to_string(),
            reference: self.field.clone(),
        })?;
        let bad_number = || FormatError::BadNumber {
            field: self.field.clone(),
            text: value.to_string(),
        };
        match (&self.literal, self.op) {
            (ConditionLiteral::Int(mask), ConditionOp::BitAnd) => {
                let v = value.as_u64().ok_or_else(bad_number)?;
                Ok(v & (*mask as u64) != 0)
            }
            (ConditionLiteral::Int(n), op) => {
                let v = value.as_i64().ok_or_else(bad_number)?;
                Ok((v == *n) == (op == ConditionOp::Equals))
            }
            (ConditionLiteral::Text(t), op) => {
                let v = value.to_string();
                Ok((v.trim() == t) == (op == ConditionOp::Equals))
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn find_operator(s: &str) -> Option<(usize, ConditionOp, usize)> {
    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'!' if bytes.get(i + 1) == Some(&b'=') => return Some((i, ConditionOp::NotEquals, 2)),
            b'=' if bytes.get(i + 1) == Some(&b'=') => return Some((i, ConditionOp::Equals, 2)),
            b'=' => return Some((i, ConditionOp::Equals, 1)),
            b'&' => return Some((i, ConditionOp::BitAnd, 1)),
            b'<' | b'>' | b'|' | b'(' | b')' => return None,
            _ => {}
        }
    }
    None
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_int(s: &str) -> Option<i64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as i64);
    }
    s.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Scalar {
        Scalar::from(n)
    }

    #[test]
    fn parse_equals_forms() {
        let c = Condition::parse("FLAG=1").expect("parse");
        assert_eq!(c.field, "FLAG");
        assert_eq!(c.op, ConditionOp::Equals);
        assert_eq!(c.literal, ConditionLiteral::Int(1));
        let c = Condition::parse("FLAG == 1").expect("parse");
        assert_eq!(c.op, ConditionOp::Equals);
        let c = Condition::parse(" FLAG != 0 ").expect("parse");
        assert_eq!(c.op, ConditionOp::NotEquals);
    }

    #[test]
    fn parse_hex_mask() {
        let c = Condition::parse("EXISTENCE_MASK & 0x80000000").expect("parse");
        assert_eq!(c.op, ConditionOp::BitAnd);
        assert_eq!(c.literal, ConditionLiteral::Int(0x8000_0000));
    }

    #[test]
    fn parse_text_literal() {
        let c = Condition::parse("BAPF=I").expect("parse");
        assert_eq!(c.literal, ConditionLiteral::Text("I".to_string()));
    }

    #[test]
    fn reject_compound_and_chained() {
        for bad in [
            "A=1 AND B=2",
            "A=1 && B=2",
            "A=B=1",
            "A<3",
            "(A=1)",
            "A",
            "=1",
            "A=",
            "A & X",
            "A & 0",
            "A B = 1",
        ] {
            let err = Condition::parse(bad).expect_err(bad);
            assert!(matches!(err, TreError::UnsupportedCondition { .. }), "{}: {:?}", bad, err);
        }
    }

    #[test]
    fn evaluate_equals_and_not_equals() {
        let eq = Condition::parse("N=3").expect("parse");
        assert!(eq.evaluate(Some(&int(3)), "blk").expect("eval"));
        assert!(!eq.evaluate(Some(&int(4)), "blk").expect("eval"));
        let ne = Condition::parse("N!=3").expect("parse");
        assert!(ne.evaluate(Some(&int(4)), "blk").expect("eval"));
        assert!(!ne.evaluate(Some(&int(3)), "blk").expect("eval"));
    }

    #[test]
    fn evaluate_bit_mask() {
        let c = Condition::parse("M & 0x4").expect("parse");
        assert!(c.evaluate(Some(&Scalar::Unsigned(0b110)), "blk").expect("eval"));
        assert!(!c.evaluate(Some(&Scalar::Unsigned(0b011)), "blk").expect("eval"));
    }

    #[test]
    fn evaluate_text_against_padded_value() {
        let c = Condition::parse("BAPF=I").expect("parse");
        assert!(c.evaluate(Some(&Scalar::Text("I".into())), "blk").expect("eval"));
        assert!(!c.evaluate(Some(&Scalar::Text("R".into())), "blk").expect("eval"));
    }

    #[test]
    fn absent_sibling_is_an_error() {
        let c = Condition::parse("N=1").expect("parse");
        let err = c.evaluate(None, "blk").expect_err("absent");
        assert!(matches!(err, FormatError::MissingReference { ref reference, .. } if reference == "N"));
    }
}
