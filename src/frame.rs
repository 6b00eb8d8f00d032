//! TRE framing: each TRE is a 6-byte TAG, a 5-digit ASCII LENGTH and LENGTH payload bytes.
//!
//! A header region is a run of such frames. Writers must keep the run within the segment's
//! budget; whatever does not fit can be moved to a DES overflow segment.

use crate::codec::{Codec, TreRead};
use crate::error::{FormatError, TreError};
use crate::segment::SegmentKind;
use crate::value::Tre;
use std::io::Cursor;
use tracing::debug;

pub const TAG_LEN: usize = 6;
pub const LENGTH_DIGITS: usize = 5;
pub const HEADER_LEN: usize = TAG_LEN + LENGTH_DIGITS;
/// Largest payload a 5-digit LENGTH can declare.
pub const MAX_PAYLOAD: usize = 99_999;

/// Field name used in errors raised before a tag is known.
const REGION: &str = "TRE region";

/// TREs split between the segment itself and a DES overflow segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub inline: Vec<Tre>,
    pub overflow: Vec<Tre>,
}

/// Read one framed TRE and decode its payload for a segment of `kind`.
pub fn read_tre<R: TreRead + ?Sized>(codec: &Codec, reader: &mut R, kind: SegmentKind) -> Result<Tre, TreError> {
    let header = reader.read_exact_bytes(HEADER_LEN).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TreError::from(FormatError::BadHeader {
                field: REGION.to_string(),
                reason: "incomplete TAG/LENGTH header".to_string(),
            })
        } else {
            TreError::Io(e)
        }
    })?;
    let (tag, len) = parse_header(&header)?;
    codec.decode(&tag, reader, len, kind)
}

fn parse_header(header: &[u8]) -> Result<(String, usize), FormatError> {
    if header.len() != HEADER_LEN {
        return Err(FormatError::BadHeader {
            field: REGION.to_string(),
            reason: format!("header is {} bytes, expected {}", header.len(), HEADER_LEN),
        });
    }
    let tag: String = header[..TAG_LEN].iter().map(|&b| b as char).collect();
    let tag = tag.trim_end().to_string();
    if tag.is_empty() {
        return Err(FormatError::BadHeader {
            field: REGION.to_string(),
            reason: "blank tag".to_string(),
        });
    }
    let digits = &header[TAG_LEN..HEADER_LEN];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(FormatError::BadHeader {
            field: tag,
            reason: format!(
                "length `{}` is not {} ASCII digits",
                String::from_utf8_lossy(digits),
                LENGTH_DIGITS
            ),
        });
    }
    let len = digits.iter().fold(0usize, |n, d| n * 10 + usize::from(d - b'0'));
    Ok((tag, len))
}

/// Decode every TRE in a header region, in order.
pub fn decode_region(codec: &Codec, bytes: &[u8], kind: SegmentKind) -> Result<Vec<Tre>, TreError> {
    let mut r = Cursor::new(bytes);
    let mut tres = Vec::new();
    loop {
        let remaining = bytes.len() - r.position() as usize;
        if remaining == 0 {
            break;
        }
        if remaining < HEADER_LEN {
            return Err(FormatError::BadHeader {
                field: REGION.to_string(),
                reason: format!("{} trailing bytes cannot hold a TAG/LENGTH header", remaining),
            }
            .into());
        }
        tres.push(read_tre(codec, &mut r, kind)?);
    }
    debug!(count = tres.len(), segment = %kind, "decoded TRE region");
    Ok(tres)
}

/// Serialize one TRE with its TAG/LENGTH prefix.
pub fn encode_framed(codec: &Codec, tre: &Tre, kind: SegmentKind) -> Result<Vec<u8>, TreError> {
    let payload = codec.encode_for(tre, kind)?;
    Ok(frame(&tre.name, &payload)?)
}

/// Prefix a payload with its TAG (space padded) and LENGTH (zero padded).
pub fn frame(tag: &str, payload: &[u8]) -> Result<Vec<u8>, FormatError> {
    if tag.is_empty() || tag.len() > TAG_LEN || !tag.is_ascii() {
        return Err(FormatError::BadHeader {
            field: tag.to_string(),
            reason: format!("tag must be 1 to {} ASCII characters", TAG_LEN),
        });
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(FormatError::BadHeader {
            field: tag.to_string(),
            reason: format!("payload of {} bytes exceeds LENGTH maximum {}", payload.len(), MAX_PAYLOAD),
        });
    }
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(format!("{:<6}{:05}", tag, payload.len()).as_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Serialize a run of TREs for a segment of `kind`. Fails without output if any TRE fails or
/// the run exceeds the segment's budget.
pub fn serialize_all(codec: &Codec, tres: &[Tre], kind: SegmentKind) -> Result<Vec<u8>, TreError> {
    let mut out = Vec::new();
    let mut first_over = None;
    for tre in tres {
        out.extend(encode_framed(codec, tre, kind)?);
        if first_over.is_none() && !kind.fits(out.len()) {
            first_over = Some(tre.name.as_str());
        }
    }
    if let Some(tag) = first_over {
        return Err(FormatError::BudgetExceeded {
            field: tag.to_string(),
            segment: kind,
            total: out.len(),
            limit: kind.tre_budget(),
        }
        .into());
    }
    Ok(out)
}

/// Split TREs between a segment of `kind` and DES overflow. TREs stay inline, in order, while
/// they fit; the first one that does not fit and everything after it moves to overflow.
pub fn partition_overflow(codec: &Codec, tres: Vec<Tre>, kind: SegmentKind) -> Result<Partition, TreError> {
    let mut partition = Partition::default();
    let mut inline_total = 0;
    let mut overflow_total = 0;
    for tre in tres {
        if partition.overflow.is_empty() {
            let size = encode_framed(codec, &tre, kind)?.len();
            if kind.fits(inline_total + size) {
                inline_total += size;
                partition.inline.push(tre);
                continue;
            }
        }
        overflow_total += encode_framed(codec, &tre, SegmentKind::DesOverflow)?.len();
        if !SegmentKind::DesOverflow.fits(overflow_total) {
            return Err(FormatError::BudgetExceeded {
                field: tre.name.clone(),
                segment: SegmentKind::DesOverflow,
                total: overflow_total,
                limit: SegmentKind::DesOverflow.tre_budget(),
            }
            .into());
        }
        partition.overflow.push(tre);
    }
    debug!(
        inline = partition.inline.len(),
        overflow = partition.overflow.len(),
        segment = %kind,
        "partitioned TREs"
    );
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        assert_eq!(frame("ABC", b"xy").unwrap(), b"ABC   00002xy".to_vec());
        assert!(frame("TOOLONG", b"").is_err());
        assert!(frame("", b"").is_err());
    }

    #[test]
    fn header_parsing() {
        assert_eq!(parse_header(b"MSTGTA00101").unwrap(), ("MSTGTA".to_string(), 101));
        assert_eq!(parse_header(b"AB    00000").unwrap(), ("AB".to_string(), 0));
        assert!(matches!(parse_header(b"MSTGTA0010x"), Err(FormatError::BadHeader { .. })));
        assert!(matches!(parse_header(b"      00001"), Err(FormatError::BadHeader { .. })));
        assert!(matches!(parse_header(b"MSTG"), Err(FormatError::BadHeader { .. })));
    }

    /// Reader that hands back fewer bytes than asked for.
    struct ShortReader;

    impl TreRead for ShortReader {
        fn read_exact_bytes(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
            Ok(vec![b'A'; n.min(4)])
        }

        fn position(&self) -> u64 {
            0
        }
    }

    #[test]
    fn short_header_read_is_rejected() {
        let registry = crate::registry::Registry::new();
        let codec = Codec::new(&registry);
        let err = read_tre(&codec, &mut ShortReader, SegmentKind::ImageSubheader).unwrap_err();
        assert!(matches!(err, TreError::Format(FormatError::BadHeader { .. })));
    }
}
