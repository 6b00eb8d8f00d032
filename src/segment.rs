//! Segment kinds and their TRE byte budgets.
//!
//! Each header that carries TREs declares the size of its extension region in a fixed-width
//! ASCII length field. That field bounds the region, and part of it is spent on the 3-digit
//! overflow index that precedes the TREs. DES overflow segments carry TREs in their data part,
//! whose length field is 9 digits wide and has no overflow index.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    FileHeader,
    ImageSubheader,
    GraphicSubheader,
    SymbolSubheader,
    LabelSubheader,
    TextSubheader,
    DesOverflow,
}

/// Largest value of a 5-digit header length field.
const HEADER_FIELD_MAX: usize = 99_999;
/// Largest value of the 9-digit DES data length field.
const DES_DATA_MAX: usize = 999_999_999;
/// The `...OFL` overflow index written ahead of the TREs.
const OVERFLOW_INDEX_LEN: usize = 3;

impl SegmentKind {
    pub const ALL: [SegmentKind; 7] = [
        SegmentKind::FileHeader,
        SegmentKind::ImageSubheader,
        SegmentKind::GraphicSubheader,
        SegmentKind::SymbolSubheader,
        SegmentKind::LabelSubheader,
        SegmentKind::TextSubheader,
        SegmentKind::DesOverflow,
    ];

    /// Ceiling of the length field that bounds this kind's TRE region.
    pub fn max_bytes(self) -> usize {
        match self {
            SegmentKind::DesOverflow => DES_DATA_MAX,
            _ => HEADER_FIELD_MAX,
        }
    }

    /// Bytes of the region spent on fixed accounting rather than TREs.
    pub fn overhead(self) -> usize {
        match self {
            SegmentKind::DesOverflow => 0,
            _ => OVERFLOW_INDEX_LEN,
        }
    }

    /// Bytes available for serialized TREs (tag and length prefixes included).
    pub fn tre_budget(self) -> usize {
        self.max_bytes() - self.overhead()
    }

    pub fn fits(self, total: usize) -> bool {
        total <= self.tre_budget()
    }

    pub fn name(self) -> &'static str {
        match self {
            SegmentKind::FileHeader => "file",
            SegmentKind::ImageSubheader => "image",
            SegmentKind::GraphicSubheader => "graphic",
            SegmentKind::SymbolSubheader => "symbol",
            SegmentKind::LabelSubheader => "label",
            SegmentKind::TextSubheader => "text",
            SegmentKind::DesOverflow => "des",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentKind::FileHeader => "file header",
            SegmentKind::ImageSubheader => "image subheader",
            SegmentKind::GraphicSubheader => "graphic subheader",
            SegmentKind::SymbolSubheader => "symbol subheader",
            SegmentKind::LabelSubheader => "label subheader",
            SegmentKind::TextSubheader => "text subheader",
            SegmentKind::DesOverflow => "DES overflow",
        };
        f.write_str(s)
    }
}

impl FromStr for SegmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SegmentKind::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<_> = SegmentKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown segment kind `{}` (expected one of {})", s, names.join(", "))
            })
    }
}
