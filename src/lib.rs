//! # nitf-tre: schema-driven codec for NITF Tagged Record Extensions
//!
//! NITF headers carry extension data as TREs: a 6-character tag, a 5-digit length and a
//! payload whose layout depends on the tag. This crate describes those layouts in a small
//! descriptor language (parsed with PEST), decodes payloads into a value tree and encodes
//! value trees back to byte-identical payloads.
//!
//! ## Descriptor language
//!
//! ```text
//! tre EXAMPL location image {
//!     NUMBANDS: integer(3) [minval = 2, maxval = 104];
//!     MASK: binary(4);
//!     NAME_LEN: integer(2);
//!     NAME: string(NAME_LEN);
//!     if "MASK & 0x80000000" {
//!         EXTRA: string(4);
//!     }
//!     repeat BANDS(NUMBANDS) prefix "BAND" {
//!         ID: string(2);
//!     }
//! }
//! ```
//!
//! Field types: `string`, `integer`, `real` (ASCII), `binary` (big-endian unsigned, 1..=8
//! bytes) and `ieee754` (4 or 8 raw bytes).
//!
//! ## Usage
//!
//! ```no_run
//! use nitf_tre::{frame, Codec, Registry, SegmentKind};
//!
//! # fn main() -> Result<(), nitf_tre::TreError> {
//! let registry = Registry::with_builtins()?;
//! let codec = Codec::new(&registry);
//! let region = std::fs::read("image_tres.bin")?;
//! for tre in frame::decode_region(&codec, &region, SegmentKind::ImageSubheader)? {
//!     println!("{}", nitf_tre::dump::format_tre(&tre, &registry));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Tags without a descriptor are kept as raw bytes and written back unchanged. Decoded ASCII
//! numbers keep their text, and all-space numeric fields decode as `Scalar::Blank`, so decoded
//! payloads encode back to the same bytes.

pub mod ast;
pub mod codec;
pub mod condition;
pub mod dump;
pub mod error;
pub mod frame;
pub mod parser;
pub mod registry;
pub mod segment;
pub mod value;

pub use ast::{Descriptor, FieldKind, Location};
pub use codec::{Codec, CodecOptions, MalformedPolicy, TreRead};
pub use error::{FormatError, TreError};
pub use frame::{decode_region, serialize_all, Partition};
pub use parser::parse;
pub use registry::Registry;
pub use segment::SegmentKind;
pub use value::{Entry, EntryValue, Ieee754, Integer, Real, Record, Scalar, Tre, TreBody};
