//! TRE region fuzz target: decode arbitrary bytes with the built-in descriptors. Whatever
//! decodes must re-encode, and the re-encoded bytes must decode to the same tree.
//! Build with: cargo fuzz run region_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let registry = match nitf_tre::Registry::with_builtins() {
        Ok(r) => r,
        Err(_) => return,
    };
    let codec = nitf_tre::Codec::new(&registry);
    let kind = nitf_tre::SegmentKind::DesOverflow;
    if let Ok(tres) = nitf_tre::decode_region(&codec, data, kind) {
        let encoded = nitf_tre::serialize_all(&codec, &tres, kind).expect("decoded region re-encodes");
        let again = nitf_tre::decode_region(&codec, &encoded, kind).expect("re-encoded region decodes");
        assert_eq!(again, tres);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run region_fuzz");
}
