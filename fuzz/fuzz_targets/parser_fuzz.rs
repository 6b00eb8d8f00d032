//! Descriptor fuzz target. The input is split at the first NUL: the text before it is a
//! descriptor document, the bytes after it a payload decoded against every descriptor the
//! document defines. Neither step may panic, and whatever decodes must encode again.
//! Build with: cargo fuzz run parser_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let split = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let source = match std::str::from_utf8(&data[..split]) {
        Ok(x) => x,
        Err(_) => return,
    };
    let payload = data.get(split + 1..).unwrap_or_default();

    let descriptors = match nitf_tre::parse(source) {
        Ok(d) => d,
        Err(_) => return,
    };
    let registry = nitf_tre::Registry::new();
    let codec = nitf_tre::Codec::new(&registry);
    for descriptor in &descriptors {
        let _ = descriptor.fixed_length();
        if let Ok(tre) = codec.decode_with(descriptor, payload) {
            let entries = tre.entries().unwrap_or_default();
            let encoded = codec.encode_with(descriptor, entries).expect("decoded payload encodes");
            assert_eq!(encoded, payload);
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parser_fuzz");
}
