//! Benchmark: decode, encode and full region round trip for a synthetic image-subheader TRE
//! region (MSTGTA frames, a repeated MTIRPB and an unknown tag).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nitf_tre::frame::{decode_region, frame, serialize_all};
use nitf_tre::{Codec, Registry, SegmentKind};

const MSTGTA: &str = "00001ABC123DEF456789XYZ654321POI002The Boss.   2018111623591490231084632Z+01634m+30.482261-086.503262";

fn mtirpb(targets: usize) -> String {
    let mut p = String::new();
    p += "01";
    p += "001";
    p += "0001";
    p += "00001";
    p += "1";
    p += "20240101120000";
    p += "+30.482261-086.503262";
    p += "01634";
    p += "m";
    p += "090";
    p += "L";
    p += "+10.00";
    p += "0.98765";
    p += &format!("{:03}", targets);
    for i in 0..targets {
        p += &format!("{:<23}", format!("+30.{:06}-086.503262", i));
        p += "000.10";
        p += "+010";
        p += "020";
        p += "180";
        p += "-5";
        p += "V";
    }
    p
}

fn region() -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    for _ in 0..20 {
        out.extend(frame("MSTGTA", MSTGTA.as_bytes())?);
    }
    out.extend(frame("MTIRPB", mtirpb(200).as_bytes())?);
    out.extend(frame("ZZZZZZ", &[0xA5; 512])?);
    Ok(out)
}

fn bench_decode_tre(c: &mut Criterion) {
    let registry = Registry::with_builtins().expect("built-ins");
    let codec = Codec::new(&registry);
    let bytes = region().expect("region");
    let kind = SegmentKind::ImageSubheader;
    let tres = decode_region(&codec, &bytes, kind).expect("decode");

    c.bench_function("decode_region", |b| {
        b.iter(|| black_box(decode_region(&codec, black_box(&bytes), kind).map(|t| t.len())))
    });

    c.bench_function("serialize_all", |b| {
        b.iter(|| black_box(serialize_all(&codec, black_box(&tres), kind).map(|v| v.len())))
    });

    c.bench_function("decode_encode_region", |b| {
        b.iter(|| {
            let decoded = decode_region(&codec, black_box(&bytes), kind).expect("decode");
            black_box(serialize_all(&codec, &decoded, kind).map(|v| v.len()))
        })
    });
}

criterion_group!(benches, bench_decode_tre);
criterion_main!(benches);
