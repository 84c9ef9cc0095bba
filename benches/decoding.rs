use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mailwindow::parser::{Decode, MessageDecoder};

fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_decode_multipart(c: &mut Criterion) {
    let raw = fixture("multipart_attachment.eml");
    let decoder = MessageDecoder::new();

    c.bench_function("decode_multipart", |b| b.iter(|| decoder.decode(1, &raw)));
}

fn bench_decode_html(c: &mut Criterion) {
    let raw = fixture("html_only.eml");
    let decoder = MessageDecoder::new();

    c.bench_function("decode_html_only", |b| b.iter(|| decoder.decode(1, &raw)));
}

fn bench_decode_fallback(c: &mut Criterion) {
    let raw = fixture("base64_fragment.eml");
    let decoder = MessageDecoder::new();

    c.bench_function("decode_raw_fallback", |b| b.iter(|| decoder.decode(1, &raw)));
}

criterion_group!(
    benches,
    bench_decode_multipart,
    bench_decode_html,
    bench_decode_fallback
);
criterion_main!(benches);
