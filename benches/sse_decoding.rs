//! Benchmarks for push-channel decoding
//!
//! Measures SSE framing over whole and fragmented chunks, and event mapping.

use agent_session::pipeline::{map_frame, SseDecoder};
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

/// A datamodel turn: progress updates, a heartbeat comment, then the result.
const STREAM_FRAMES: &[&str] = &[
    r#"data: {"type":"progress","message":"Connecting to warehouse"}"#,
    ": keep-alive",
    r#"data: {"type":"progress","message":"Listing databases"}"#,
    r#"data: {"type":"progress","message":"Reading table metadata for SALES"}"#,
    r#"data: {"type":"progress","message":"Summarizing columns"}"#,
    r#"data: {"type":"result","data":{"response":"Found 3 databases: SALES, HR, OPS","sessionId":"s-1","visualization":{"kind":"table","rows":[["SALES",12],["HR",4],["OPS",9]]}}}"#,
];

fn stream_body() -> String {
    STREAM_FRAMES
        .iter()
        .map(|f| format!("{}\r\n\r\n", f))
        .collect()
}

fn bench_decoding(c: &mut Criterion) {
    let body = stream_body();
    let mut group = c.benchmark_group("sse_decoding");
    group.throughput(Throughput::Bytes(body.len() as u64));

    let whole = Bytes::from(body.clone());
    group.bench_function("single_chunk", |b| {
        b.iter(|| {
            let mut decoder = SseDecoder::new();
            let frames = decoder.feed(black_box(&whole));
            black_box(frames.len())
        })
    });

    // Network-sized fragments that split frames and multi-byte boundaries.
    let fragments: Vec<Bytes> = body
        .as_bytes()
        .chunks(17)
        .map(Bytes::copy_from_slice)
        .collect();
    group.bench_function("fragmented_17b", |b| {
        b.iter(|| {
            let mut decoder = SseDecoder::new();
            let mut n = 0;
            for chunk in black_box(&fragments) {
                n += decoder.feed(chunk).len();
            }
            n += decoder.finish().into_iter().count();
            black_box(n)
        })
    });

    group.finish();
}

fn bench_event_mapping(c: &mut Criterion) {
    let whole = Bytes::from(stream_body());
    let frames = SseDecoder::new().feed(&whole);

    c.bench_function("map_frames", |b| {
        b.iter(|| {
            for frame in black_box(&frames).iter().cloned() {
                black_box(map_frame(frame, "bench"));
            }
        })
    });
}

criterion_group!(benches, bench_decoding, bench_event_mapping);
criterion_main!(benches);
