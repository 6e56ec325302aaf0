//! Codec benchmarks for relay-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use relay_protocol::{codec, Delivery, RelayFrame};

fn bench_decode_small(c: &mut Criterion) {
    let encoded = codec::encode(&RelayFrame::new("bob", "x".repeat(64))).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("relay_64B", |b| {
        b.iter(|| codec::decode(black_box(encoded.as_bytes())))
    });
    group.finish();
}

fn bench_encode_delivery(c: &mut Criterion) {
    let delivery = Delivery::new("x".repeat(64));

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("delivery_64B", |b| {
        b.iter(|| codec::encode(black_box(&delivery)))
    });
    group.finish();
}

fn bench_relay_cycle(c: &mut Criterion) {
    let encoded = codec::encode(&RelayFrame::new("target-user", "y".repeat(256))).unwrap();

    c.bench_function("decode_then_encode_256B", |b| {
        b.iter(|| {
            let frame = codec::decode_relay(black_box(encoded.as_bytes())).unwrap();
            codec::encode(&Delivery::new(frame.message)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_decode_small,
    bench_encode_delivery,
    bench_relay_cycle
);
criterion_main!(benches);
