//! Broadcast and payload throughput benchmarks

use beacon_shared_memory::{
    BroadcastEventType, MemfileBroadcast, MemfileBroadcastReader, MemfileBroadcastWriter,
    unlink_memfile,
};
use criterion::{Criterion, criterion_group, criterion_main};
use parking_lot::Mutex;
use std::hint::black_box;
use std::sync::Arc;

/// Benchmark pushing single messages into the ring
fn bench_broadcast(c: &mut Criterion) {
    let name = "beacon_bench_broadcast";
    let mut tx = MemfileBroadcast::create(name, 1024).unwrap();
    let mut rx = MemfileBroadcast::create(name, 1024).unwrap();
    let mut out = Vec::with_capacity(1024);

    c.bench_function("broadcast_message", |b| {
        b.iter(|| {
            black_box(tx.broadcast(1, BroadcastEventType::Updated).unwrap());
        });
    });

    c.bench_function("receive_broadcast_16", |b| {
        b.iter(|| {
            for id in 0..16 {
                tx.broadcast(id, BroadcastEventType::Updated).unwrap();
            }
            out.clear();
            rx.receive_broadcast(&mut out, 0, true).unwrap();
            black_box(out.len());
        });
    });

    drop(tx);
    drop(rx);
    unlink_memfile(name).unwrap();
}

/// Benchmark a payload write followed by a read
fn bench_payload(c: &mut Criterion) {
    let name = "beacon_bench_payload";
    let tx = Arc::new(Mutex::new(MemfileBroadcast::create(name, 1024).unwrap()));
    let rx = Arc::new(Mutex::new(MemfileBroadcast::create(name, 1024).unwrap()));
    let mut reader = MemfileBroadcastReader::bind(rx, true).unwrap();
    let mut writer = MemfileBroadcastWriter::bind(tx);

    let data_1k = vec![0xAAu8; 1024];
    let data_64k = vec![0xAAu8; 65536];

    c.bench_function("payload_write_read_1k", |b| {
        b.iter(|| {
            writer.write(&data_1k).unwrap();
            black_box(reader.read(0).unwrap());
        });
    });

    c.bench_function("payload_write_read_64k", |b| {
        b.iter(|| {
            writer.write(&data_64k).unwrap();
            black_box(reader.read(0).unwrap());
        });
    });

    drop(writer);
    drop(reader);
    unlink_memfile(name).unwrap();
}

criterion_group!(benches, bench_broadcast, bench_payload);
criterion_main!(benches);
