//! Single-rank operation latency for the three strategies.
//!
//! One rank, no peers: this isolates the per-operation overhead of each
//! concurrency discipline (lock traffic, CAS round-trips, checksum work)
//! from actual cross-rank contention.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use poetdht::{CoarseGrained, Dht, FineGrained, GridCell, LockFree};
use rmawin::create_group;

const TOTAL_KEYS: usize = 10_000;

fn bench_strategy<D: Dht, F: FnOnce(&rmawin::Peer) -> D>(
    c: &mut Criterion,
    name: &str,
    make: F,
) {
    let peer = create_group(1).pop().expect("one peer");
    let mut dht = make(&peer);
    let cell = GridCell::with_concentrations([0.1, 0.2, 0.3, 0.4, 0.5]);

    let mut group = c.benchmark_group(name);
    group.throughput(Throughput::Elements(1));

    group.bench_function("put", |b| {
        let mut key = 0i32;
        b.iter(|| {
            dht.put(black_box(key), black_box(&cell));
            key = (key + 1) % TOTAL_KEYS as i32;
        })
    });

    group.bench_function("get", |b| {
        let mut key = 0i32;
        b.iter(|| {
            black_box(dht.get(black_box(key)));
            key = (key + 1) % TOTAL_KEYS as i32;
        })
    });

    group.finish();
}

fn dht_ops(c: &mut Criterion) {
    bench_strategy(c, "lock_free", |p| LockFree::create(p, TOTAL_KEYS));
    bench_strategy(c, "coarse_grained", |p| CoarseGrained::create(p, TOTAL_KEYS));
    bench_strategy(c, "fine_grained", |p| FineGrained::create(p, TOTAL_KEYS));
}

criterion_group!(benches, dht_ops);
criterion_main!(benches);
