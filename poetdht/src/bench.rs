//! Microbenchmarks and the cross-strategy scalability study.
//!
//! Durations are measured barrier-to-barrier; the slowest rank's time is the
//! group's time, so aggregate throughput is computed from the gathered
//! maximum and comes out identical on every rank.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rmawin::Peer;

use crate::coarse::CoarseGrained;
use crate::dht::Dht;
use crate::fine::FineGrained;
use crate::lockfree::LockFree;
use crate::workload::{self, AccessEntry};

/// Operations per process in a standard run.
pub const BASE_OPERATIONS: usize = 50_000;

/// Read ratio of the scalability sweep's mixed workload.
pub const SWEEP_READ_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct BenchResult {
    /// Aggregate operations per second across the whole group.
    pub ops_per_sec: f64,
    /// Operations issued by the whole group.
    pub total_operations: u64,
    /// Slowest rank's wall time.
    pub duration: Duration,
}

/// One row of the scalability comparison at a fixed process count.
#[derive(Debug, Clone, Copy)]
pub struct ScalabilityRow {
    pub processes: usize,
    pub lock_free_ops: f64,
    pub coarse_grained_ops: f64,
    pub fine_grained_ops: f64,
    pub speedup: f64,
}

/// Drive `pattern` through the DHT and report group throughput.
fn measure<D: Dht + ?Sized>(dht: &mut D, peer: &Peer, pattern: &[AccessEntry], seed: u64) -> BenchResult {
    let mut rng = SmallRng::seed_from_u64(seed ^ 0x9e3779b97f4a7c15);

    peer.barrier();
    let start = Instant::now();
    for entry in pattern {
        if entry.is_read {
            std::hint::black_box(dht.get(entry.key));
        } else {
            let cell = workload::random_cell(&mut rng);
            dht.put(entry.key, &cell);
        }
    }
    peer.barrier();
    let local = start.elapsed();

    let slowest = peer
        .all_gather_f64(local.as_secs_f64())
        .into_iter()
        .fold(0.0, f64::max);
    let total_operations = (pattern.len() * peer.size()) as u64;
    BenchResult {
        ops_per_sec: total_operations as f64 / slowest,
        total_operations,
        duration: Duration::from_secs_f64(slowest),
    }
}

/// Read-only benchmark: uniform random keys, `get` only.
pub fn run_read_benchmark<D: Dht + ?Sized>(
    dht: &mut D,
    peer: &Peer,
    total_keys: usize,
    operations_per_process: usize,
    seed: u64,
) -> BenchResult {
    let pattern = workload::generate_pattern(total_keys, 1.0, operations_per_process, seed);
    measure(dht, peer, &pattern, seed)
}

/// Write-only benchmark: uniform random keys, freshly randomized payloads.
pub fn run_write_benchmark<D: Dht + ?Sized>(
    dht: &mut D,
    peer: &Peer,
    total_keys: usize,
    operations_per_process: usize,
    seed: u64,
) -> BenchResult {
    let pattern = workload::generate_pattern(total_keys, 0.0, operations_per_process, seed);
    measure(dht, peer, &pattern, seed)
}

/// Mixed benchmark: Bernoulli(`read_ratio`) chooses `get` versus `put`.
pub fn run_mixed_benchmark<D: Dht + ?Sized>(
    dht: &mut D,
    peer: &Peer,
    total_keys: usize,
    operations_per_process: usize,
    read_ratio: f64,
    seed: u64,
) -> BenchResult {
    let pattern = workload::generate_pattern(total_keys, read_ratio, operations_per_process, seed);
    measure(dht, peer, &pattern, seed)
}

/// Run the mixed sweep workload on all three strategies at the current
/// group size. Every rank returns the same row; rank 0 persists it.
pub fn run_scalability_study(
    peer: &Peer,
    total_cells: usize,
    operations_per_process: usize,
) -> ScalabilityRow {
    let rank = peer.rank();
    if rank == 0 {
        eprintln!("testing with {} processes...", peer.size());
    }
    let seed = rank as u64 * 1000 + 17;

    let mut lock_free = LockFree::create(peer, total_cells);
    let lf = run_mixed_benchmark(
        &mut lock_free,
        peer,
        total_cells,
        operations_per_process,
        SWEEP_READ_RATIO,
        seed,
    );
    drop(lock_free);
    peer.barrier();

    let mut coarse = CoarseGrained::create(peer, total_cells);
    let cg = run_mixed_benchmark(
        &mut coarse,
        peer,
        total_cells,
        operations_per_process,
        SWEEP_READ_RATIO,
        seed,
    );
    drop(coarse);
    peer.barrier();

    let mut fine = FineGrained::create(peer, total_cells);
    let fg = run_mixed_benchmark(
        &mut fine,
        peer,
        total_cells,
        operations_per_process,
        SWEEP_READ_RATIO,
        seed,
    );
    if rank == 0 && fine.dropped_writes() > 0 {
        eprintln!(
            "  rank 0: {} writes dropped under contention",
            fine.dropped_writes()
        );
    }
    drop(fine);
    peer.barrier();

    ScalabilityRow {
        processes: peer.size(),
        lock_free_ops: lf.ops_per_sec,
        coarse_grained_ops: cg.ops_per_sec,
        fine_grained_ops: fg.ops_per_sec,
        speedup: lf.ops_per_sec / cg.ops_per_sec,
    }
}

/// Rank-0 result table, one line per strategy plus the speedup.
pub fn print_scalability_table(rows: &[ScalabilityRow]) {
    eprintln!("procs | lock-free (ops/s) | coarse (ops/s) | fine (ops/s) | speedup");
    eprintln!("------|-------------------|----------------|--------------|--------");
    for row in rows {
        eprintln!(
            "{:5} | {:17.0} | {:14.0} | {:12.0} | {:6.2}x",
            row.processes,
            row.lock_free_ops,
            row.coarse_grained_ops,
            row.fine_grained_ops,
            row.speedup
        );
    }
}
