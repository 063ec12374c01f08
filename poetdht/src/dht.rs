//! The DHT contract shared by all concurrency strategies.

use crate::cell::GridCell;

/// A distributed hash table over the partitioned bucket windows.
///
/// The three strategies are drop-in implementations of this contract; the
/// simulation driver and the benchmark harness are generic over it.
///
/// Operations never fail outward: bounded-attempt exhaustion degrades to a
/// dropped write or a default payload, so contention shows up in throughput
/// rather than as errors.
pub trait Dht {
    /// Insert or overwrite `key`. May silently drop under extreme contention
    /// (strategy-dependent).
    fn put(&mut self, key: i32, cell: &GridCell);

    /// Read `key`. Returns the default payload for absent or unreadable
    /// keys. Reads never mutate issuer-side state.
    fn get(&self, key: i32) -> GridCell;

    /// Collective synchronization point; every rank must call it. What it
    /// does beyond the barrier is the strategy's business.
    fn sync(&mut self);

    /// Human-readable strategy name for logs and result tables.
    fn strategy_name(&self) -> &'static str;
}
