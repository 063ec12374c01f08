//! Distributed hash table substrate for a stencil-style reaction-diffusion
//! simulation, comparing three concurrency disciplines over one-sided
//! memory windows.
//!
//! Each rank owns a round-robin share of a flat keyspace and exposes its
//! bucket array as a byte-addressable window (`rmawin`). Three drop-in
//! strategies implement the same [`Dht`] contract:
//!
//! - [`CoarseGrained`]: whole-window shared/exclusive locking with linear
//!   probing; strongly serialized per owning window.
//! - [`FineGrained`]: a per-bucket remote spinlock built from CAS on the
//!   bucket's status word; bounded spin, dropped writes under contention.
//! - [`LockFree`]: unconditioned last-writer-wins puts; readers validate a
//!   stored content checksum and retry torn observations.
//!
//! The [`sim`] module drives the reaction-diffusion access pattern over a
//! chosen strategy; the [`bench`] module measures read/write/mixed
//! throughput and runs the cross-strategy scalability comparison.

pub mod bench;
pub mod bucket;
pub mod cell;
pub mod coarse;
pub mod dht;
pub mod fine;
pub mod lockfree;
pub mod partition;
pub mod sim;
pub mod workload;

pub use bucket::{checksum, Bucket, BUCKET_SIZE, STATUS_EMPTY, STATUS_LOCKED, STATUS_OCCUPIED};
pub use cell::{GridCell, NUM_SPECIES};
pub use coarse::CoarseGrained;
pub use dht::Dht;
pub use fine::FineGrained;
pub use lockfree::LockFree;
pub use partition::Partition;
pub use sim::{SimulationParams, Simulator};
