//! Coarse-grained strategy: whole-window locking with linear probing.
//!
//! Every operation takes the owner's window lock (shared for reads,
//! exclusive for writes) and probes linearly from the key's home slot. Each
//! round-trip inside the critical section is individually flushed before its
//! result is inspected; this per-operation serialization is what makes the
//! strategy the baseline of the comparison.

use rmawin::{Peer, Window};

use crate::bucket::{Bucket, BUCKET_SIZE, STATUS_EMPTY};
use crate::cell::GridCell;
use crate::dht::Dht;
use crate::partition::Partition;

/// Probe attempts before a lookup or insert is abandoned.
pub const MAX_PROBES: usize = 50;

pub struct CoarseGrained {
    peer: Peer,
    win: Window,
    part: Partition,
}

impl CoarseGrained {
    /// Collectively create the strategy for `total_entries` global keys.
    pub fn create(peer: &Peer, total_entries: usize) -> Self {
        Self::with_partition(peer, Partition::new(total_entries, peer.size()))
    }

    /// Collectively create with an explicit partition (used to shrink the
    /// table and exercise probing).
    pub fn with_partition(peer: &Peer, part: Partition) -> Self {
        let win = Window::create(peer, part.window_len());
        Self {
            peer: peer.clone(),
            win,
            part,
        }
    }
}

impl Dht for CoarseGrained {
    fn put(&mut self, key: i32, cell: &GridCell) {
        let target = self.part.owner(key);
        let mut slot = self.part.slot(key);

        let _lock = self.win.lock_exclusive(target);

        let mut buf = [0u8; BUCKET_SIZE];
        for _ in 0..MAX_PROBES {
            self.win.get(target, slot * BUCKET_SIZE, &mut buf);
            self.win.flush(target);
            let probe = Bucket::decode(&buf);

            if probe.status == STATUS_EMPTY || probe.key == key {
                let bucket = Bucket::occupied(key, *cell);
                bucket.encode(&mut buf);
                self.win.put(target, slot * BUCKET_SIZE, &buf);
                self.win.flush(target);
                return;
            }

            // Collision: try the next slot.
            slot = (slot + 1) % self.part.local_capacity();
        }
        // Capacity exhausted; the write is dropped.
    }

    fn get(&self, key: i32) -> GridCell {
        let target = self.part.owner(key);
        let mut slot = self.part.slot(key);

        let _lock = self.win.lock_shared(target);

        let mut buf = [0u8; BUCKET_SIZE];
        for _ in 0..MAX_PROBES {
            self.win.get(target, slot * BUCKET_SIZE, &mut buf);
            self.win.flush(target);
            let probe = Bucket::decode(&buf);

            if probe.status == STATUS_EMPTY {
                // Hole reached: the key is absent.
                return GridCell::default();
            }
            if probe.key == key {
                return probe.cell;
            }

            slot = (slot + 1) % self.part.local_capacity();
        }
        GridCell::default()
    }

    fn sync(&mut self) {
        // Locks were per-operation; nothing is outstanding.
        self.peer.barrier();
    }

    fn strategy_name(&self) -> &'static str {
        "Coarse-Grained (window lock)"
    }
}
