//! Keyspace partitioning: global key -> (owner rank, local slot).
//!
//! Keys are dealt round-robin across ranks (`key % size`), and a rank's
//! local index for its keys is `key / size`. The local bucket array is
//! oversized by a factor of two so linear probing terminates quickly; the
//! slot is additionally wrapped by the local capacity as a safety net.

use crate::bucket::BUCKET_SIZE;

/// Minimum bucket count per rank regardless of problem size.
pub const MIN_LOCAL_CAPACITY: usize = 100;

/// The key -> (owner, slot) mapping shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct Partition {
    size: usize,
    local_capacity: usize,
}

impl Partition {
    /// Partition `total_entries` keys over `size` ranks, sizing each rank's
    /// bucket array to keep the load factor at or below one half.
    pub fn new(total_entries: usize, size: usize) -> Self {
        assert!(size > 0, "partition requires at least one rank");
        let local_capacity = (2 * total_entries.div_ceil(size)).max(MIN_LOCAL_CAPACITY);
        Self {
            size,
            local_capacity,
        }
    }

    /// Partition with an explicit per-rank bucket count. Capacities below the
    /// usual sizing shrink the table, forcing probing collisions.
    pub fn with_local_capacity(size: usize, local_capacity: usize) -> Self {
        assert!(size > 0, "partition requires at least one rank");
        assert!(local_capacity > 0, "local capacity must be positive");
        Self {
            size,
            local_capacity,
        }
    }

    /// Rank that owns `key`.
    #[inline]
    pub fn owner(&self, key: i32) -> usize {
        debug_assert!(key >= 0);
        key as usize % self.size
    }

    /// Home slot of `key` within its owner's bucket array.
    #[inline]
    pub fn slot(&self, key: i32) -> usize {
        debug_assert!(key >= 0);
        (key as usize / self.size) % self.local_capacity
    }

    /// Buckets per rank.
    #[inline]
    pub fn local_capacity(&self) -> usize {
        self.local_capacity
    }

    /// Window length in bytes for this partition's bucket array.
    #[inline]
    pub fn window_len(&self) -> usize {
        self.local_capacity * BUCKET_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_maps_inside_the_partition() {
        let total = 1500;
        for size in [1, 2, 3, 4, 7] {
            let part = Partition::new(total, size);
            for key in 0..total as i32 {
                assert!(part.owner(key) < size);
                assert!(part.slot(key) < part.local_capacity());
            }
        }
    }

    #[test]
    fn capacity_keeps_load_factor_at_most_half() {
        for (total, size) in [(1000, 4), (750_000, 16), (10, 3)] {
            let part = Partition::new(total, size);
            let per_owner = total.div_ceil(size);
            assert!(part.local_capacity() >= 2 * per_owner);
            assert!(part.local_capacity() >= MIN_LOCAL_CAPACITY);
        }
    }

    #[test]
    fn small_tables_get_the_floor_capacity() {
        let part = Partition::new(10, 4);
        assert_eq!(part.local_capacity(), MIN_LOCAL_CAPACITY);
    }

    #[test]
    fn shrunk_capacity_wraps_the_slot() {
        let part = Partition::with_local_capacity(1, 4);
        // With one rank, the home slot is the key itself, wrapped.
        assert_eq!(part.slot(0), 0);
        assert_eq!(part.slot(4), 0);
        assert_eq!(part.slot(8), 0);
        assert_eq!(part.slot(13), 1);
    }
}
