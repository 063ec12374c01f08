//! Fixed-width bucket records and their wire format.
//!
//! Every peer addresses every other peer's bucket array at byte granularity,
//! so the layout is pinned exactly, little-endian throughout:
//!
//! ```text
//! offset 0        : key            (4 bytes, i32)
//! offset 4        : concentrations (NUM_SPECIES x 8 bytes, f64)
//! offset 4 + 8S   : flux_in        (8 bytes, f64)
//! offset 12 + 8S  : flux_out       (8 bytes, f64)
//! offset 20 + 8S  : status         (4 bytes, i32)
//! offset 24 + 8S  : checksum       (4 bytes, u32)
//! ```
//!
//! The status word doubles as the per-bucket lock in the fine-grained
//! strategy; keeping it 4-byte aligned within the record (and the record
//! 4-byte aligned within the window) is what allows a remote CAS to target
//! it directly.

use crate::cell::{GridCell, NUM_SPECIES};

/// Bucket is free; key and payload bytes are meaningless.
pub const STATUS_EMPTY: i32 = 0;
/// Bucket holds a key/payload pair.
pub const STATUS_OCCUPIED: i32 = 1;
/// Transient: a fine-grained writer holds the bucket.
pub const STATUS_LOCKED: i32 = 2;

pub const KEY_OFFSET: usize = 0;
pub const CONCENTRATIONS_OFFSET: usize = 4;
pub const FLUX_IN_OFFSET: usize = CONCENTRATIONS_OFFSET + 8 * NUM_SPECIES;
pub const FLUX_OUT_OFFSET: usize = FLUX_IN_OFFSET + 8;
pub const STATUS_OFFSET: usize = FLUX_OUT_OFFSET + 8;
pub const CHECKSUM_OFFSET: usize = STATUS_OFFSET + 4;

/// Size of one encoded bucket in bytes; the unit of remote transfer.
pub const BUCKET_SIZE: usize = CHECKSUM_OFFSET + 4;

/// One entry of the hash table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bucket {
    pub key: i32,
    pub cell: GridCell,
    pub status: i32,
    pub checksum: u32,
}

impl Bucket {
    /// An occupied bucket carrying `cell` under `key`, with its checksum.
    pub fn occupied(key: i32, cell: GridCell) -> Self {
        Self {
            key,
            cell,
            status: STATUS_OCCUPIED,
            checksum: checksum(key, &cell),
        }
    }

    /// Encode into the wire layout.
    pub fn encode(&self, buf: &mut [u8; BUCKET_SIZE]) {
        buf[KEY_OFFSET..KEY_OFFSET + 4].copy_from_slice(&self.key.to_le_bytes());
        for (i, c) in self.cell.concentrations.iter().enumerate() {
            let off = CONCENTRATIONS_OFFSET + i * 8;
            buf[off..off + 8].copy_from_slice(&c.to_le_bytes());
        }
        buf[FLUX_IN_OFFSET..FLUX_IN_OFFSET + 8].copy_from_slice(&self.cell.flux_in.to_le_bytes());
        buf[FLUX_OUT_OFFSET..FLUX_OUT_OFFSET + 8]
            .copy_from_slice(&self.cell.flux_out.to_le_bytes());
        buf[STATUS_OFFSET..STATUS_OFFSET + 4].copy_from_slice(&self.status.to_le_bytes());
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&self.checksum.to_le_bytes());
    }

    /// Decode from the wire layout.
    pub fn decode(buf: &[u8; BUCKET_SIZE]) -> Self {
        let mut concentrations = [0.0; NUM_SPECIES];
        for (i, c) in concentrations.iter_mut().enumerate() {
            *c = read_f64(buf, CONCENTRATIONS_OFFSET + i * 8);
        }
        Self {
            key: read_i32(buf, KEY_OFFSET),
            cell: GridCell {
                concentrations,
                flux_in: read_f64(buf, FLUX_IN_OFFSET),
                flux_out: read_f64(buf, FLUX_OUT_OFFSET),
            },
            status: read_i32(buf, STATUS_OFFSET),
            checksum: read_u32(buf, CHECKSUM_OFFSET),
        }
    }
}

#[inline]
fn read_i32(buf: &[u8], off: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    i32::from_le_bytes(b)
}

#[inline]
fn read_u32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(b)
}

#[inline]
fn read_f64(buf: &[u8], off: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    f64::from_le_bytes(b)
}

/// Content hash over key and concentrations, hash-combine mixing.
///
/// Doubles hash as their IEEE-754 bit patterns (xor-folded to 32 bits), so
/// identical payload bits produce identical checksums on every peer. The
/// flux scalars are not covered; the lock-free read path validates
/// concentrations only, matching what the simulation consumes.
pub fn checksum(key: i32, cell: &GridCell) -> u32 {
    let mut h = key as u32;
    for c in &cell.concentrations {
        let bits = c.to_bits();
        let folded = (bits ^ (bits >> 32)) as u32;
        h ^= folded
            .wrapping_add(0x9e37_79b9)
            .wrapping_add(h << 6)
            .wrapping_add(h >> 2);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_offsets() {
        assert_eq!(KEY_OFFSET, 0);
        assert_eq!(CONCENTRATIONS_OFFSET, 4);
        assert_eq!(FLUX_IN_OFFSET, 4 + 8 * NUM_SPECIES);
        assert_eq!(STATUS_OFFSET, 20 + 8 * NUM_SPECIES);
        assert_eq!(CHECKSUM_OFFSET, 24 + 8 * NUM_SPECIES);
        assert_eq!(BUCKET_SIZE, 28 + 8 * NUM_SPECIES);
        // The fine-grained CAS targets the status word; it must stay 4-byte
        // aligned at any bucket-multiple displacement.
        assert_eq!(STATUS_OFFSET % 4, 0);
        assert_eq!(BUCKET_SIZE % 4, 0);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let cell = GridCell {
            concentrations: [1.5, -2.25, 0.0, f64::MIN_POSITIVE, 4e9],
            flux_in: 0.125,
            flux_out: -7.0,
        };
        let bucket = Bucket::occupied(42, cell);
        let mut buf = [0u8; BUCKET_SIZE];
        bucket.encode(&mut buf);
        assert_eq!(Bucket::decode(&buf), bucket);
    }

    #[test]
    fn zero_bytes_decode_to_empty() {
        let buf = [0u8; BUCKET_SIZE];
        let bucket = Bucket::decode(&buf);
        assert_eq!(bucket.status, STATUS_EMPTY);
        assert_eq!(bucket.cell, GridCell::default());
    }

    #[test]
    fn wire_format_is_little_endian() {
        let bucket = Bucket {
            key: 0x0102_0304,
            cell: GridCell::default(),
            status: STATUS_OCCUPIED,
            checksum: 0xdead_beef,
        };
        let mut buf = [0u8; BUCKET_SIZE];
        bucket.encode(&mut buf);
        assert_eq!(&buf[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(buf[STATUS_OFFSET], 1);
        assert_eq!(
            &buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4],
            &[0xef, 0xbe, 0xad, 0xde]
        );
    }

    #[test]
    fn checksum_is_deterministic_on_bit_patterns() {
        let cell = GridCell::with_concentrations([0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(checksum(7, &cell), checksum(7, &cell));

        // Any single-bit perturbation of a concentration must change the sum.
        let mut other = cell;
        other.concentrations[2] = f64::from_bits(other.concentrations[2].to_bits() ^ 1);
        assert_ne!(checksum(7, &cell), checksum(7, &other));

        // Key participates too.
        assert_ne!(checksum(7, &cell), checksum(8, &cell));
    }

    #[test]
    fn checksum_ignores_flux() {
        let cell = GridCell::with_concentrations([1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut with_flux = cell;
        with_flux.flux_in = 9.0;
        with_flux.flux_out = -9.0;
        assert_eq!(checksum(3, &cell), checksum(3, &with_flux));
    }
}
