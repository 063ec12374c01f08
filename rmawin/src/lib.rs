//! Passive-target one-sided memory windows for symmetric peer threads.
//!
//! A `Peer` is one rank of a fixed-size group of threads. Each rank can
//! expose a byte-addressable [`Window`] that every other rank accesses with
//! one-sided get/put/atomic operations, without the owner participating in
//! the exchange. Collective operations (barrier, all-gather, window
//! create/free) must be called by every rank of the group.

pub mod window;

pub use window::{Window, WINDOW_ALIGN};

use std::sync::atomic::{fence, Ordering};
use std::sync::{Arc, Barrier, Mutex, PoisonError};

use window::WindowSlab;

/// Shared state of a peer group.
pub(crate) struct GroupShared {
    size: usize,
    barrier: Barrier,
    /// Rendezvous board for collective window creation.
    pub(crate) window_board: Mutex<Vec<Option<Arc<WindowSlab>>>>,
    /// Rendezvous board for `all_gather_f64`.
    gather_board: Mutex<Vec<f64>>,
}

/// One rank's handle onto the peer group.
///
/// Handles are produced together by [`create_group`] and moved onto their
/// rank threads. All collective methods must be entered by every rank.
pub struct Peer {
    rank: usize,
    pub(crate) shared: Arc<GroupShared>,
}

// Cloning hands out another handle for the same rank; collective operations
// still admit exactly one participant per rank at a time.
impl Clone for Peer {
    fn clone(&self) -> Self {
        Peer {
            rank: self.rank,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Create a group of `size` peers, one handle per rank.
///
/// The returned handles are ordered by rank; `handles[r].rank() == r`.
pub fn create_group(size: usize) -> Vec<Peer> {
    assert!(size > 0, "group size must be positive");
    let shared = Arc::new(GroupShared {
        size,
        barrier: Barrier::new(size),
        window_board: Mutex::new(vec![None; size]),
        gather_board: Mutex::new(vec![0.0; size]),
    });
    (0..size)
        .map(|rank| Peer {
            rank,
            shared: Arc::clone(&shared),
        })
        .collect()
}

impl Peer {
    /// This peer's rank in `[0, size)`.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the group.
    #[inline]
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Collective barrier. Completes all outstanding one-sided operations
    /// issued by this rank before returning (barrier entry is a full fence).
    pub fn barrier(&self) {
        fence(Ordering::SeqCst);
        self.shared.barrier.wait();
    }

    /// Collective all-gather of one `f64` per rank.
    ///
    /// Returns the gathered values ordered by rank. Every rank receives the
    /// same vector.
    pub fn all_gather_f64(&self, value: f64) -> Vec<f64> {
        {
            let mut board = lock(&self.shared.gather_board);
            board[self.rank] = value;
        }
        self.shared.barrier.wait();
        let gathered = lock(&self.shared.gather_board).clone();
        // Second barrier: nobody may start the next gather until all ranks
        // have taken their snapshot.
        self.shared.barrier.wait();
        gathered
    }
}

/// Lock a mutex, ignoring poisoning: the boards hold plain values and stay
/// consistent even if another rank thread panicked mid-benchmark.
pub(crate) fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
