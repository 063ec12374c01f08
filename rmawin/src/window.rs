//! The one-sided memory window: a zeroed, 64-byte-aligned slab per rank,
//! remotely addressable at byte granularity.
//!
//! Key design:
//! - Displacements are bytes, never records. Callers that store fixed-size
//!   records multiply the slot index by the record size themselves, which is
//!   what lets them target a single 4-byte field inside a record.
//! - `get`/`put` are volatile word-wise copies. Racing accesses observe some
//!   byte-level interleaving of old and new data, never anything else.
//! - `compare_and_swap`/`atomic_replace` operate on an `AtomicI32` view of
//!   the target bytes and require 4-byte-aligned offsets.
//! - A `flush` is a sequentially consistent fence; issued operations complete
//!   synchronously, so the fence is what pins cross-rank ordering.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicI32, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{lock, GroupShared, Peer};

/// Alignment of every window slab. Generous enough for any atomic access and
/// keeps record starts away from stray cache-line sharing with the allocator.
pub const WINDOW_ALIGN: usize = 64;

/// One rank's backing memory, shared with every peer through `Arc`.
pub(crate) struct WindowSlab {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
    /// Whole-window lock for the coarse-grained access discipline. Guards
    /// nothing by itself; participants that opt into window locking agree to
    /// take it around their accesses.
    window_lock: RwLock<()>,
}

// Safety: the slab is raw bytes accessed only through volatile and atomic
// operations; the Arc keeps it alive for as long as any peer can reach it.
unsafe impl Send for WindowSlab {}
unsafe impl Sync for WindowSlab {}

impl WindowSlab {
    fn allocate(len: usize) -> Arc<Self> {
        assert!(len > 0, "window length must be positive");
        let layout = Layout::from_size_align(len, WINDOW_ALIGN).expect("window layout");
        // Zeroed allocation: a fresh window must read back all-EMPTY records.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
        Arc::new(Self {
            ptr,
            len,
            layout,
            window_lock: RwLock::new(()),
        })
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for WindowSlab {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Shared (reader) hold of a target's whole-window lock.
pub struct SharedWindowLock<'a> {
    _guard: RwLockReadGuard<'a, ()>,
}

/// Exclusive (writer) hold of a target's whole-window lock.
pub struct ExclusiveWindowLock<'a> {
    _guard: RwLockWriteGuard<'a, ()>,
}

/// One rank's handle onto the group's windows.
///
/// Created collectively by [`Window::create`]; affords one-sided access to
/// every rank's slab. The handle is single-threaded (it lives on its rank's
/// thread) but the memory it addresses is shared by the whole group.
pub struct Window {
    rank: usize,
    len: usize,
    regions: Vec<Arc<WindowSlab>>,
    group: Arc<GroupShared>,
    epoch_open: Cell<bool>,
}

impl Window {
    /// Collectively create a window of `len` bytes per rank.
    ///
    /// Every rank of the group must call this with the same `len`. Each rank
    /// allocates and zeroes its own slab; the group then exchanges slab
    /// handles so that any rank can address any other rank's bytes.
    pub fn create(peer: &Peer, len: usize) -> Window {
        let shared = Arc::clone(&peer.shared);
        let slab = WindowSlab::allocate(len);

        {
            let mut board = lock(&shared.window_board);
            debug_assert!(board[peer.rank()].is_none(), "window exchange slot in use");
            board[peer.rank()] = Some(Arc::clone(&slab));
        }
        peer.barrier();

        let regions: Vec<Arc<WindowSlab>> = {
            let board = lock(&shared.window_board);
            board
                .iter()
                .map(|s| Arc::clone(s.as_ref().expect("rank missing from window exchange")))
                .collect()
        };
        debug_assert!(regions.iter().all(|r| r.len == len));
        peer.barrier();

        // Clear own slot, then rendezvous once more so a subsequent create
        // never observes stale handles on the board.
        {
            let mut board = lock(&shared.window_board);
            board[peer.rank()] = None;
        }
        peer.barrier();

        Window {
            rank: peer.rank(),
            len,
            regions,
            group: shared,
            epoch_open: Cell::new(false),
        }
    }

    /// Bytes per rank.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// This rank.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks.
    #[inline]
    pub fn size(&self) -> usize {
        self.regions.len()
    }

    #[inline]
    fn target_ptr(&self, target: usize, offset: usize, len: usize) -> *mut u8 {
        let slab = &self.regions[target];
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= slab.len),
            "window access out of bounds: offset {} len {} window {}",
            offset,
            len,
            slab.len,
        );
        unsafe { slab.base().add(offset) }
    }

    /// One-sided read of `dst.len()` bytes from `target` at byte `offset`.
    pub fn get(&self, target: usize, offset: usize, dst: &mut [u8]) {
        let src = self.target_ptr(target, offset, dst.len());
        fence(Ordering::Acquire);
        unsafe { copy_from_window(src, dst.as_mut_ptr(), dst.len()) };
    }

    /// One-sided write of `src.len()` bytes to `target` at byte `offset`.
    pub fn put(&self, target: usize, offset: usize, src: &[u8]) {
        let dst = self.target_ptr(target, offset, src.len());
        unsafe { copy_to_window(dst, src.as_ptr(), src.len()) };
        fence(Ordering::Release);
    }

    /// Atomic compare-and-swap on the 4-byte word at `offset` in `target`.
    ///
    /// Stores `desired` if the current value equals `expected`. Returns the
    /// observed value either way; the swap happened iff it equals `expected`.
    /// `offset` must be 4-byte aligned.
    pub fn compare_and_swap(&self, target: usize, offset: usize, expected: i32, desired: i32) -> i32 {
        let word = self.atomic_word(target, offset);
        match word.compare_exchange(expected, desired, Ordering::AcqRel, Ordering::Acquire) {
            Ok(observed) | Err(observed) => observed,
        }
    }

    /// Atomic replace of the 4-byte word at `offset` in `target`, returning
    /// the previous value. Ordered with respect to other atomics on the same
    /// word. `offset` must be 4-byte aligned.
    pub fn atomic_replace(&self, target: usize, offset: usize, value: i32) -> i32 {
        self.atomic_word(target, offset).swap(value, Ordering::AcqRel)
    }

    #[inline]
    fn atomic_word(&self, target: usize, offset: usize) -> &AtomicI32 {
        assert!(offset % 4 == 0, "atomic offset {} not 4-byte aligned", offset);
        let ptr = self.target_ptr(target, offset, 4);
        // Safety: in-bounds, 4-byte aligned (slab base is WINDOW_ALIGN), and
        // the slab outlives `&self`.
        unsafe { AtomicI32::from_ptr(ptr as *mut i32) }
    }

    /// Complete all outstanding operations issued by this rank against
    /// `target`, locally and remotely.
    #[inline]
    pub fn flush(&self, _target: usize) {
        fence(Ordering::SeqCst);
    }

    /// Complete all outstanding operations issued by this rank against every
    /// target.
    #[inline]
    pub fn flush_all(&self) {
        fence(Ordering::SeqCst);
    }

    /// Take `target`'s whole-window lock shared. Concurrent shared holders
    /// are admitted; an exclusive holder excludes everyone.
    pub fn lock_shared(&self, target: usize) -> SharedWindowLock<'_> {
        let guard = self.regions[target]
            .window_lock
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        fence(Ordering::SeqCst);
        SharedWindowLock { _guard: guard }
    }

    /// Take `target`'s whole-window lock exclusive.
    pub fn lock_exclusive(&self, target: usize) -> ExclusiveWindowLock<'_> {
        let guard = self.regions[target]
            .window_lock
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        fence(Ordering::SeqCst);
        ExclusiveWindowLock { _guard: guard }
    }

    /// Open a persistent passive epoch on every target. Atomic operations may
    /// then be issued without per-operation lock traffic.
    pub fn lock_all(&self) {
        debug_assert!(!self.epoch_open.get(), "epoch already open");
        fence(Ordering::SeqCst);
        self.epoch_open.set(true);
    }

    /// Close the passive epoch, completing everything outstanding first.
    pub fn unlock_all(&self) {
        debug_assert!(self.epoch_open.get(), "epoch not open");
        self.flush_all();
        self.epoch_open.set(false);
    }

    /// Collectively release the window. Every rank must call this; the
    /// barrier guarantees no peer still issues operations against freed
    /// memory. Dropping a `Window` without `free` is safe (the slabs are
    /// reference-counted) but skips the rendezvous.
    pub fn free(self) {
        fence(Ordering::SeqCst);
        self.group.barrier.wait();
    }
}

/// Volatile copy out of a window slab into a local buffer.
///
/// # Safety
/// `src` must be valid for `len` bytes; `dst` must be valid for writing `len`
/// bytes and not overlap `src`.
#[inline]
unsafe fn copy_from_window(src: *const u8, dst: *mut u8, len: usize) {
    if src as usize % 4 == 0 && len % 4 == 0 {
        let words = len / 4;
        let src = src as *const u32;
        let dst = dst as *mut u32;
        for i in 0..words {
            let w = std::ptr::read_volatile(src.add(i));
            std::ptr::write_unaligned(dst.add(i), w);
        }
    } else {
        for i in 0..len {
            *dst.add(i) = std::ptr::read_volatile(src.add(i));
        }
    }
}

/// Volatile copy from a local buffer into a window slab.
///
/// # Safety
/// `dst` must be valid for writing `len` bytes; `src` must be valid for `len`
/// bytes and not overlap `dst`.
#[inline]
unsafe fn copy_to_window(dst: *mut u8, src: *const u8, len: usize) {
    if dst as usize % 4 == 0 && len % 4 == 0 {
        let words = len / 4;
        let src = src as *const u32;
        let dst = dst as *mut u32;
        for i in 0..words {
            let w = std::ptr::read_unaligned(src.add(i));
            std::ptr::write_volatile(dst.add(i), w);
        }
    } else {
        for i in 0..len {
            std::ptr::write_volatile(dst.add(i), *src.add(i));
        }
    }
}
