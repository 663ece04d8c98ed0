//! Virtual-memory bump arena.
//!
//! An [`Arena`] reserves one contiguous range of address space at
//! construction and never moves it. Allocation is a pointer bump; physical
//! pages are committed on demand in commit-granularity steps as the
//! high-water mark advances. Individual allocations are never freed:
//! memory comes back only through [`Arena::reset`] or drop.

use std::cell::Cell;
use std::mem;
use std::ptr::NonNull;
use std::slice;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::ArenaConfig;
use crate::debug::{MemoryCategory, MEMORY_TRACKER};
use crate::error::{ArenaError, Result};
use crate::stats::{ArenaStats, StatCounters};
use crate::vm::{NativeVm, VirtualMemory};

/// Every bump is padded to a multiple of this, so plain allocations are
/// always at least 8-byte aligned.
const ALIGN_FLOOR: usize = 8;

/// Byte written over fresh allocations in debug mode.
const POISON_BYTE: u8 = 0xA5;

/// Round `value` up to a multiple of power-of-two `align`; `None` when
/// the rounding would overflow.
#[inline]
pub(crate) fn checked_align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

/// Round `value` up to a multiple of `granularity` (any nonzero value).
#[inline]
pub(crate) fn round_up_multiple(value: usize, granularity: usize) -> usize {
    debug_assert!(granularity > 0);
    match value % granularity {
        0 => value,
        rem => value + (granularity - rem),
    }
}

/// Point-in-time view of an arena's accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaInfo {
    /// High-water mark of the bump pointer, in bytes.
    pub allocated: usize,
    /// Bytes backed by committed pages.
    pub committed: usize,
    /// Bytes of reserved address space.
    pub reserved: usize,
    /// Commit page size the arena was configured with.
    pub page_size: usize,
    /// Allocations always come from one contiguous range.
    pub contiguous: bool,
}

/// What this arena can do, plus the largest single allocation that could
/// currently succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaCapabilities {
    pub contiguous_memory: bool,
    pub zero_copy_growth: bool,
    pub reset: bool,
    pub reserve: bool,
    /// Largest alignment honored without padding overhead considerations.
    pub alignment: usize,
    pub max_allocation_size: usize,
}

/// A bump allocator over a fixed virtual-memory reservation.
///
/// The handle is move-only and opaque; the mapping address is stable for
/// the arena's whole lifetime, so pointers into it survive moves of the
/// handle itself. Allocation takes `&self` (interior mutability), which
/// lets any number of data structures borrow one arena; the `Cell` fields
/// keep the type `!Sync`, so cross-thread sharing is rejected at compile
/// time.
pub struct Arena {
    base: NonNull<u8>,
    reserved: usize,
    committed: Cell<usize>,
    allocated: Cell<usize>,
    commit_granularity: usize,
    page_size: usize,
    debug_mode: bool,
    stats: Option<StatCounters>,
}

// SAFETY: the arena exclusively owns its mapping; moving the handle to
// another thread moves that ownership with it. `!Sync` still holds via the
// Cell fields.
unsafe impl Send for Arena {}

impl Arena {
    /// Arena with the default 256 MiB reservation.
    pub fn new() -> Result<Self> {
        Self::with_config(ArenaConfig::new())
    }

    /// Arena with the 256 GiB session-scale reservation.
    pub fn session() -> Result<Self> {
        Self::with_config(ArenaConfig::session())
    }

    /// Arena with the 4 TiB global-scale reservation.
    pub fn global() -> Result<Self> {
        Self::with_config(ArenaConfig::global())
    }

    /// Construct from an explicit configuration.
    ///
    /// Validates the configuration, reserves `max_reserve` rounded up to
    /// the OS allocation granularity, and commits the initial pages. If
    /// any step after the reservation fails, the reservation is released
    /// before the error is returned; a failed construction holds no OS
    /// resources.
    pub fn with_config(config: ArenaConfig) -> Result<Self> {
        if let Err(err) = config.validate() {
            let line = format!("reserva: rejected arena config: {err}");
            match &config.on_diagnostic {
                Some(hook) => hook(&line),
                None => eprintln!("{line}"),
            }
            return Err(err);
        }

        let page_size = config.resolved_page_size();
        let commit_granularity = config.resolved_commit_granularity();
        let reserved = round_up_multiple(
            config.resolved_reserve(),
            NativeVm::allocation_granularity(),
        );
        let initial_commit = config.initial_commit();

        let base = NativeVm::reserve(reserved).map_err(|err| {
            warn!(reserved, error = %err, "reservation failed");
            ArenaError::Platform(err)
        })?;

        // SAFETY: [base, base + initial_commit) lies inside the fresh
        // reservation; validate() checked initial_commit <= max_reserve.
        if let Err(err) = unsafe { NativeVm::commit(base, initial_commit) } {
            warn!(initial_commit, error = %err, "initial commit failed");
            // SAFETY: releasing the reservation we just made.
            unsafe {
                let _ = NativeVm::release(base, reserved);
            }
            return Err(ArenaError::Platform(err));
        }

        MEMORY_TRACKER.record_acquire(MemoryCategory::ArenaReserve, reserved);
        MEMORY_TRACKER.record_acquire(MemoryCategory::ArenaCommit, initial_commit);
        debug!(reserved, committed = initial_commit, page_size, "arena constructed");

        Ok(Self {
            base,
            reserved,
            committed: Cell::new(initial_commit),
            allocated: Cell::new(0),
            commit_granularity,
            page_size,
            debug_mode: config.enable_debug,
            stats: config.enable_stats.then(StatCounters::default),
        })
    }

    /// Bump-allocate `size` bytes of uninitialized, writable memory.
    ///
    /// The returned pointer is at least 8-byte aligned and stays valid
    /// until [`reset`] or drop. Fails with [`ArenaError::InvalidSize`] for
    /// a zero size and [`ArenaError::OutOfMemory`] when the padded request
    /// does not fit in the reservation or the OS refuses to commit backing
    /// pages; failure never changes arena state.
    ///
    /// [`reset`]: Arena::reset
    pub fn alloc_raw(&self, size: usize) -> Result<NonNull<u8>> {
        self.bump(size, ALIGN_FLOOR)
    }

    /// [`alloc_raw`] followed by zeroing the returned range.
    ///
    /// [`alloc_raw`]: Arena::alloc_raw
    pub fn alloc_raw_zeroed(&self, size: usize) -> Result<NonNull<u8>> {
        let ptr = self.bump(size, ALIGN_FLOOR)?;
        // SAFETY: bump() just made [ptr, ptr + size) valid for writes.
        unsafe {
            ptr.as_ptr().write_bytes(0, size);
        }
        Ok(ptr)
    }

    /// Bump-allocate `size` bytes whose address is a multiple of `align`.
    ///
    /// `align` must be a nonzero power of two; the padding needed to reach
    /// it is consumed from the arena in the same bump.
    pub fn alloc_raw_aligned(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        if align == 0 || !align.is_power_of_two() {
            self.note_failure();
            return Err(ArenaError::InvalidAlignment(align));
        }
        self.bump(size, align.max(ALIGN_FLOOR))
    }

    /// Move `value` into the arena and return a reference to it.
    ///
    /// The arena never runs destructors; a `T` with a meaningful `Drop`
    /// will leak its resources unless dropped in place by the caller.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc<T>(&self, value: T) -> Result<&mut T> {
        let ptr = self
            .alloc_raw_aligned(mem::size_of::<T>(), mem::align_of::<T>())?
            .cast::<T>();
        // SAFETY: freshly allocated, aligned, exclusive region.
        unsafe {
            ptr.as_ptr().write(value);
            Ok(&mut *ptr.as_ptr())
        }
    }

    /// Allocate a zeroed byte slice.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_zeroed(&self, len: usize) -> Result<&mut [u8]> {
        let ptr = self.alloc_raw_zeroed(len)?;
        // SAFETY: [ptr, ptr + len) is valid, zeroed, and handed out only
        // once; distinct calls return disjoint regions.
        Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), len) })
    }

    fn bump(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        if size == 0 {
            self.note_failure();
            return Err(ArenaError::InvalidSize);
        }

        let allocated = self.allocated.get();
        let base_addr = self.base.as_ptr() as usize;

        // Align on the absolute address so guarantees hold even past the
        // mapping's own alignment; checked arithmetic turns pathological
        // sizes and alignments into a clean failure.
        let request = checked_align_up(base_addr + allocated, align)
            .map(|addr| addr - base_addr)
            .zip(checked_align_up(size, ALIGN_FLOOR))
            .and_then(|(offset, padded)| offset.checked_add(padded).map(|end| (offset, end)));

        let (aligned_offset, new_allocated) = match request {
            Some((offset, end)) if end <= self.reserved => (offset, end),
            _ => {
                self.note_failure();
                warn!(
                    requested = size,
                    allocated,
                    reserved = self.reserved,
                    "allocation exceeds reservation"
                );
                return Err(ArenaError::OutOfMemory {
                    requested: size,
                    available: self.reserved - allocated,
                });
            }
        };

        if new_allocated > self.committed.get() {
            self.commit_to(new_allocated).map_err(|err| {
                self.note_failure();
                err
            })?;
        }

        self.allocated.set(new_allocated);
        if let Some(stats) = &self.stats {
            stats.record_alloc(new_allocated);
        }

        // SAFETY: aligned_offset < reserved, inside the mapping.
        let ptr = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(aligned_offset)) };

        if self.debug_mode {
            // SAFETY: the committed check above covers [ptr, ptr + size).
            unsafe {
                ptr.as_ptr().write_bytes(POISON_BYTE, size);
            }
            trace!(offset = aligned_offset, size, align, "debug allocation");
        }

        Ok(ptr)
    }

    /// Extend the committed range to cover at least `target` bytes,
    /// rounded up to the commit granularity and clamped to the
    /// reservation. Does not touch the bump pointer.
    fn commit_to(&self, target: usize) -> Result<()> {
        let committed = self.committed.get();
        debug_assert!(target > committed && target <= self.reserved);

        let shortfall = target - committed;
        let grow = round_up_multiple(shortfall, self.commit_granularity);
        let new_committed = committed.saturating_add(grow).min(self.reserved);

        // SAFETY: [base + committed, base + new_committed) is reserved but
        // not yet committed; bounds were clamped to the reservation.
        let result = unsafe {
            NativeVm::commit(
                NonNull::new_unchecked(self.base.as_ptr().add(committed)),
                new_committed - committed,
            )
        };
        if let Err(err) = result {
            warn!(
                committed,
                target = new_committed,
                error = %err,
                "commit extension failed"
            );
            return Err(ArenaError::OutOfMemory {
                requested: target - committed,
                available: self.reserved - committed,
            });
        }

        MEMORY_TRACKER.record_acquire(MemoryCategory::ArenaCommit, new_committed - committed);
        debug!(from = committed, to = new_committed, "committed range grew");
        self.committed.set(new_committed);
        Ok(())
    }

    fn note_failure(&self) {
        if let Some(stats) = &self.stats {
            stats.record_failure();
        }
    }

    /// Ensure at least `min_bytes` of the reservation are committed,
    /// without advancing the bump pointer. No-op when already satisfied.
    pub fn reserve(&self, min_bytes: usize) -> Result<()> {
        if min_bytes > self.reserved {
            return Err(ArenaError::OutOfMemory {
                requested: min_bytes,
                available: self.reserved,
            });
        }
        if min_bytes <= self.committed.get() {
            return Ok(());
        }
        self.commit_to(min_bytes)
    }

    /// Growth-minded commit hint: commits `max(2 * immediate,
    /// expected_total / 4)`, clamped to the reservation. `immediate`
    /// itself must fit.
    pub fn reserve_with_growth(&self, immediate: usize, expected_total: usize) -> Result<()> {
        if immediate > self.reserved {
            return Err(ArenaError::OutOfMemory {
                requested: immediate,
                available: self.reserved,
            });
        }
        let hint = immediate
            .saturating_mul(2)
            .max(expected_total / 4)
            .min(self.reserved);
        self.reserve(hint)
    }

    /// Return the bump pointer to zero and hint the OS to drop the
    /// physical backing of the committed range.
    ///
    /// The committed range stays mapped read/write, so the next
    /// allocation reuses the same addresses without a fresh commit. On
    /// Linux the discarded range reads back as zeros; on Darwin and
    /// Windows the contents are unspecified until rewritten.
    ///
    /// The `&mut` receiver guarantees no allocation handed out earlier is
    /// still borrowed.
    pub fn reset(&mut self) -> Result<()> {
        let committed = self.committed.get();
        if committed > 0 {
            // SAFETY: exclusive access; the committed range belongs to
            // this arena and has no live borrows.
            unsafe {
                NativeVm::discard(self.base, committed)?;
            }
        }
        debug!(discarded = committed, "arena reset");
        self.allocated.set(0);
        Ok(())
    }

    /// High-water mark of the bump pointer, in bytes.
    #[inline]
    pub fn allocated(&self) -> usize {
        self.allocated.get()
    }

    /// Bytes currently backed by committed pages.
    #[inline]
    pub fn committed(&self) -> usize {
        self.committed.get()
    }

    /// Bytes of reserved address space.
    #[inline]
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    pub fn info(&self) -> ArenaInfo {
        ArenaInfo {
            allocated: self.allocated.get(),
            committed: self.committed.get(),
            reserved: self.reserved,
            page_size: self.page_size,
            contiguous: true,
        }
    }

    pub fn capabilities(&self) -> ArenaCapabilities {
        ArenaCapabilities {
            contiguous_memory: true,
            zero_copy_growth: true,
            reset: true,
            reserve: true,
            alignment: 16,
            max_allocation_size: self.reserved - self.allocated.get(),
        }
    }

    /// Counter snapshot, or `None` when stats were not enabled.
    pub fn stats(&self) -> Option<ArenaStats> {
        self.stats.as_ref().map(StatCounters::snapshot)
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("allocated", &self.allocated.get())
            .field("committed", &self.committed.get())
            .field("reserved", &self.reserved)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        MEMORY_TRACKER.record_release(MemoryCategory::ArenaReserve, self.reserved);
        MEMORY_TRACKER.record_release(MemoryCategory::ArenaCommit, self.committed.get());
        // SAFETY: exclusive ownership of the full reservation.
        let result = unsafe { NativeVm::release(self.base, self.reserved) };
        if let Err(err) = result {
            warn!(reserved = self.reserved, error = %err, "release failed");
        }
    }
}
