//! Untyped core shared by the borrowed and owning vector types.
//!
//! `RawParts` carries the data pointer, length, capacity and growth policy
//! but no arena; every operation that may allocate takes the backing arena
//! as an argument. The wrappers in `vec` and `owned` pair it with a
//! borrowed or owned [`Arena`] and are responsible for calling
//! [`RawParts::drop_elements`] before the storage goes away.
//!
//! [`Arena`]: reserva_core::Arena

use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;

use tracing::debug;

use reserva_core::{Arena, ArenaError, MemoryCategory, MEMORY_TRACKER};

use crate::error::{Result, VecError};

/// Growth factor applied when a push finds the vector full.
pub(crate) const DEFAULT_GROWTH_FACTOR: f64 = 1.5;

/// Minimum number of element slots added per growth step.
pub(crate) const DEFAULT_MIN_GROWTH: usize = 8;

pub(crate) struct RawParts<T> {
    data: NonNull<T>,
    len: usize,
    cap: usize,
    growth_factor: f64,
    min_growth: usize,
    _marker: PhantomData<T>,
}

impl<T> RawParts<T> {
    /// Allocate storage for `requested.max(1)` elements from `arena`.
    /// Zero-sized element types are rejected with the arena's
    /// invalid-size error: element sizes must be positive, and the bump
    /// arithmetic would degenerate otherwise.
    pub(crate) fn with_capacity(arena: &Arena, requested: usize) -> Result<Self> {
        if mem::size_of::<T>() == 0 {
            return Err(VecError::Arena(ArenaError::InvalidSize));
        }
        let cap = requested.max(1);
        let data = Self::allocate(arena, cap)?;
        Ok(Self {
            data,
            len: 0,
            cap,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            min_growth: DEFAULT_MIN_GROWTH,
            _marker: PhantomData,
        })
    }

    /// Fresh zeroed storage for `cap` elements.
    fn allocate(arena: &Arena, cap: usize) -> Result<NonNull<T>> {
        let bytes = cap
            .checked_mul(mem::size_of::<T>())
            .ok_or(VecError::InvalidParameter("capacity overflows usize"))?;
        let ptr = arena.alloc_raw_aligned(bytes, mem::align_of::<T>())?;
        // SAFETY: freshly allocated range of exactly `bytes` bytes.
        unsafe {
            ptr.as_ptr().write_bytes(0, bytes);
        }
        MEMORY_TRACKER.record_acquire(MemoryCategory::VectorStorage, bytes);
        Ok(ptr.cast::<T>())
    }

    /// Capacity after one growth step, per the growth policy: scale by
    /// `growth_factor`, step at least `min_growth`, and always gain at
    /// least one slot.
    fn next_capacity(&self) -> usize {
        if self.cap == 0 {
            return self.min_growth.max(1);
        }
        let scaled = (self.cap as f64 * self.growth_factor).ceil() as usize;
        let target = if scaled.saturating_sub(self.cap) < self.min_growth {
            self.cap.saturating_add(self.min_growth)
        } else {
            scaled
        };
        target.max(self.cap + 1)
    }

    /// Move the contents into a larger region. The old region stays
    /// allocated in the arena; bump allocators do not free, and heavy
    /// regrowth therefore accumulates dead space in the arena.
    fn reallocate(&mut self, arena: &Arena, new_cap: usize) -> Result<()> {
        debug_assert!(new_cap > self.cap);
        let new_data = Self::allocate(arena, new_cap)?;
        if self.len > 0 {
            // SAFETY: both regions are valid for `len` elements and come
            // from distinct bump allocations, so they cannot overlap.
            unsafe {
                ptr::copy_nonoverlapping(self.data.as_ptr(), new_data.as_ptr(), self.len);
            }
        }
        debug!(
            old_cap = self.cap,
            new_cap,
            len = self.len,
            "vector storage grew"
        );
        self.data = new_data;
        self.cap = new_cap;
        Ok(())
    }

    pub(crate) fn push<'s>(&'s mut self, arena: &Arena, value: T) -> Result<&'s mut T> {
        if self.len == self.cap {
            let target = self.next_capacity();
            self.reallocate(arena, target)?;
        }
        // SAFETY: len < cap after the growth check; the slot is inside the
        // allocation and unoccupied.
        unsafe {
            let slot = self.data.as_ptr().add(self.len);
            slot.write(value);
            self.len += 1;
            Ok(&mut *slot)
        }
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the slot at the old last index holds an initialized
        // element that is no longer reachable through `len`.
        Some(unsafe { ptr::read(self.data.as_ptr().add(self.len)) })
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if index < self.len {
            // SAFETY: bounds-checked above.
            Some(unsafe { &*self.data.as_ptr().add(index) })
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len {
            // SAFETY: bounds-checked above.
            Some(unsafe { &mut *self.data.as_ptr().add(index) })
        } else {
            None
        }
    }

    /// # Safety
    ///
    /// `index` must be less than the current length.
    pub(crate) unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(index < self.len);
        &*self.data.as_ptr().add(index)
    }

    /// # Safety
    ///
    /// `index` must be less than the current length.
    pub(crate) unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.len);
        &mut *self.data.as_ptr().add(index)
    }

    pub(crate) fn set(&mut self, index: usize, value: T) -> Result<()> {
        if index >= self.len {
            return Err(VecError::OutOfBounds {
                index,
                len: self.len,
            });
        }
        // SAFETY: bounds-checked; assignment drops the old element.
        unsafe {
            *self.data.as_ptr().add(index) = value;
        }
        Ok(())
    }

    /// Adjust capacity. Growing copies into fresh storage. A `new_cap`
    /// below the current length truncates but keeps the capacity, since a
    /// bump arena cannot return the tail; zero detaches the storage
    /// entirely.
    pub(crate) fn set_capacity(&mut self, arena: &Arena, new_cap: usize) -> Result<()> {
        if new_cap == self.cap {
            return Ok(());
        }
        if new_cap == 0 {
            self.drop_elements();
            self.data = NonNull::dangling();
            self.cap = 0;
            return Ok(());
        }
        if new_cap > self.cap {
            return self.reallocate(arena, new_cap);
        }
        if new_cap < self.len {
            self.drop_tail(new_cap);
        }
        Ok(())
    }

    pub(crate) fn truncate(&mut self, new_len: usize) -> Result<()> {
        if new_len > self.len {
            return Err(VecError::OutOfBounds {
                index: new_len,
                len: self.len,
            });
        }
        self.drop_tail(new_len);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.drop_tail(0);
    }

    /// Drop every element; storage and capacity are untouched. Used by
    /// the wrappers' `Drop` impls.
    pub(crate) fn drop_elements(&mut self) {
        self.drop_tail(0);
    }

    fn drop_tail(&mut self, new_len: usize) {
        debug_assert!(new_len <= self.len);
        let tail_len = self.len - new_len;
        // Shrink first so a panicking destructor cannot leave dropped
        // elements reachable.
        self.len = new_len;
        if tail_len > 0 && mem::needs_drop::<T>() {
            // SAFETY: the tail held initialized elements that are now
            // unreachable through `len`.
            unsafe {
                let tail = ptr::slice_from_raw_parts_mut(
                    self.data.as_ptr().add(new_len),
                    tail_len,
                );
                ptr::drop_in_place(tail);
            }
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.cap
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len == self.cap
    }

    pub(crate) fn available(&self) -> usize {
        self.cap - self.len
    }

    pub(crate) fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    pub(crate) fn set_growth_factor(&mut self, factor: f64) -> Result<()> {
        if !factor.is_finite() || factor <= 1.0 {
            return Err(VecError::InvalidParameter(
                "growth factor must be finite and greater than 1",
            ));
        }
        self.growth_factor = factor;
        Ok(())
    }

    pub(crate) fn min_growth(&self) -> usize {
        self.min_growth
    }

    pub(crate) fn set_min_growth(&mut self, min_growth: usize) {
        self.min_growth = min_growth;
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        // SAFETY: [data, data + len) holds initialized elements; a
        // dangling pointer is fine for len == 0.
        unsafe { slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as for `as_slice`, with exclusive access.
        unsafe { slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }
}
