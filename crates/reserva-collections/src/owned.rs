//! Growable vector that owns a private arena.

use std::fmt;
use std::ops::{Deref, DerefMut};

use reserva_core::{Arena, ArenaConfig};

use crate::error::Result;
use crate::raw::RawParts;
use crate::vec::ArenaVec;

/// An [`ArenaVec`] that created its backing [`Arena`] for itself and
/// releases it on drop.
///
/// The ownership split is encoded in the type: a borrowed arena can
/// outlive any number of [`ArenaVec`]s, while an `OwnedArenaVec` tears
/// its reservation down with the vector. Self-reference is sound because
/// the mapping address never moves, only the handle does.
///
/// [`ArenaVec`]: crate::vec::ArenaVec
pub struct OwnedArenaVec<T> {
    arena: Arena,
    raw: RawParts<T>,
}

impl<T> OwnedArenaVec<T> {
    /// Vector over a fresh default arena (256 MiB reservation).
    pub fn new() -> Result<Self> {
        Self::with_capacity(0)
    }

    /// See [`ArenaVec::with_capacity_in`].
    ///
    /// [`ArenaVec::with_capacity_in`]: crate::vec::ArenaVec::with_capacity_in
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_config(capacity, ArenaConfig::new())
    }

    /// Owned vector whose private arena uses `config`.
    pub fn with_capacity_and_config(capacity: usize, config: ArenaConfig) -> Result<Self> {
        let arena = Arena::with_config(config)?;
        let raw = RawParts::with_capacity(&arena, capacity)?;
        Ok(Self { arena, raw })
    }

    /// The private arena. Callers may bump-allocate from it too; those
    /// allocations live exactly as long as the vector.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn push(&mut self, value: T) -> Result<&mut T> {
        self.raw.push(&self.arena, value)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.raw.pop()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.raw.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.raw.get_mut(index)
    }

    /// # Safety
    ///
    /// `index` must be less than [`len`](OwnedArenaVec::len).
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        self.raw.get_unchecked(index)
    }

    /// # Safety
    ///
    /// `index` must be less than [`len`](OwnedArenaVec::len).
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        self.raw.get_unchecked_mut(index)
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.raw.set(index, value)
    }

    pub fn set_capacity(&mut self, new_cap: usize) -> Result<()> {
        self.raw.set_capacity(&self.arena, new_cap)
    }

    pub fn clear(&mut self) {
        self.raw.clear();
    }

    pub fn truncate(&mut self, new_len: usize) -> Result<()> {
        self.raw.truncate(new_len)
    }

    pub fn reset(&mut self, new_cap: usize) -> Result<()> {
        self.raw.set_capacity(&self.arena, new_cap)?;
        self.raw.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.raw.is_full()
    }

    pub fn available(&self) -> usize {
        self.raw.available()
    }

    pub fn growth_factor(&self) -> f64 {
        self.raw.growth_factor()
    }

    pub fn set_growth_factor(&mut self, factor: f64) -> Result<()> {
        self.raw.set_growth_factor(factor)
    }

    pub fn min_growth(&self) -> usize {
        self.raw.min_growth()
    }

    pub fn set_min_growth(&mut self, min_growth: usize) {
        self.raw.set_min_growth(min_growth)
    }

    pub fn as_slice(&self) -> &[T] {
        self.raw.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.raw.as_mut_slice()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// New vector on `target` keeping, in order, the elements `predicate`
    /// accepts. `self` is untouched. The result borrows `target`, not
    /// this vector's private arena, so it can outlive `self`.
    pub fn filter_into<'b>(
        &self,
        target: &'b Arena,
        mut predicate: impl FnMut(&T) -> bool,
    ) -> Result<ArenaVec<'b, T>>
    where
        T: Clone,
    {
        let mut out = ArenaVec::with_capacity_in(target, self.len())?;
        for item in self.iter() {
            if predicate(item) {
                out.push(item.clone())?;
            }
        }
        Ok(out)
    }

    /// New vector on `target` holding `transform` of every element, in
    /// order. `self` is untouched.
    pub fn map_into<'b, U>(
        &self,
        target: &'b Arena,
        mut transform: impl FnMut(&T) -> U,
    ) -> Result<ArenaVec<'b, U>> {
        let mut out = ArenaVec::with_capacity_in(target, self.len())?;
        for item in self.iter() {
            out.push(transform(item))?;
        }
        Ok(out)
    }
}

impl<T> Deref for OwnedArenaVec<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> DerefMut for OwnedArenaVec<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<'v, T> IntoIterator for &'v OwnedArenaVec<T> {
    type Item = &'v T;
    type IntoIter = std::slice::Iter<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'v, T> IntoIterator for &'v mut OwnedArenaVec<T> {
    type Item = &'v mut T;
    type IntoIter = std::slice::IterMut<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T: fmt::Debug> fmt::Debug for OwnedArenaVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Drop for OwnedArenaVec<T> {
    fn drop(&mut self) {
        // Elements first, then the arena releases its reservation.
        self.raw.drop_elements();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_vector_is_self_contained() {
        let mut v = OwnedArenaVec::with_capacity(3).unwrap();
        for i in 0..100u64 {
            v.push(i).unwrap();
        }
        assert_eq!(v.len(), 100);
        assert_eq!(v[99], 99);
        // The private arena carries the storage.
        assert!(v.arena().allocated() >= 100 * std::mem::size_of::<u64>());
    }

    #[test]
    fn moving_the_vector_keeps_contents_valid() {
        let mut v = OwnedArenaVec::with_capacity(8).unwrap();
        for i in 0..8u32 {
            v.push(i).unwrap();
        }
        let moved = v;
        assert_eq!(moved.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7]);
        let boxed = Box::new(moved);
        assert_eq!(boxed[7], 7);
    }

    #[test]
    fn drop_releases_private_arena() {
        use reserva_core::{MemoryCategory, MEMORY_TRACKER};

        let v = OwnedArenaVec::<u8>::with_capacity(16).unwrap();
        let reserved = v.arena().reserved() as u64;
        let during = MEMORY_TRACKER.category(MemoryCategory::ArenaReserve).live_bytes;
        assert!(during >= reserved);
        drop(v);
        // No assertion on the absolute value afterwards: the tracker is
        // process-global and other tests hold arenas of their own.
    }
}
