//! Process-wide accounting of arena memory by lifecycle stage.
//!
//! Arenas report address-space reservations and commit growth here, and
//! the collections crate reports vector storage. Unlike the per-arena
//! counters in [`stats`], this tracker survives individual arenas: it
//! answers "how much is live right now" and "how high did it get" per
//! category across the whole process. It is advisory only, for
//! diagnostics and tests, never for correctness.
//!
//! [`stats`]: crate::stats

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Lifecycle stage a tracked byte belongs to.
///
/// `ArenaReserve` counts address space held from the OS; `ArenaCommit`
/// the subset backed by committed pages; `VectorStorage` the bump
/// allocations vectors carve out of arenas. The three overlap by design:
/// committed bytes are also reserved, vector storage is also committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryCategory {
    ArenaReserve,
    ArenaCommit,
    VectorStorage,
    Other,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 4] = [
        MemoryCategory::ArenaReserve,
        MemoryCategory::ArenaCommit,
        MemoryCategory::VectorStorage,
        MemoryCategory::Other,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Accounting for one category.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Bytes acquired and not yet released.
    pub live_bytes: u64,
    /// High-water mark of `live_bytes`.
    pub peak_bytes: u64,
    /// Acquire events (reservations, commit extensions, storage grabs).
    pub acquisitions: u64,
    /// Release events. Commits are released only when their arena goes
    /// away, so this stays behind `acquisitions` while arenas are live.
    pub releases: u64,
}

#[derive(Debug, Default)]
pub struct MemoryTracker {
    categories: Mutex<[CategoryStats; MemoryCategory::ALL.len()]>,
}

impl MemoryTracker {
    /// Record `bytes` entering the category and roll the peak forward.
    pub fn record_acquire(&self, category: MemoryCategory, bytes: usize) {
        let mut table = self.categories.lock();
        let entry = &mut table[category.index()];
        entry.acquisitions = entry.acquisitions.saturating_add(1);
        entry.live_bytes = entry.live_bytes.saturating_add(bytes as u64);
        if entry.live_bytes > entry.peak_bytes {
            entry.peak_bytes = entry.live_bytes;
        }
    }

    /// Record `bytes` leaving the category. The peak is untouched; a
    /// release can never lower it.
    pub fn record_release(&self, category: MemoryCategory, bytes: usize) {
        let mut table = self.categories.lock();
        let entry = &mut table[category.index()];
        entry.releases = entry.releases.saturating_add(1);
        entry.live_bytes = entry.live_bytes.saturating_sub(bytes as u64);
    }

    /// Current accounting for one category.
    pub fn category(&self, category: MemoryCategory) -> CategoryStats {
        self.categories.lock()[category.index()].clone()
    }

    /// All categories at once, in [`MemoryCategory::ALL`] order.
    pub fn snapshot(&self) -> [(MemoryCategory, CategoryStats); MemoryCategory::ALL.len()] {
        let table = self.categories.lock();
        MemoryCategory::ALL.map(|category| (category, table[category.index()].clone()))
    }
}

pub static MEMORY_TRACKER: Lazy<MemoryTracker> = Lazy::new(MemoryTracker::default);
