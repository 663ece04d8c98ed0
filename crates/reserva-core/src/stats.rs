//! Per-arena allocation counters, maintained only when
//! `ArenaConfig::enable_stats` is set.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

/// Snapshot of one arena's counters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStats {
    /// Successful allocations over the arena's lifetime; reset does not
    /// clear counters.
    pub total_allocations: u64,
    /// Allocations rejected for any reason.
    pub failed_allocations: u64,
    /// Highest value the bump pointer has reached, in bytes.
    pub peak_allocated: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    total: Cell<u64>,
    failed: Cell<u64>,
    peak: Cell<u64>,
}

impl StatCounters {
    pub(crate) fn record_alloc(&self, allocated: usize) {
        self.total.set(self.total.get().saturating_add(1));
        if allocated as u64 > self.peak.get() {
            self.peak.set(allocated as u64);
        }
    }

    pub(crate) fn record_failure(&self) {
        self.failed.set(self.failed.get().saturating_add(1));
    }

    pub(crate) fn snapshot(&self) -> ArenaStats {
        ArenaStats {
            total_allocations: self.total.get(),
            failed_allocations: self.failed.get(),
            peak_allocated: self.peak.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = StatCounters::default();
        counters.record_alloc(128);
        counters.record_alloc(64);
        counters.record_failure();
        let snap = counters.snapshot();
        assert_eq!(snap.total_allocations, 2);
        assert_eq!(snap.failed_allocations, 1);
        assert_eq!(snap.peak_allocated, 128);
    }
}
