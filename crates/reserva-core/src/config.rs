//! Arena construction knobs and presets.

use std::fmt;
use std::sync::Arc;

use crate::error::{ArenaError, Result};

/// Callback invoked with single-line diagnostic messages. Installed via
/// [`ArenaConfig::with_diagnostic_hook`]; when absent, the only fallback
/// output is one line on stderr for a configuration error at construction.
pub type DiagnosticHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Default commit page size when the config leaves `page_size` at 0.
pub const DEFAULT_PAGE_SIZE: usize = 64 * 1024;

/// Smallest accepted override for `page_size`.
pub const MIN_PAGE_SIZE: usize = 4096;

/// Reservation used by [`ArenaConfig::default`]: 256 MiB.
pub const DEFAULT_RESERVE: usize = 256 * 1024 * 1024;

/// Reservation used by the session preset: 256 GiB.
pub const SESSION_RESERVE: usize = 256 * 1024 * 1024 * 1024;

/// Reservation used by the global preset: 4 TiB.
pub const GLOBAL_RESERVE: usize = 4 * 1024 * 1024 * 1024 * 1024;

/// Configuration for [`Arena`] construction.
///
/// A zero in `page_size`, `max_reserve` or `commit_size` means "use the
/// default" (64 KiB, 256 MiB and `page_size` respectively). Reservations
/// at the preset scales need real virtual-memory support: if the OS cannot
/// satisfy the requested reservation, construction fails rather than
/// silently downgrading.
///
/// [`Arena`]: crate::arena::Arena
#[derive(Clone)]
pub struct ArenaConfig {
    /// Commit-granularity pages committed at construction. Must be >= 1.
    pub initial_pages: usize,
    /// Override for the commit page size; 0 keeps the 64 KiB default.
    /// Nonzero values must be powers of two >= 4096.
    pub page_size: usize,
    /// Upper bound on the reservation in bytes; 0 keeps the 256 MiB
    /// default. Rounded up to the OS allocation granularity.
    pub max_reserve: usize,
    /// Commit-extension granularity; 0 means "use `page_size`".
    pub commit_size: usize,
    /// Maintain counters for allocations, failures and peak usage.
    pub enable_stats: bool,
    /// Poison fresh allocations and trace bounds.
    pub enable_debug: bool,
    /// Optional sink for diagnostic messages.
    pub on_diagnostic: Option<DiagnosticHook>,
}

impl fmt::Debug for ArenaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaConfig")
            .field("initial_pages", &self.initial_pages)
            .field("page_size", &self.page_size)
            .field("max_reserve", &self.max_reserve)
            .field("commit_size", &self.commit_size)
            .field("enable_stats", &self.enable_stats)
            .field("enable_debug", &self.enable_debug)
            .field("on_diagnostic", &self.on_diagnostic.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_pages: 1,
            page_size: 0,
            max_reserve: 0,
            commit_size: 0,
            enable_stats: false,
            enable_debug: false,
            on_diagnostic: None,
        }
    }
}

impl ArenaConfig {
    /// Configuration with every field defaulted: one 64 KiB page committed
    /// up front against a 256 MiB reservation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session-scale preset: 256 GiB reservation.
    pub fn session() -> Self {
        Self::new().with_max_reserve(SESSION_RESERVE)
    }

    /// Global-scale preset: 4 TiB reservation.
    pub fn global() -> Self {
        Self::new().with_max_reserve(GLOBAL_RESERVE)
    }

    pub fn with_initial_pages(mut self, pages: usize) -> Self {
        self.initial_pages = pages;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_reserve(mut self, max_reserve: usize) -> Self {
        self.max_reserve = max_reserve;
        self
    }

    pub fn with_commit_size(mut self, commit_size: usize) -> Self {
        self.commit_size = commit_size;
        self
    }

    pub fn with_stats(mut self, enable: bool) -> Self {
        self.enable_stats = enable;
        self
    }

    pub fn with_debug(mut self, enable: bool) -> Self {
        self.enable_debug = enable;
        self
    }

    pub fn with_diagnostic_hook(mut self, hook: DiagnosticHook) -> Self {
        self.on_diagnostic = Some(hook);
        self
    }

    /// Effective commit page size after defaulting.
    pub fn resolved_page_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Effective commit-extension granularity after defaulting.
    pub fn resolved_commit_granularity(&self) -> usize {
        if self.commit_size == 0 {
            self.resolved_page_size()
        } else {
            self.commit_size
        }
    }

    /// Effective reservation request after defaulting (before rounding to
    /// the OS allocation granularity).
    pub fn resolved_reserve(&self) -> usize {
        if self.max_reserve == 0 {
            DEFAULT_RESERVE
        } else {
            self.max_reserve
        }
    }

    /// Bytes committed at construction.
    pub fn initial_commit(&self) -> usize {
        self.initial_pages
            .saturating_mul(self.resolved_commit_granularity())
    }

    /// Check the configuration, returning a distinct error per rejected
    /// field.
    pub fn validate(&self) -> Result<()> {
        if self.initial_pages == 0 {
            return Err(ArenaError::InvalidConfig("initial_pages must be at least 1"));
        }
        if self.page_size != 0 {
            if self.page_size < MIN_PAGE_SIZE {
                return Err(ArenaError::InvalidConfig("page_size must be at least 4096"));
            }
            if !self.page_size.is_power_of_two() {
                return Err(ArenaError::InvalidConfig("page_size must be a power of two"));
            }
        }
        if self.initial_commit() > self.resolved_reserve() {
            return Err(ArenaError::InvalidConfig(
                "initial commit exceeds the maximum reservation",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let config = ArenaConfig::new();
        assert_eq!(config.resolved_page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.resolved_commit_granularity(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.resolved_reserve(), DEFAULT_RESERVE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn commit_size_overrides_granularity() {
        let config = ArenaConfig::new().with_commit_size(128 * 1024);
        assert_eq!(config.resolved_commit_granularity(), 128 * 1024);
        assert_eq!(config.initial_commit(), 128 * 1024);
    }

    #[test]
    fn rejects_zero_initial_pages() {
        let config = ArenaConfig::new().with_initial_pages(0);
        assert!(matches!(
            config.validate(),
            Err(ArenaError::InvalidConfig("initial_pages must be at least 1"))
        ));
    }

    #[test]
    fn rejects_small_or_odd_page_size() {
        let small = ArenaConfig::new().with_page_size(2048);
        assert!(matches!(small.validate(), Err(ArenaError::InvalidConfig(_))));

        let odd = ArenaConfig::new().with_page_size(5000);
        assert!(matches!(odd.validate(), Err(ArenaError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_initial_commit_past_reserve() {
        let config = ArenaConfig::new()
            .with_max_reserve(DEFAULT_PAGE_SIZE)
            .with_initial_pages(2);
        assert!(matches!(config.validate(), Err(ArenaError::InvalidConfig(_))));
    }

    #[test]
    fn presets_scale_reserve() {
        assert_eq!(ArenaConfig::session().resolved_reserve(), SESSION_RESERVE);
        assert_eq!(ArenaConfig::global().resolved_reserve(), GLOBAL_RESERVE);
    }
}
