use once_cell::sync::Lazy;
use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Bookkeeping categories for allocation accounting.
///
/// Pools don't allocate anything themselves. They only count how many objects of each kind were
/// created and how many are still alive, which is useful for leak hunting and usage reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolCategory {
    Default,
    Event,
    Resource,
    Manager,
    Loader,
    Render,
}

impl PoolCategory {
    pub const ALL: [PoolCategory; 6] = [
        PoolCategory::Default,
        PoolCategory::Event,
        PoolCategory::Resource,
        PoolCategory::Manager,
        PoolCategory::Loader,
        PoolCategory::Render,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
struct PoolCounters {
    allocated: AtomicUsize,
    freed: AtomicUsize,
}

/// Per-category allocation counters.
///
/// ## Example
/// ```
/// # use gre_utils::{PoolCategory, PoolStats};
/// let stats: &'static PoolStats = Box::leak(Box::new(PoolStats::new()));
/// let token = stats.track(PoolCategory::Event);
/// assert_eq!(stats.current(PoolCategory::Event), 1);
/// drop(token);
/// assert_eq!(stats.current(PoolCategory::Event), 0);
/// assert_eq!(stats.allocated(PoolCategory::Event), 1);
/// ```
pub struct PoolStats {
    counters: [PoolCounters; PoolCategory::ALL.len()],
}

impl PoolStats {
    pub fn new() -> Self {
        Self {
            counters: Default::default(),
        }
    }

    /// Creates a token that's counted in this instance for as long as it lives.
    pub fn track(&'static self, category: PoolCategory) -> PoolToken {
        self.counters[category.index()]
            .allocated
            .fetch_add(1, Ordering::Relaxed);
        PoolToken {
            category,
            stats: self,
        }
    }

    /// Amount of objects ever allocated within the category.
    pub fn allocated(&self, category: PoolCategory) -> usize {
        self.counters[category.index()]
            .allocated
            .load(Ordering::Relaxed)
    }

    /// Amount of objects freed within the category.
    pub fn freed(&self, category: PoolCategory) -> usize {
        self.counters[category.index()].freed.load(Ordering::Relaxed)
    }

    /// Amount of currently live objects within the category.
    pub fn current(&self, category: PoolCategory) -> usize {
        // Loading freed first, so a concurrent allocation can't make this underflow
        let freed = self.freed(category);
        self.allocated(category).saturating_sub(freed)
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for category in PoolCategory::ALL {
            map.entry(&category, &self.current(category));
        }
        map.finish()
    }
}

static GLOBAL_POOLS: Lazy<PoolStats> = Lazy::new(PoolStats::new);

/// Process-wide pool statistics, used by every pooled type.
pub fn pools() -> &'static PoolStats {
    &GLOBAL_POOLS
}

/// Marks its owner as a pooled object. Embed it in a struct to have instances of it counted.
pub struct PoolToken {
    category: PoolCategory,
    stats: &'static PoolStats,
}

impl PoolToken {
    /// Creates a token counted in the global [`pools`] statistics.
    pub fn new(category: PoolCategory) -> Self {
        pools().track(category)
    }

    pub fn category(&self) -> PoolCategory {
        self.category
    }
}

impl Clone for PoolToken {
    fn clone(&self) -> Self {
        self.stats.track(self.category)
    }
}

impl Drop for PoolToken {
    fn drop(&mut self) {
        self.stats.counters[self.category.index()]
            .freed
            .fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for PoolToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PoolToken").field(&self.category).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_counted_per_category() {
        static STATS: Lazy<PoolStats> = Lazy::new(PoolStats::new);

        let a = STATS.track(PoolCategory::Resource);
        let b = a.clone();
        let c = STATS.track(PoolCategory::Manager);

        assert_eq!(STATS.current(PoolCategory::Resource), 2);
        assert_eq!(STATS.current(PoolCategory::Manager), 1);
        assert_eq!(STATS.current(PoolCategory::Event), 0);

        drop(a);
        assert_eq!(STATS.current(PoolCategory::Resource), 1);
        assert_eq!(STATS.allocated(PoolCategory::Resource), 2);
        assert_eq!(STATS.freed(PoolCategory::Resource), 1);

        drop((b, c));
        assert_eq!(STATS.current(PoolCategory::Resource), 0);
        assert_eq!(STATS.current(PoolCategory::Manager), 0);
    }
}
