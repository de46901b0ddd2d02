//! Area-partitioned in-process cache.
//!
//! Entries are keyed by `(area, key)`. Each area is backed by its own Moka
//! cache so that whole areas can be dropped at once, either by exact name or
//! by glob pattern (`plugin_*`). Caching can be switched off globally or per
//! area; a disabled area never stores and never returns values.
//!
//! The area map is guarded by a single re-entrant lock. The lock is held only
//! while an entry is read, written or cleared, never across filesystem I/O.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use parking_lot::ReentrantMutex;
use tracing::{debug, warn};

/// Default per-area capacity.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Characters that turn an area name into a glob pattern.
const PATTERN_CHARS: &[char] = &['*', '?', '['];

/// A cached value. Callers downcast on read.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Options for building a [`CacheLayer`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Whether caching is enabled at all.
    pub enabled: bool,
    /// Areas that start out disabled.
    pub disabled_areas: Vec<String>,
    /// Maximum entries per area.
    pub max_entries: u64,
    /// Optional time-to-live for every entry.
    pub ttl: Option<Duration>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            disabled_areas: Vec::new(),
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: None,
        }
    }
}

/// Process-wide cache handle.
///
/// Cloning is cheap; all clones share the same storage.
#[derive(Clone)]
pub struct CacheLayer {
    inner: Arc<CacheLayerInner>,
}

struct CacheLayerInner {
    state: ReentrantMutex<RefCell<CacheState>>,
    max_entries: u64,
    ttl: Option<Duration>,
}

struct CacheState {
    enabled: bool,
    disabled_areas: HashSet<String>,
    areas: HashMap<String, Cache<String, CachedValue>>,
}

impl CacheLayer {
    /// Create a new cache layer.
    pub fn new(options: CacheOptions) -> Self {
        let state = CacheState {
            enabled: options.enabled,
            disabled_areas: options.disabled_areas.into_iter().collect(),
            areas: HashMap::new(),
        };

        Self {
            inner: Arc::new(CacheLayerInner {
                state: ReentrantMutex::new(RefCell::new(state)),
                max_entries: options.max_entries,
                ttl: options.ttl,
            }),
        }
    }

    /// Store a value under `(area, key)`.
    ///
    /// No-op when caching is disabled globally or for the area.
    pub fn add<T>(&self, area: &str, key: &str, value: T)
    where
        T: Any + Send + Sync,
    {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();
        if !state.is_active(area) {
            return;
        }

        let max_entries = self.inner.max_entries;
        let ttl = self.inner.ttl;
        let cache = state.areas.entry(area.to_string()).or_insert_with(|| {
            let builder = Cache::builder().max_capacity(max_entries);
            match ttl {
                Some(ttl) => builder.time_to_live(ttl).build(),
                None => builder.build(),
            }
        });
        cache.insert(key.to_string(), Arc::new(value));
        debug!(area = %area, key = %key, "cache set");
    }

    /// Fetch a value, downcasting it to `T`.
    ///
    /// Returns `None` on a miss, when the area is disabled, or when the stored
    /// value has a different type.
    pub fn get<T>(&self, area: &str, key: &str) -> Option<T>
    where
        T: Any + Clone + Send + Sync,
    {
        let guard = self.inner.state.lock();
        let state = guard.borrow();
        if !state.is_active(area) {
            return None;
        }

        let value = state.areas.get(area)?.get(key)?;
        match value.downcast_ref::<T>() {
            Some(v) => {
                debug!(area = %area, key = %key, "cache hit");
                Some(v.clone())
            }
            None => {
                warn!(area = %area, key = %key, "cached value has unexpected type");
                None
            }
        }
    }

    /// Fetch a value or fall back to `default`.
    pub fn get_or<T>(&self, area: &str, key: &str, default: T) -> T
    where
        T: Any + Clone + Send + Sync,
    {
        self.get(area, key).unwrap_or(default)
    }

    /// Remove a single entry.
    pub fn remove(&self, area: &str, key: &str) {
        let guard = self.inner.state.lock();
        let state = guard.borrow();
        if let Some(cache) = state.areas.get(area) {
            cache.invalidate(key);
        }
    }

    /// Drop an area, or every area matching a glob pattern.
    pub fn clear(&self, area: &str) {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();

        if !area.contains(PATTERN_CHARS) {
            state.areas.remove(area);
            debug!(area = %area, "cache area cleared");
            return;
        }

        let pattern = match glob::Pattern::new(area) {
            Ok(p) => p,
            Err(e) => {
                warn!(pattern = %area, error = %e, "invalid cache area pattern, nothing cleared");
                return;
            }
        };
        let before = state.areas.len();
        state.areas.retain(|name, _| !pattern.matches(name));
        debug!(
            pattern = %area,
            areas_cleared = before - state.areas.len(),
            "cache areas cleared by pattern"
        );
    }

    /// Drop every area.
    pub fn clear_all(&self) {
        let guard = self.inner.state.lock();
        guard.borrow_mut().areas.clear();
        debug!("cache cleared");
    }

    /// Enable or disable caching globally.
    pub fn toggle_global(&self, enabled: bool) {
        let guard = self.inner.state.lock();
        guard.borrow_mut().enabled = enabled;
    }

    /// Enable or disable caching for one area.
    ///
    /// Disabling an area also drops whatever it currently holds.
    pub fn toggle_area(&self, area: &str, enabled: bool) {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();
        if enabled {
            state.disabled_areas.remove(area);
        } else {
            state.disabled_areas.insert(area.to_string());
            state.areas.remove(area);
        }
    }

    /// Whether `(area, *)` lookups can currently hit.
    pub fn is_area_enabled(&self, area: &str) -> bool {
        let guard = self.inner.state.lock();
        let state = guard.borrow();
        state.is_active(area)
    }

    /// Get cache statistics (for diagnostics).
    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.state.lock();
        let state = guard.borrow();
        CacheStats {
            areas: state.areas.len(),
            entry_count: state
                .areas
                .values()
                .map(|c| {
                    c.run_pending_tasks();
                    c.entry_count()
                })
                .sum(),
        }
    }
}

impl CacheState {
    fn is_active(&self, area: &str) -> bool {
        self.enabled && !self.disabled_areas.contains(area)
    }
}

impl Default for CacheLayer {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of live areas.
    pub areas: usize,

    /// Number of entries across all areas.
    pub entry_count: u64,
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer").finish()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn add_then_get() {
        let cache = CacheLayer::default();
        cache.add("plugins", "memory", 42u32);
        assert_eq!(cache.get::<u32>("plugins", "memory"), Some(42));
        assert_eq!(cache.get::<u32>("plugins", "search"), None);
    }

    #[test]
    fn get_with_wrong_type_misses() {
        let cache = CacheLayer::default();
        cache.add("plugins", "memory", "text".to_string());
        assert_eq!(cache.get::<u32>("plugins", "memory"), None);
    }

    #[test]
    fn get_or_returns_default_on_miss() {
        let cache = CacheLayer::default();
        assert_eq!(cache.get_or("a", "k", 7u8), 7);
        cache.add("a", "k", 1u8);
        assert_eq!(cache.get_or("a", "k", 7u8), 1);
    }

    #[test]
    fn remove_single_key() {
        let cache = CacheLayer::default();
        cache.add("a", "k1", 1u8);
        cache.add("a", "k2", 2u8);
        cache.remove("a", "k1");
        assert_eq!(cache.get::<u8>("a", "k1"), None);
        assert_eq!(cache.get::<u8>("a", "k2"), Some(2));
    }

    #[test]
    fn clear_exact_area_leaves_others() {
        let cache = CacheLayer::default();
        cache.add("plugin_assets", "k", 1u8);
        cache.add("plugin_list", "k", 2u8);
        cache.clear("plugin_assets");
        assert_eq!(cache.get::<u8>("plugin_assets", "k"), None);
        assert_eq!(cache.get::<u8>("plugin_list", "k"), Some(2));
    }

    #[test]
    fn clear_by_pattern() {
        let cache = CacheLayer::default();
        cache.add("plugin_assets", "k", 1u8);
        cache.add("plugin_list", "k", 2u8);
        cache.add("extension_dirs", "k", 3u8);
        cache.clear("plugin_*");
        assert_eq!(cache.get::<u8>("plugin_assets", "k"), None);
        assert_eq!(cache.get::<u8>("plugin_list", "k"), None);
        assert_eq!(cache.get::<u8>("extension_dirs", "k"), Some(3));
    }

    #[test]
    fn clear_all_drops_everything() {
        let cache = CacheLayer::default();
        cache.add("a", "k", 1u8);
        cache.add("b", "k", 2u8);
        cache.clear_all();
        assert_eq!(cache.stats().areas, 0);
    }

    #[test]
    fn disabled_area_neither_stores_nor_returns() {
        let cache = CacheLayer::default();
        cache.add("a", "k", 1u8);
        cache.toggle_area("a", false);
        assert_eq!(cache.get::<u8>("a", "k"), None);
        cache.add("a", "k", 2u8);
        cache.toggle_area("a", true);
        assert_eq!(cache.get::<u8>("a", "k"), None);
    }

    #[test]
    fn global_toggle() {
        let cache = CacheLayer::default();
        cache.toggle_global(false);
        cache.add("a", "k", 1u8);
        cache.toggle_global(true);
        assert_eq!(cache.get::<u8>("a", "k"), None);
        assert!(cache.is_area_enabled("a"));
    }

    #[test]
    fn area_disabled_from_options() {
        let cache = CacheLayer::new(CacheOptions {
            disabled_areas: vec!["extension_dirs".into()],
            ..CacheOptions::default()
        });
        assert!(!cache.is_area_enabled("extension_dirs"));
        assert!(cache.is_area_enabled("plugin_list"));
    }

    #[test]
    fn stats_count_entries() {
        let cache = CacheLayer::default();
        cache.add("a", "k1", 1u8);
        cache.add("a", "k2", 1u8);
        cache.add("b", "k1", 1u8);
        let stats = cache.stats();
        assert_eq!(stats.areas, 2);
        assert_eq!(stats.entry_count, 3);
    }
}
