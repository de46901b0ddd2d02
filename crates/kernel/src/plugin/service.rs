//! Plugin service: the single entry point for plugin lookups.
//!
//! All resolution goes through this type so that precedence rules and
//! caching stay in one place. Call sites never read plugin directories
//! directly.

use std::sync::Arc;

use tracing::debug;

use super::layout::Layout;
use crate::cache::CacheLayer;

/// Cache area for discovery snapshots.
pub const CACHE_AREA_PLUGINS: &str = "plugin_list";
/// Cache area for asset resolution results.
pub const CACHE_AREA_ASSETS: &str = "plugin_assets";
/// Cache area for folded toggle results.
pub const CACHE_AREA_TOGGLES: &str = "plugin_toggles";

/// Plugin lookups bound to a layout and a cache.
///
/// Cheap to clone.
#[derive(Debug, Clone)]
pub struct PluginService {
    layout: Arc<Layout>,
    cache: CacheLayer,
}

impl PluginService {
    pub fn new(layout: Arc<Layout>, cache: CacheLayer) -> Self {
        Self { layout, cache }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    /// Write barrier after any change to the plugin set on disk.
    ///
    /// Clears the whole cache: discovery, assets, toggles and extension
    /// directory scans all derive from the same files.
    pub fn invalidate(&self) {
        debug!("plugin state changed, clearing cache");
        self.cache.clear_all();
    }
}
