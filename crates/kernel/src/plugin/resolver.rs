//! Asset resolver: walks the path catalog for a plugin file.
//!
//! With `only_first` the walk stops at the first level that yields anything,
//! so the most specific override wins outright (no merging). Without it every
//! level is walked; that mode backs admin listings and cleanup.
//!
//! Not finding anything is a normal outcome and never an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::catalog::{PathCatalog, ScopeFilter};
use super::service::{CACHE_AREA_ASSETS, PluginService};

/// A request for one plugin asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetQuery {
    pub plugin: String,
    /// Path relative to a plugin directory, e.g. `config.json`.
    pub subpath: PathBuf,
    pub project: ScopeFilter,
    pub profile: ScopeFilter,
    pub only_first: bool,
}

impl AssetQuery {
    /// Query for the most specific match across all levels.
    pub fn new(plugin: impl Into<String>, subpath: impl Into<PathBuf>) -> Self {
        Self {
            plugin: plugin.into(),
            subpath: subpath.into(),
            project: ScopeFilter::Unset,
            profile: ScopeFilter::Unset,
            only_first: true,
        }
    }

    pub fn project(mut self, project: ScopeFilter) -> Self {
        self.project = project;
        self
    }

    pub fn profile(mut self, profile: ScopeFilter) -> Self {
        self.profile = profile;
        self
    }

    /// Return every match instead of the first.
    pub fn all(mut self) -> Self {
        self.only_first = false;
        self
    }

    fn cache_key(&self) -> String {
        format!(
            "{}|{}|{:?}|{:?}|{}",
            self.plugin,
            self.subpath.display(),
            self.project,
            self.profile,
            self.only_first
        )
    }
}

/// A resolved asset and the scope it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetMatch {
    pub path: PathBuf,
    pub project: Option<String>,
    pub profile: Option<String>,
}

impl AssetMatch {
    /// Whether the match lives in a project- or profile-specific directory.
    pub fn is_scoped(&self) -> bool {
        self.project.is_some() || self.profile.is_some()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Subpaths that must stay inside the plugin directory.
fn is_safe_subpath(subpath: &Path) -> bool {
    subpath
        .components()
        .all(|c| matches!(c, std::path::Component::Normal(_)))
}

impl PluginService {
    /// Find matches for `query`, ordered by precedence then path.
    pub fn find_assets(&self, query: &AssetQuery) -> Arc<Vec<AssetMatch>> {
        if !is_safe_subpath(&query.subpath) || query.plugin.is_empty() {
            debug!(plugin = %query.plugin, subpath = %query.subpath.display(), "rejected asset query");
            return Arc::new(Vec::new());
        }

        let key = query.cache_key();
        if let Some(cached) = self.cache().get::<Arc<Vec<AssetMatch>>>(CACHE_AREA_ASSETS, &key) {
            return cached;
        }

        let meta = self.plugin_meta(&query.plugin);
        let catalog = PathCatalog::build(
            self.layout(),
            &query.plugin,
            &meta,
            &query.project,
            &query.profile,
        );

        let mut matches = Vec::new();
        for level in catalog.levels() {
            let hits = level.probe(self.layout(), &query.subpath);
            if hits.is_empty() {
                continue;
            }
            matches.extend(hits.into_iter().map(|hit| AssetMatch {
                path: hit.path,
                project: hit.project,
                profile: hit.profile,
            }));
            if query.only_first {
                matches.truncate(1);
                break;
            }
        }

        debug!(
            plugin = %query.plugin,
            subpath = %query.subpath.display(),
            levels = catalog.len(),
            matches = matches.len(),
            "resolved plugin asset"
        );

        let matches = Arc::new(matches);
        self.cache().add(CACHE_AREA_ASSETS, &key, Arc::clone(&matches));
        matches
    }

    /// The single most specific match, if any.
    pub fn find_asset(&self, query: &AssetQuery) -> Option<AssetMatch> {
        let mut query = query.clone();
        query.only_first = true;
        self.find_assets(&query).first().cloned()
    }
}
