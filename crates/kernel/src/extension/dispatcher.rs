//! Extension dispatcher - runs every implementation registered at a point.
//!
//! Implementations are discovered from the agent's search paths followed by
//! the `extensions/<point>` folder of every enabled plugin. Across all those
//! directories a manifest stem is seen once: the first directory (the most
//! specific one) wins. Survivors run sequentially in stem order and the first
//! error stops the rest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{Result, bail};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use super::ExtensionData;
use super::manifest::{ManifestEntry, scan_dir};
use super::registry::ExtensionRegistry;
use crate::agent::Agent;
use crate::plugin::{EXTENSIONS_DIR, PluginService, Scope};

/// Cache area for parsed extension directories.
pub const CACHE_AREA_EXTENSION_DIRS: &str = "extension_dirs";

/// Allowed extension point names: module paths joined with `.` and `-`.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static VALID_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.:\-]*$").expect("valid regex literal")
});

/// Reject point names that are empty or would leave `extensions/`.
pub fn validate_point(point: &str) -> Result<()> {
    if !VALID_POINT.is_match(point) {
        bail!("invalid extension point name '{point}'");
    }
    Ok(())
}

/// One implementation that would run at a point.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedExtension {
    pub stem: String,
    pub path: PathBuf,
    pub implementation: String,
    pub description: String,
    /// Whether the implementation id is known to the registry.
    pub registered: bool,
}

/// Dispatcher for extension points.
#[derive(Debug, Clone)]
pub struct ExtensionDispatcher {
    plugins: PluginService,
    registry: Arc<ExtensionRegistry>,
}

impl ExtensionDispatcher {
    pub fn new(plugins: PluginService, registry: Arc<ExtensionRegistry>) -> Self {
        Self { plugins, registry }
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn plugins(&self) -> &PluginService {
        &self.plugins
    }

    /// Directories searched for `point`, most specific first.
    pub fn extension_dirs(&self, point: &str, agent: Option<&Agent>) -> Vec<PathBuf> {
        let subpath = Path::new(EXTENSIONS_DIR).join(point);
        let scope = agent.map(|a| a.scope.clone()).unwrap_or_else(Scope::global);

        let mut dirs = self.plugins.layout().agent_paths(
            scope.project.as_deref(),
            scope.profile.as_deref(),
            &subpath,
        );
        for dir in self.plugins.enabled_plugin_paths(&scope, &subpath) {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }

    fn manifests_in(&self, dir: &Path) -> Arc<Vec<ManifestEntry>> {
        let cache = self.plugins.cache();
        let key = dir.to_string_lossy();
        if let Some(cached) = cache.get::<Arc<Vec<ManifestEntry>>>(CACHE_AREA_EXTENSION_DIRS, &key) {
            return cached;
        }
        let entries = Arc::new(scan_dir(dir));
        cache.add(CACHE_AREA_EXTENSION_DIRS, &key, Arc::clone(&entries));
        entries
    }

    /// Manifests that win at `point`, sorted by stem.
    fn resolve(&self, point: &str, agent: Option<&Agent>) -> Result<Vec<ManifestEntry>> {
        validate_point(point)?;

        let mut unique: BTreeMap<String, ManifestEntry> = BTreeMap::new();
        for dir in self.extension_dirs(point, agent) {
            for entry in self.manifests_in(&dir).iter() {
                if !unique.contains_key(&entry.stem) {
                    unique.insert(entry.stem.clone(), entry.clone());
                }
            }
        }
        Ok(unique.into_values().collect())
    }

    /// What would run at `point` for `agent`, including unregistered ids.
    pub fn list_implementations(
        &self,
        point: &str,
        agent: Option<&Agent>,
    ) -> Result<Vec<ResolvedExtension>> {
        Ok(self
            .resolve(point, agent)?
            .into_iter()
            .map(|entry| ResolvedExtension {
                registered: self.registry.contains(&entry.manifest.implementation),
                implementation: entry.manifest.implementation,
                description: entry.manifest.description,
                stem: entry.stem,
                path: entry.path,
            })
            .collect())
    }

    /// Run every implementation at `point`, in order.
    ///
    /// Errors from implementations are returned unchanged and stop the
    /// remaining ones. Manifests naming an unknown implementation are skipped.
    pub async fn call_extensions(
        &self,
        point: &str,
        agent: Option<&Agent>,
        data: &mut ExtensionData,
    ) -> Result<()> {
        let entries = self.resolve(point, agent)?;
        if entries.is_empty() {
            debug!(point = %point, "no extensions at point");
            return Ok(());
        }

        let mut executed = 0usize;
        for entry in &entries {
            let Some(factory) = self.registry.get(&entry.manifest.implementation) else {
                warn!(
                    point = %point,
                    path = %entry.path.display(),
                    implementation = %entry.manifest.implementation,
                    "extension implementation not registered, skipping"
                );
                continue;
            };

            let extension = factory(entry)?;
            debug!(point = %point, stem = %entry.stem, "running extension");
            extension.execute(agent, data).await?;
            executed += 1;
        }

        debug!(
            point = %point,
            found = entries.len(),
            executed,
            "extension point complete"
        );
        Ok(())
    }
}
