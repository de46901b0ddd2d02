//! Plugin discovery by directory convention.
//!
//! Plugin roots are scanned in priority order (user first). The first root
//! that holds a `plugin.yaml` for a name wins. Directories without metadata
//! are not plugins (user-level override folders often hold only a config or
//! a toggle marker); directories with broken metadata are logged and skipped
//! so one bad plugin never hides the others.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::{PluginError, validate_plugin_name};
use super::info_parser::PluginMeta;
use super::layout::{Layout, META_FILE_NAME};
use super::service::{CACHE_AREA_PLUGINS, PluginService};
use super::toggle::ToggleState;

/// Where a plugin was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Shipped under `<root>/plugins`.
    Builtin,
    /// Installed under `<user>/plugins`.
    User,
}

/// A discovered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    pub name: String,
    /// Directory holding `plugin.yaml`.
    pub path: PathBuf,
    pub meta: PluginMeta,
    pub provenance: Provenance,
}

impl PluginDescriptor {
    /// Title for display, falling back to the name.
    pub fn display_title(&self) -> &str {
        if self.meta.title.is_empty() {
            &self.name
        } else {
            &self.meta.title
        }
    }
}

/// Docs a plugin may ship next to its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginDoc {
    Readme,
    License,
}

impl PluginDoc {
    pub fn file_name(self) -> &'static str {
        match self {
            PluginDoc::Readme => "README.md",
            PluginDoc::License => "LICENSE",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PluginDoc::Readme => "readme",
            PluginDoc::License => "license",
        }
    }
}

impl std::str::FromStr for PluginDoc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "readme" => Ok(PluginDoc::Readme),
            "license" => Ok(PluginDoc::License),
            other => Err(format!("unknown doc '{other}', expected readme or license")),
        }
    }
}

/// Filter for plugin listings. Both `false` means "everything".
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub custom: bool,
    pub builtin: bool,
}

impl ListFilter {
    fn accepts(self, provenance: Provenance) -> bool {
        match (self.custom, self.builtin) {
            (false, false) | (true, true) => true,
            (true, false) => provenance == Provenance::User,
            (false, true) => provenance == Provenance::Builtin,
        }
    }
}

/// Listing row with everything an admin surface shows.
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub version: String,
    pub path: PathBuf,
    pub provenance: Provenance,
    pub settings_sections: Vec<String>,
    pub has_config_screen: bool,
    pub has_readme: bool,
    pub has_license: bool,
    pub per_project_config: bool,
    pub per_agent_config: bool,
    pub always_enabled: bool,
    pub toggle_state: ToggleState,
}

/// Scan plugin roots without consulting the cache.
pub fn discover_plugins(layout: &Layout) -> Vec<PluginDescriptor> {
    let mut found: Vec<PluginDescriptor> = Vec::new();

    for (root, provenance) in layout
        .plugin_roots()
        .into_iter()
        .zip([Provenance::User, Provenance::Builtin])
    {
        if !root.is_dir() {
            debug!(root = %root.display(), "plugin root does not exist, skipping");
            continue;
        }

        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "failed to read plugin root");
                continue;
            }
        };

        let mut dirs: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .collect();

        // Sort for deterministic discovery order
        dirs.sort_by_key(|e| e.file_name());

        for entry in dirs {
            let name = entry.file_name().to_string_lossy().into_owned();
            if found.iter().any(|p| p.name == name) {
                continue;
            }
            if let Some(descriptor) = load_descriptor(&entry.path(), &name, provenance) {
                found.push(descriptor);
            }
        }
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    info!(count = found.len(), "discovered plugins");
    found
}

fn load_descriptor(dir: &Path, name: &str, provenance: Provenance) -> Option<PluginDescriptor> {
    let meta_path = dir.join(META_FILE_NAME);
    if !meta_path.is_file() {
        debug!(dir = %dir.display(), "no plugin metadata, not a plugin");
        return None;
    }

    match PluginMeta::parse(&meta_path) {
        Ok(meta) => Some(PluginDescriptor {
            name: name.to_string(),
            path: dir.to_path_buf(),
            meta,
            provenance,
        }),
        Err(e) => {
            warn!(path = %meta_path.display(), error = %e, "failed to parse plugin metadata, skipping");
            None
        }
    }
}

impl PluginService {
    /// All discovered plugins, sorted by name.
    pub fn list_plugins(&self) -> Arc<Vec<PluginDescriptor>> {
        if let Some(cached) = self.cache().get::<Arc<Vec<PluginDescriptor>>>(CACHE_AREA_PLUGINS, "all") {
            return cached;
        }

        let plugins = Arc::new(discover_plugins(self.layout()));
        self.cache().add(CACHE_AREA_PLUGINS, "all", Arc::clone(&plugins));
        plugins
    }

    /// Find a single plugin by name.
    pub fn find_plugin(&self, name: &str) -> Option<PluginDescriptor> {
        if validate_plugin_name(name).is_err() {
            return None;
        }
        self.list_plugins().iter().find(|p| p.name == name).cloned()
    }

    /// Find a plugin or fail with [`PluginError::NotFound`].
    pub fn require_plugin(&self, name: &str) -> Result<PluginDescriptor, PluginError> {
        validate_plugin_name(name)?;
        self.find_plugin(name)
            .ok_or_else(|| PluginError::not_found(name))
    }

    /// Metadata for `name`, or defaults when the plugin is unknown.
    pub fn plugin_meta(&self, name: &str) -> PluginMeta {
        self.find_plugin(name).map(|p| p.meta).unwrap_or_default()
    }

    /// Listing rows for admin surfaces.
    pub fn plugin_summaries(&self, filter: ListFilter) -> Vec<PluginSummary> {
        self.list_plugins()
            .iter()
            .filter(|p| filter.accepts(p.provenance))
            .map(|p| PluginSummary {
                name: p.name.clone(),
                display_name: p.display_title().to_string(),
                description: p.meta.description.clone(),
                version: p.meta.version.clone(),
                path: p.path.clone(),
                provenance: p.provenance,
                settings_sections: p.meta.settings_sections.clone(),
                has_config_screen: p.meta.has_config_screen(),
                has_readme: p.path.join(PluginDoc::Readme.file_name()).is_file(),
                has_license: p.path.join(PluginDoc::License.file_name()).is_file(),
                per_project_config: p.meta.per_project_config,
                per_agent_config: p.meta.per_agent_config,
                always_enabled: p.meta.always_enabled,
                toggle_state: self.toggle_state(&p.name),
            })
            .collect()
    }

    /// Read a doc shipped with the plugin.
    pub fn read_doc(&self, plugin: &str, doc: PluginDoc) -> Result<(PathBuf, String), PluginError> {
        let descriptor = self.require_plugin(plugin)?;
        let path = descriptor.path.join(doc.file_name());
        if !path.is_file() {
            return Err(PluginError::MissingDoc {
                plugin: plugin.to_string(),
                doc: doc.label(),
            });
        }
        let content =
            std::fs::read_to_string(&path).map_err(|e| PluginError::io(plugin, &path, e))?;
        Ok((path, content))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::CacheLayer;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn user_root_wins_on_name_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("plugins/memory/plugin.yaml"), "title: Builtin Memory\n");
        write(&tmp.path().join("usr/plugins/memory/plugin.yaml"), "title: User Memory\n");
        write(&tmp.path().join("plugins/search/plugin.yaml"), "title: Search\n");

        let found = discover_plugins(&Layout::new(tmp.path()));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "memory");
        assert_eq!(found[0].meta.title, "User Memory");
        assert_eq!(found[0].provenance, Provenance::User);
        assert_eq!(found[1].name, "search");
        assert_eq!(found[1].provenance, Provenance::Builtin);
    }

    #[test]
    fn override_dir_without_metadata_falls_through() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("plugins/memory/plugin.yaml"), "title: Memory\n");
        write(&tmp.path().join("usr/plugins/memory/.toggle-0"), "");

        let found = discover_plugins(&Layout::new(tmp.path()));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].provenance, Provenance::Builtin);
        assert_eq!(found[0].path, tmp.path().join("plugins/memory"));
    }

    #[test]
    fn broken_plugin_does_not_hide_others() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("plugins/broken/plugin.yaml"), "title: [oops");
        write(&tmp.path().join("plugins/search/plugin.yaml"), "title: Search\n");
        std::fs::create_dir_all(tmp.path().join("plugins/.hidden")).unwrap();

        let found = discover_plugins(&Layout::new(tmp.path()));
        let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["search"]);
    }

    #[test]
    fn missing_roots_yield_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_plugins(&Layout::new(tmp.path())).is_empty());
    }

    #[test]
    fn listing_is_cached_until_invalidated() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("plugins/search/plugin.yaml"), "title: Search\n");
        let service = PluginService::new(Arc::new(Layout::new(tmp.path())), CacheLayer::default());

        assert_eq!(service.list_plugins().len(), 1);
        write(&tmp.path().join("plugins/memory/plugin.yaml"), "title: Memory\n");
        assert_eq!(service.list_plugins().len(), 1);

        service.invalidate();
        assert_eq!(service.list_plugins().len(), 2);
    }

    #[test]
    fn list_filter_by_provenance() {
        let filter = ListFilter {
            custom: true,
            builtin: false,
        };
        assert!(filter.accepts(Provenance::User));
        assert!(!filter.accepts(Provenance::Builtin));
        assert!(ListFilter::default().accepts(Provenance::Builtin));
    }

    #[test]
    fn doc_names_parse() {
        assert_eq!("README".parse::<PluginDoc>().unwrap(), PluginDoc::Readme);
        assert!("changelog".parse::<PluginDoc>().is_err());
    }
}
