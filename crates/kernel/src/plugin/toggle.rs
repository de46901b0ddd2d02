//! Toggle state: is a plugin on, off, or overridden per scope?
//!
//! Each precedence level may hold `.toggle-1` (enabled) or `.toggle-0`
//! (disabled). A missing marker defers to the next less specific level.
//! The effective value is folded from the least specific level up to the
//! most specific one, starting at enabled.
//!
//! Unlike asset resolution (first satisfied level wins) this walks every
//! level: a disable at the built-in level followed by an enable at the user
//! level nets out to enabled.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{PathCatalog, Scope, ScopeFilter};
use super::error::{PluginError, validate_name, validate_plugin_name};
use super::layout::{EXTENSIONS_DIR, TOGGLE_DISABLED_FILE_NAME, TOGGLE_ENABLED_FILE_NAME};
use super::resolver::{AssetMatch, AssetQuery};
use super::service::{CACHE_AREA_TOGGLES, PluginService};

/// Summary label for admin listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleState {
    Enabled,
    Disabled,
    /// At least one project- or profile-specific marker exists.
    Advanced,
}

impl std::fmt::Display for ToggleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ToggleState::Enabled => "enabled",
            ToggleState::Disabled => "disabled",
            ToggleState::Advanced => "advanced",
        })
    }
}

/// Markers present at one precedence level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelMarkers {
    pub enabled: bool,
    pub disabled: bool,
}

/// Fold markers given least specific first.
///
/// A level flips the state at most once: an enabled state only reacts to a
/// disabled marker, a disabled state only to an enabled marker.
pub fn fold_markers(levels: impl IntoIterator<Item = LevelMarkers>) -> bool {
    levels.into_iter().fold(true, |enabled, markers| {
        if enabled && markers.disabled {
            false
        } else if !enabled && markers.enabled {
            true
        } else {
            enabled
        }
    })
}

fn marker_name(enabled: bool) -> &'static str {
    if enabled {
        TOGGLE_ENABLED_FILE_NAME
    } else {
        TOGGLE_DISABLED_FILE_NAME
    }
}

impl PluginService {
    /// Effective enabled state of `plugin` for `scope`.
    pub fn is_enabled(&self, plugin: &str, scope: &Scope) -> bool {
        let meta = self.plugin_meta(plugin);
        if meta.always_enabled {
            return true;
        }

        let key = format!("{plugin}|{scope:?}");
        if let Some(cached) = self.cache().get::<bool>(CACHE_AREA_TOGGLES, &key) {
            return cached;
        }

        let catalog = PathCatalog::build(
            self.layout(),
            plugin,
            &meta,
            &scope.project_filter(),
            &scope.profile_filter(),
        );
        let markers = catalog.levels().iter().rev().map(|level| LevelMarkers {
            enabled: !level
                .probe(self.layout(), Path::new(TOGGLE_ENABLED_FILE_NAME))
                .is_empty(),
            disabled: !level
                .probe(self.layout(), Path::new(TOGGLE_DISABLED_FILE_NAME))
                .is_empty(),
        });
        let enabled = fold_markers(markers);

        debug!(plugin = %plugin, ?scope, enabled, "folded toggle markers");
        self.cache().add(CACHE_AREA_TOGGLES, &key, enabled);
        enabled
    }

    /// Every toggle marker for `plugin` across all scopes.
    pub fn toggle_markers(&self, plugin: &str) -> Vec<AssetMatch> {
        [TOGGLE_ENABLED_FILE_NAME, TOGGLE_DISABLED_FILE_NAME]
            .into_iter()
            .flat_map(|marker| {
                let query = AssetQuery::new(plugin, marker)
                    .project(ScopeFilter::Any)
                    .profile(ScopeFilter::Any)
                    .all();
                self.find_assets(&query).as_ref().clone()
            })
            .collect()
    }

    /// Classify `plugin` as enabled, disabled or advanced.
    ///
    /// `Advanced` wins whenever any scoped marker exists, whatever the global
    /// fold says; the label does not tell which scope ends up on top.
    pub fn toggle_state(&self, plugin: &str) -> ToggleState {
        if self.plugin_meta(plugin).always_enabled {
            return ToggleState::Enabled;
        }

        let global = self.is_enabled(plugin, &Scope::global());
        if self.toggle_markers(plugin).iter().any(AssetMatch::is_scoped) {
            return ToggleState::Advanced;
        }

        if global {
            ToggleState::Enabled
        } else {
            ToggleState::Disabled
        }
    }

    /// Write a toggle marker for `plugin` at the given scope.
    ///
    /// Empty `project`/`profile` mean "not scoped". With `clear_overrides`,
    /// every scoped marker is removed first so the new value applies
    /// everywhere. Returns the marker path.
    pub fn toggle_plugin(
        &self,
        plugin: &str,
        enabled: bool,
        project: &str,
        profile: &str,
        clear_overrides: bool,
    ) -> Result<PathBuf, PluginError> {
        let descriptor = self.require_plugin(plugin)?;
        if descriptor.meta.always_enabled {
            return Err(PluginError::AlwaysEnabled {
                plugin: plugin.to_string(),
            });
        }
        if !project.is_empty() {
            validate_name("project", project)?;
            if !descriptor.meta.per_project_config {
                return Err(PluginError::ScopeNotSupported {
                    plugin: plugin.to_string(),
                    scope: "project",
                    flag: "per_project_config",
                });
            }
        }
        if !profile.is_empty() {
            validate_name("profile", profile)?;
            if !descriptor.meta.per_agent_config {
                return Err(PluginError::ScopeNotSupported {
                    plugin: plugin.to_string(),
                    scope: "agent profile",
                    flag: "per_agent_config",
                });
            }
        }

        if clear_overrides {
            for marker in self.toggle_markers(plugin).iter().filter(|m| m.is_scoped()) {
                std::fs::remove_file(&marker.path)
                    .map_err(|e| PluginError::io(plugin, &marker.path, e))?;
                debug!(path = %marker.path.display(), "removed scoped toggle marker");
            }
        }

        let dir = self.layout().plugin_save_dir(plugin, project, profile);
        std::fs::create_dir_all(&dir).map_err(|e| PluginError::io(plugin, &dir, e))?;

        let opposite = dir.join(marker_name(!enabled));
        if opposite.exists() {
            std::fs::remove_file(&opposite).map_err(|e| PluginError::io(plugin, &opposite, e))?;
        }
        let marker = dir.join(marker_name(enabled));
        std::fs::File::create(&marker).map_err(|e| PluginError::io(plugin, &marker, e))?;

        self.invalidate();
        info!(
            plugin = %plugin,
            enabled,
            project = %project,
            profile = %profile,
            clear_overrides,
            "plugin toggled"
        );
        Ok(marker)
    }

    /// `<plugin dir>/<subpath>` for every plugin enabled in `scope`.
    pub fn enabled_plugin_paths(&self, scope: &Scope, subpath: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for plugin in self.list_plugins().iter() {
            if !self.is_enabled(&plugin.name, scope) {
                continue;
            }
            let candidate = plugin.path.join(subpath);
            if candidate.is_dir() && !paths.contains(&candidate) {
                paths.push(candidate);
            }
        }
        paths
    }
}

/// Front-end extension directory name under a plugin's `extensions/`.
pub const WEBUI_DIR: &str = "webui";

/// A browser-side file a plugin contributes to a web UI extension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebuiExtension {
    pub plugin: String,
    /// Relative to the layout root when the plugin lives under it.
    pub path: PathBuf,
}

impl PluginService {
    /// Files under `extensions/webui/<point>` of every discovered plugin.
    ///
    /// `filters` are glob patterns matched at any depth (`*` when empty).
    /// Each plugin's files are sorted by file name; a file matched by more
    /// than one filter is listed once.
    pub fn webui_extensions(
        &self,
        point: &str,
        filters: &[&str],
    ) -> Result<Vec<WebuiExtension>, PluginError> {
        validate_name("extension point", point)?;
        let filters: &[&str] = if filters.is_empty() { &["*"] } else { filters };

        let mut entries = Vec::new();
        for plugin in self.list_plugins().iter() {
            let dir = plugin.path.join(EXTENSIONS_DIR).join(WEBUI_DIR).join(point);
            if !dir.is_dir() {
                continue;
            }

            let base = glob::Pattern::escape(&dir.to_string_lossy());
            let mut files: Vec<PathBuf> = Vec::new();
            for filter in filters {
                let pattern = format!("{base}/**/{filter}");
                let matches = match glob::glob(&pattern) {
                    Ok(matches) => matches,
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "invalid web UI extension filter");
                        continue;
                    }
                };
                for path in matches.filter_map(|p| p.ok()) {
                    if path.is_file() && !files.contains(&path) {
                        files.push(path);
                    }
                }
            }
            files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

            let root = self.layout().root();
            entries.extend(files.into_iter().map(|path| WebuiExtension {
                plugin: plugin.name.clone(),
                path: path.strip_prefix(root).map(Path::to_path_buf).unwrap_or(path),
            }));
        }
        debug!(point = %point, count = entries.len(), "web UI extensions listed");
        Ok(entries)
    }
}

/// Markers seen for `plugin` in `scope`, least specific first.
///
/// Feeds `plexus plugins show`, which prints the fold level by level.
pub fn explain_fold(
    service: &PluginService,
    plugin: &str,
    scope: &Scope,
) -> Result<Vec<(PathBuf, LevelMarkers)>, PluginError> {
    validate_plugin_name(plugin)?;
    let meta = service.plugin_meta(plugin);
    let catalog = PathCatalog::build(
        service.layout(),
        plugin,
        &meta,
        &scope.project_filter(),
        &scope.profile_filter(),
    );

    let mut rows = Vec::new();
    for level in catalog.levels().iter().rev() {
        for (name, is_enabled) in [
            (TOGGLE_ENABLED_FILE_NAME, true),
            (TOGGLE_DISABLED_FILE_NAME, false),
        ] {
            for hit in level.probe(service.layout(), Path::new(name)) {
                let markers = LevelMarkers {
                    enabled: is_enabled,
                    disabled: !is_enabled,
                };
                rows.push((hit.path, markers));
            }
        }
    }
    Ok(rows)
}
