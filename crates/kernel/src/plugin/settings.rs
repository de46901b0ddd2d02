//! Plugin configuration on top of the asset resolver.
//!
//! Reads pick the most specific `config.json`; when no override exists the
//! plugin's own `default_config.yaml` is used. Writes always produce JSON in
//! the save directory for the requested scope and invalidate the cache.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::catalog::{Scope, ScopeFilter};
use super::error::{PluginError, validate_name};
use super::layout::{
    CONFIG_DEFAULT_FILE_NAME, CONFIG_FILE_NAME, TOGGLE_DISABLED_FILE_NAME,
    TOGGLE_ENABLED_FILE_NAME,
};
use super::resolver::{AssetMatch, AssetQuery};
use super::service::PluginService;

/// Decode a JSON or YAML file, picked by extension.
pub fn load_structured(path: &Path) -> Result<Value, PluginError> {
    let plugin = plugin_of(path);
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let content = match format.as_deref() {
        Some("json" | "yaml" | "yml") => {
            std::fs::read_to_string(path).map_err(|e| PluginError::io(&plugin, path, e))?
        }
        _ => {
            return Err(PluginError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };

    if content.trim().is_empty() {
        return Ok(Value::Null);
    }

    match format.as_deref() {
        Some("json") => {
            serde_json::from_str(&content).map_err(|e| PluginError::malformed(&plugin, path, e))
        }
        _ => serde_yml::from_str(&content).map_err(|e| PluginError::malformed(&plugin, path, e)),
    }
}

/// Best-effort plugin name for error messages: the directory above the file.
fn plugin_of(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A config as loaded for an admin surface, with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedConfig {
    /// File the data was read from, `None` when the plugin ships nothing.
    pub path: Option<PathBuf>,
    pub project: Option<String>,
    pub profile: Option<String>,
    pub data: Value,
}

/// Which per-scope files a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Config,
    Toggle,
}

impl ConfigKind {
    fn file_names(self) -> &'static [&'static str] {
        match self {
            ConfigKind::Config => &[CONFIG_FILE_NAME],
            ConfigKind::Toggle => &[TOGGLE_ENABLED_FILE_NAME, TOGGLE_DISABLED_FILE_NAME],
        }
    }
}

impl std::str::FromStr for ConfigKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(ConfigKind::Config),
            "toggle" => Ok(ConfigKind::Toggle),
            other => Err(format!("unknown asset kind '{other}', expected config or toggle")),
        }
    }
}

impl PluginService {
    /// Effective config for `plugin` as seen from `scope`.
    ///
    /// `Ok(None)` when neither an override nor a default exists.
    pub fn plugin_config(&self, plugin: &str, scope: &Scope) -> Result<Option<Value>, PluginError> {
        let loaded = self.load_config(plugin, &scope.project_filter(), &scope.profile_filter())?;
        Ok(loaded.path.map(|_| loaded.data))
    }

    /// Load the config an admin would edit for the given filters.
    pub fn load_config(
        &self,
        plugin: &str,
        project: &ScopeFilter,
        profile: &ScopeFilter,
    ) -> Result<LoadedConfig, PluginError> {
        let descriptor = self.require_plugin(plugin)?;

        let query = AssetQuery::new(plugin, CONFIG_FILE_NAME)
            .project(project.clone())
            .profile(profile.clone());
        if let Some(found) = self.find_asset(&query) {
            debug!(plugin = %plugin, path = %found.path.display(), "loaded config override");
            return Ok(LoadedConfig {
                data: load_structured(&found.path)?,
                path: Some(found.path),
                project: found.project,
                profile: found.profile,
            });
        }

        let default_path = descriptor.path.join(CONFIG_DEFAULT_FILE_NAME);
        if default_path.is_file() {
            return Ok(LoadedConfig {
                data: load_structured(&default_path)?,
                path: Some(default_path),
                project: None,
                profile: None,
            });
        }

        Ok(LoadedConfig {
            path: None,
            project: None,
            profile: None,
            data: Value::Object(serde_json::Map::new()),
        })
    }

    /// Save `settings` as the `config.json` override for a scope.
    pub fn save_config(
        &self,
        plugin: &str,
        project: &str,
        profile: &str,
        settings: &Value,
    ) -> Result<PathBuf, PluginError> {
        self.require_plugin(plugin)?;
        if !settings.is_object() {
            return Err(PluginError::InvalidSettings {
                plugin: plugin.to_string(),
            });
        }
        if !project.is_empty() {
            validate_name("project", project)?;
        }
        if !profile.is_empty() {
            validate_name("profile", profile)?;
        }

        let dir = self.layout().plugin_save_dir(plugin, project, profile);
        std::fs::create_dir_all(&dir).map_err(|e| PluginError::io(plugin, &dir, e))?;
        let path = dir.join(CONFIG_FILE_NAME);
        let body = serde_json::to_string_pretty(settings)
            .map_err(|e| PluginError::malformed(plugin, &path, e))?;
        std::fs::write(&path, body).map_err(|e| PluginError::io(plugin, &path, e))?;

        self.invalidate();
        info!(plugin = %plugin, path = %path.display(), "plugin config saved");
        Ok(path)
    }

    /// Every per-scope file of `kind` for `plugin`, across all scopes.
    pub fn list_configs(&self, plugin: &str, kind: ConfigKind) -> Result<Vec<AssetMatch>, PluginError> {
        self.require_plugin(plugin)?;
        let mut found = Vec::new();
        for file_name in kind.file_names() {
            let query = AssetQuery::new(plugin, *file_name)
                .project(ScopeFilter::Any)
                .profile(ScopeFilter::Any)
                .all();
            found.extend(self.find_assets(&query).iter().cloned());
        }
        Ok(found)
    }

    /// Delete one config or toggle file previously reported by [`list_configs`].
    ///
    /// Only paths that show up in a listing may be deleted, so this cannot be
    /// pointed at arbitrary files.
    ///
    /// [`list_configs`]: PluginService::list_configs
    pub fn delete_config(&self, plugin: &str, path: &Path) -> Result<(), PluginError> {
        let known = [ConfigKind::Config, ConfigKind::Toggle]
            .into_iter()
            .map(|kind| self.list_configs(plugin, kind))
            .collect::<Result<Vec<_>, _>>()?;
        if !known.iter().flatten().any(|m| m.path == path) {
            return Err(PluginError::NotAConfigFile {
                plugin: plugin.to_string(),
                path: path.to_path_buf(),
            });
        }

        std::fs::remove_file(path).map_err(|e| PluginError::io(plugin, path, e))?;
        self.invalidate();
        info!(plugin = %plugin, path = %path.display(), "plugin config deleted");
        Ok(())
    }
}
