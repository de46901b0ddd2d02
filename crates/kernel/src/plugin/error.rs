//! Plugin system error types with clear, actionable messages.
//!
//! All errors include the plugin name and relevant context to help
//! developers quickly identify and fix issues.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by plugin administration (toggle, config, docs).
///
/// Lookups never fail with "not found" for assets; only operations that need
/// an existing plugin or write to disk return these.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No plugin root contains a directory with `plugin.yaml` for this name.
    #[error("plugin '{plugin}': not found in any plugin root")]
    NotFound { plugin: String },

    /// Plugin, project or profile name would escape its directory.
    #[error("{kind} name '{name}' is invalid: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    /// Attempt to switch off a plugin declared `always_enabled`.
    #[error("plugin '{plugin}': declared always_enabled and cannot be toggled")]
    AlwaysEnabled { plugin: String },

    /// Scoped override requested on a plugin that does not allow it.
    #[error("plugin '{plugin}': {scope} overrides are not supported (set {flag}: true in plugin.yaml)")]
    ScopeNotSupported {
        plugin: String,
        scope: &'static str,
        flag: &'static str,
    },

    /// Config payload must be a mapping.
    #[error("plugin '{plugin}': settings must be an object")]
    InvalidSettings { plugin: String },

    /// Path given for deletion is not one of the plugin's config files.
    #[error("plugin '{plugin}': {path} is not a config file of this plugin")]
    NotAConfigFile { plugin: String, path: PathBuf },

    /// Unsupported config format.
    #[error("unsupported config format for {path} (expected .json, .yaml or .yml)")]
    UnsupportedFormat { path: PathBuf },

    /// Requested doc is not shipped with the plugin.
    #[error("plugin '{plugin}': no {doc} file")]
    MissingDoc { plugin: String, doc: &'static str },

    /// Underlying filesystem failure.
    #[error("plugin '{plugin}': I/O error at {path}: {source}")]
    Io {
        plugin: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be decoded.
    #[error("plugin '{plugin}': malformed config at {path}: {details}")]
    MalformedConfig {
        plugin: String,
        path: PathBuf,
        details: String,
    },
}

impl PluginError {
    /// Create a not-found error.
    pub fn not_found(plugin: impl Into<String>) -> Self {
        Self::NotFound {
            plugin: plugin.into(),
        }
    }

    /// Create an I/O error.
    pub fn io(plugin: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            plugin: plugin.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a malformed-config error.
    pub fn malformed(
        plugin: impl Into<String>,
        path: impl Into<PathBuf>,
        details: impl std::fmt::Display,
    ) -> Self {
        Self::MalformedConfig {
            plugin: plugin.into(),
            path: path.into(),
            details: details.to_string(),
        }
    }
}

/// Reject names that are empty or could traverse out of their directory.
pub fn validate_name(kind: &'static str, name: &str) -> Result<(), PluginError> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.contains(['/', '\\', '\0']) {
        "must not contain path separators"
    } else if name == "." || name == ".." {
        "must not be a relative path component"
    } else if name.contains(['*', '?', '[']) {
        "must not contain glob characters"
    } else {
        return Ok(());
    };
    Err(PluginError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    })
}

pub fn validate_plugin_name(plugin: &str) -> Result<(), PluginError> {
    validate_name("plugin", plugin)
}
