//! Plexus test utilities.
//!
//! Helpers for integration testing: an on-disk application tree with
//! plugins, agent profiles, projects, toggle markers and extension
//! manifests, rooted in a temporary directory.

#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use tempfile::TempDir;

/// Which base a plugin or override lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    /// `<root>`
    Root,
    /// `<root>/usr`
    User,
}

/// Scope of an override write.
#[derive(Debug, Clone, Default)]
pub struct At {
    pub project: Option<String>,
    pub profile: Option<String>,
    /// Plugin contributing the profile (`<base>/plugins/<owner>/agents/...`).
    pub owner: Option<(Base, String)>,
    pub builtin: bool,
}

impl At {
    /// The user directory.
    pub fn user() -> Self {
        Self::default()
    }

    /// The built-in plugin directory.
    pub fn builtin() -> Self {
        Self {
            builtin: true,
            ..Self::default()
        }
    }

    pub fn project(project: &str) -> Self {
        Self {
            project: Some(project.to_string()),
            ..Self::default()
        }
    }

    /// User-level agent profile.
    pub fn profile(profile: &str) -> Self {
        Self {
            profile: Some(profile.to_string()),
            ..Self::default()
        }
    }

    /// Built-in agent profile.
    pub fn builtin_profile(profile: &str) -> Self {
        Self {
            profile: Some(profile.to_string()),
            builtin: true,
            ..Self::default()
        }
    }

    pub fn project_profile(project: &str, profile: &str) -> Self {
        Self {
            project: Some(project.to_string()),
            profile: Some(profile.to_string()),
            ..Self::default()
        }
    }

    /// Agent profile contributed by plugin `owner` under `base`.
    pub fn plugin_profile(base: Base, owner: &str, profile: &str) -> Self {
        Self {
            profile: Some(profile.to_string()),
            owner: Some((base, owner.to_string())),
            ..Self::default()
        }
    }
}

/// A throwaway application tree.
///
/// # Panics
///
/// Every method panics on I/O failure; this is test-only code.
pub struct PluginTree {
    dir: TempDir,
}

impl Default for PluginTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// Application root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// `<root>/usr`
    pub fn user_dir(&self) -> PathBuf {
        self.root().join("usr")
    }

    fn base(&self, base: Base) -> PathBuf {
        match base {
            Base::Root => self.root().to_path_buf(),
            Base::User => self.user_dir(),
        }
    }

    /// Write `content` to `path` (relative to the root), creating parents.
    pub fn write(&self, path: impl AsRef<Path>, content: &str) -> PathBuf {
        let full = self.root().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&full, content).expect("failed to write fixture file");
        full
    }

    /// Add a plugin with the given `plugin.yaml` content.
    pub fn plugin(&self, base: Base, name: &str, meta_yaml: &str) -> PathBuf {
        let dir = self.base(base).join("plugins").join(name);
        std::fs::create_dir_all(&dir).expect("failed to create plugin dir");
        std::fs::write(dir.join("plugin.yaml"), meta_yaml).expect("failed to write plugin.yaml");
        dir
    }

    /// Plugin that allows project and profile overrides.
    pub fn scoped_plugin(&self, base: Base, name: &str) -> PathBuf {
        self.plugin(
            base,
            name,
            &format!("title: {name}\nper_project_config: true\nper_agent_config: true\n"),
        )
    }

    /// Directory a plugin's overrides live in at `at`.
    pub fn plugin_dir_at(&self, plugin: &str, at: &At) -> PathBuf {
        let mut base = match (&at.project, &at.owner, at.builtin) {
            (Some(project), _, _) => self
                .user_dir()
                .join("projects")
                .join(project)
                .join(".plexus"),
            (None, Some((owner_base, owner)), _) => {
                self.base(*owner_base).join("plugins").join(owner)
            }
            (None, None, true) => self.root().to_path_buf(),
            (None, None, false) => self.user_dir(),
        };
        if let Some(profile) = &at.profile {
            base = base.join("agents").join(profile);
        }
        base.join("plugins").join(plugin)
    }

    /// Write a file for `plugin` at `at`.
    pub fn asset(&self, plugin: &str, at: &At, name: &str, content: &str) -> PathBuf {
        let dir = self.plugin_dir_at(plugin, at);
        std::fs::create_dir_all(&dir).expect("failed to create override dir");
        let path = dir.join(name);
        std::fs::write(&path, content).expect("failed to write asset");
        path
    }

    /// Drop a `.toggle-1` or `.toggle-0` marker for `plugin` at `at`.
    pub fn toggle(&self, plugin: &str, at: &At, enabled: bool) -> PathBuf {
        let name = if enabled { ".toggle-1" } else { ".toggle-0" };
        self.asset(plugin, at, name, "")
    }

    /// Write a `config.json` override for `plugin` at `at`.
    pub fn config(&self, plugin: &str, at: &At, value: &JsonValue) -> PathBuf {
        let body = serde_json::to_string(value).expect("failed to encode config");
        self.asset(plugin, at, "config.json", &body)
    }

    /// Write an extension manifest `<dir>/extensions/<point>/<stem>.toml`,
    /// where `dir` is relative to the root.
    pub fn extension(&self, dir: impl AsRef<Path>, point: &str, stem: &str, manifest: &str) -> PathBuf {
        self.write(
            dir.as_ref().join("extensions").join(point).join(format!("{stem}.toml")),
            manifest,
        )
    }

    /// Manifest body running `core.trace` with a label.
    pub fn trace_manifest(label: &str) -> String {
        format!("implementation = \"core.trace\"\n\n[settings]\nlabel = \"{label}\"\n")
    }
}
