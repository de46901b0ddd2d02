//! Parser for plugin `plugin.yaml` metadata files.
//!
//! Every field is optional. A plugin directory without the file is not a
//! plugin; a file that fails to parse makes discovery skip that plugin.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Plugin metadata parsed from `plugin.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMeta {
    /// Human-readable title. Falls back to the plugin name for display.
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub version: String,

    /// Settings sections the plugin contributes a config screen to.
    #[serde(default)]
    pub settings_sections: Vec<String>,

    /// Config and toggles may be overridden per project.
    #[serde(default)]
    pub per_project_config: bool,

    /// Config and toggles may be overridden per agent profile.
    #[serde(default)]
    pub per_agent_config: bool,

    /// Plugin cannot be switched off.
    #[serde(default)]
    pub always_enabled: bool,
}

impl PluginMeta {
    /// Parse a metadata file from the given path.
    pub fn parse(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read plugin metadata: {}", path.display()))?;

        Self::parse_str(&content, path)
    }

    /// Parse metadata from a YAML string.
    pub fn parse_str(content: &str, path: &Path) -> Result<Self> {
        // An empty document is valid and means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let meta: PluginMeta = serde_yml::from_str(content)
            .with_context(|| format!("failed to parse plugin metadata YAML at {}", path.display()))?;

        meta.validate(path)?;
        Ok(meta)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        for section in &self.settings_sections {
            if section.trim().is_empty() {
                anyhow::bail!(
                    "plugin metadata at {} lists an empty settings section",
                    path.display()
                );
            }
        }
        Ok(())
    }

    /// Whether the plugin contributes a settings screen.
    pub fn has_config_screen(&self) -> bool {
        !self.settings_sections.is_empty()
    }
}
