//! Extension manifests: `extensions/<point>/<stem>.toml`.
//!
//! ```toml
//! implementation = "core.trace"
//! description = "Record that the point fired"
//!
//! [settings]
//! label = "memory"
//! ```
//!
//! The file stem is the override identity: a manifest with the same stem in
//! a more specific directory replaces this one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// File extension of manifests.
pub const MANIFEST_EXTENSION: &str = "toml";

/// Contents of one manifest file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionManifest {
    /// Registry id of the implementation to instantiate.
    pub implementation: String,

    #[serde(default)]
    pub description: String,

    /// Opaque settings handed to the factory.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl ExtensionManifest {
    pub fn parse_str(content: &str, path: &Path) -> Result<Self> {
        let manifest: ExtensionManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse extension manifest {}", path.display()))?;
        if manifest.implementation.trim().is_empty() {
            anyhow::bail!("extension manifest {} has an empty implementation", path.display());
        }
        Ok(manifest)
    }

    pub fn parse(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read extension manifest {}", path.display()))?;
        Self::parse_str(&content, path)
    }
}

/// A manifest found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// File stem; the identity used for overrides and ordering.
    pub stem: String,
    pub path: PathBuf,
    pub manifest: ExtensionManifest,
}

/// Parse every manifest directly inside `dir`, sorted by stem.
///
/// Unreadable or malformed manifests are logged and left out.
pub fn scan_dir(dir: &Path) -> Vec<ManifestEntry> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "extension directory not readable");
            return Vec::new();
        }
    };

    let mut found: Vec<ManifestEntry> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(MANIFEST_EXTENSION))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_string_lossy().into_owned();
            match ExtensionManifest::parse(&path) {
                Ok(manifest) => Some(ManifestEntry {
                    stem,
                    path,
                    manifest,
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping extension manifest");
                    None
                }
            }
        })
        .collect();

    found.sort_by(|a, b| a.stem.cmp(&b.stem));
    found
}
