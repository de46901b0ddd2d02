//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::cache::{CacheOptions, DEFAULT_MAX_ENTRIES};
use crate::plugin::Layout;

/// Kernel configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Application root holding built-in plugins, agents and extensions
    /// (default: current directory).
    pub root: PathBuf,

    /// User directory (default: `<root>/usr`).
    pub user_dir: PathBuf,

    /// Whether the cache is on (`PLEXUS_CACHE=on|off`, default: on).
    pub cache_enabled: bool,

    /// Cache areas that start disabled (comma-separated).
    pub cache_disabled_areas: Vec<String>,

    /// Maximum entries per cache area (default: 10000).
    pub cache_max_entries: u64,

    /// Optional time-to-live for cache entries, in seconds.
    pub cache_ttl: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        let root = PathBuf::from(".");
        Self {
            user_dir: Layout::new(&root).user_dir().to_path_buf(),
            root,
            cache_enabled: true,
            cache_disabled_areas: Vec::new(),
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            cache_ttl: None,
        }
    }
}

fn parse_switch(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        other => bail!("{name} must be 'on' or 'off', got '{other}'"),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let root = env::var("PLEXUS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let user_dir = env::var("PLEXUS_USER_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Layout::new(&root).user_dir().to_path_buf());

        let cache_enabled = match env::var("PLEXUS_CACHE") {
            Ok(v) => parse_switch("PLEXUS_CACHE", &v)?,
            Err(_) => true,
        };

        let cache_disabled_areas = env::var("PLEXUS_CACHE_DISABLED_AREAS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cache_max_entries = env::var("PLEXUS_CACHE_MAX_ENTRIES")
            .unwrap_or_else(|_| DEFAULT_MAX_ENTRIES.to_string())
            .parse()
            .context("PLEXUS_CACHE_MAX_ENTRIES must be a valid u64")?;

        let cache_ttl = env::var("PLEXUS_CACHE_TTL_SECS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("PLEXUS_CACHE_TTL_SECS must be a whole number of seconds")?
            .map(Duration::from_secs);

        Ok(Self {
            root,
            user_dir,
            cache_enabled,
            cache_disabled_areas,
            cache_max_entries,
            cache_ttl,
        })
    }

    /// Directory layout described by this config.
    pub fn layout(&self) -> Layout {
        Layout::with_user_dir(&self.root, &self.user_dir)
    }

    /// Options for the process-wide cache.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            enabled: self.cache_enabled,
            disabled_areas: self.cache_disabled_areas.clone(),
            max_entries: self.cache_max_entries,
            ttl: self.cache_ttl,
        }
    }
}
