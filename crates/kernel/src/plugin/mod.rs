//! Plugin system for Plexus.
//!
//! This module handles:
//! - Discovering plugins from the built-in and user plugin roots
//! - Resolving plugin assets across project, agent profile, user and
//!   built-in precedence levels
//! - Folding toggle markers into an enabled/disabled/advanced state
//! - Reading and writing per-scope plugin configuration

mod catalog;
pub mod cli;
mod discovery;
mod error;
mod info_parser;
mod layout;
mod resolver;
mod service;
mod settings;
mod toggle;

pub use catalog::{
    CatalogLevel, LevelHit, LevelKind, PathCatalog, SCOPE_WILDCARD, Scope, ScopeFilter,
    infer_scope,
};
pub use discovery::{
    ListFilter, PluginDescriptor, PluginDoc, PluginSummary, Provenance, discover_plugins,
};
pub use error::{PluginError, validate_name, validate_plugin_name};
pub use info_parser::PluginMeta;
pub use layout::{
    AGENTS_DIR, CONFIG_DEFAULT_FILE_NAME, CONFIG_FILE_NAME, EXTENSIONS_DIR, Layout,
    META_FILE_NAME, PLUGINS_DIR, PROJECT_META_DIR, PROJECTS_DIR, TOGGLE_DISABLED_FILE_NAME,
    TOGGLE_ENABLED_FILE_NAME, USER_DIR,
};
pub use resolver::{AssetMatch, AssetQuery};
pub use service::{CACHE_AREA_ASSETS, CACHE_AREA_PLUGINS, CACHE_AREA_TOGGLES, PluginService};
pub use settings::{ConfigKind, LoadedConfig, load_structured};
pub use toggle::{
    LevelMarkers, ToggleState, WEBUI_DIR, WebuiExtension, explain_fold, fold_markers,
};
