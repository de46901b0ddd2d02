//! Kernel state shared by the binary and embedders.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::agent::Agent;
use crate::cache::CacheLayer;
use crate::config::Config;
use crate::extension::{CallArgs, ExtensionDispatcher, ExtensionRegistry, intercept};
use crate::extension_point;
use crate::kvp::KvpStore;
use crate::plugin::{Layout, LoadedConfig, PluginService, ScopeFilter};

/// Point wrapping [`Kernel::load_config`].
pub const LOAD_CONFIG_POINT: &str = extension_point!("load_config");
/// Point wrapping [`Kernel::save_config`].
pub const SAVE_CONFIG_POINT: &str = extension_point!("save_config");
/// Point wrapping [`Kernel::toggle_plugin`].
pub const TOGGLE_PLUGIN_POINT: &str = extension_point!("toggle_plugin");

/// Process-wide kernel state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone, Debug)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

#[derive(Debug)]
struct KernelInner {
    config: Config,

    /// Plugin lookups; owns the layout and the shared cache.
    plugins: PluginService,

    /// Extension dispatch over the same plugin service.
    dispatcher: ExtensionDispatcher,

    /// Runtime and persistent key/value stores.
    kvp: KvpStore,
}

fn str_arg(call: &CallArgs, index: usize, what: &str) -> Result<String> {
    call.str_arg(index)
        .map(str::to_string)
        .with_context(|| format!("intercepted call lost its {what} argument"))
}

fn str_kwarg(call: &CallArgs, key: &str) -> String {
    call.str_kwarg(key).unwrap_or_default().to_string()
}

impl Kernel {
    /// Build the kernel with the built-in extension implementations.
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, ExtensionRegistry::with_builtins())
    }

    /// Build the kernel with a caller-supplied registry.
    pub fn with_registry(config: Config, registry: ExtensionRegistry) -> Self {
        let layout = Arc::new(config.layout());
        let cache = CacheLayer::new(config.cache_options());
        let plugins = PluginService::new(Arc::clone(&layout), cache);
        let dispatcher = ExtensionDispatcher::new(plugins.clone(), Arc::new(registry));
        let kvp = KvpStore::new(layout.kvp_dir());

        info!(
            root = %layout.root().display(),
            user_dir = %layout.user_dir().display(),
            extensions = dispatcher.registry().len(),
            "kernel initialised"
        );

        Self {
            inner: Arc::new(KernelInner {
                config,
                plugins,
                dispatcher,
                kvp,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn layout(&self) -> &Layout {
        self.inner.plugins.layout()
    }

    pub fn cache(&self) -> &CacheLayer {
        self.inner.plugins.cache()
    }

    pub fn plugins(&self) -> &PluginService {
        &self.inner.plugins
    }

    pub fn dispatcher(&self) -> &ExtensionDispatcher {
        &self.inner.dispatcher
    }

    pub fn kvp(&self) -> &KvpStore {
        &self.inner.kvp
    }

    /// Load a plugin config through [`LOAD_CONFIG_POINT`].
    ///
    /// Arguments: `[plugin]`, kwargs `project` and `profile` (filters, `*`
    /// for any).
    pub async fn load_config(
        &self,
        plugin: &str,
        project: &str,
        profile: &str,
        agent: Option<&Agent>,
    ) -> Result<LoadedConfig> {
        let plugins = self.plugins().clone();
        intercept(
            self.dispatcher(),
            LOAD_CONFIG_POINT,
            agent,
            CallArgs::new()
                .arg(plugin)
                .kwarg("project", project)
                .kwarg("profile", profile),
            |call| async move {
                let plugin = str_arg(&call, 0, "plugin")?;
                let project = ScopeFilter::parse(&str_kwarg(&call, "project"));
                let profile = ScopeFilter::parse(&str_kwarg(&call, "profile"));
                anyhow::Ok(plugins.load_config(&plugin, &project, &profile)?)
            },
        )
        .await
    }

    /// Save a plugin config through [`SAVE_CONFIG_POINT`].
    ///
    /// Arguments: `[plugin, settings]`, kwargs `project` and `profile`.
    pub async fn save_config(
        &self,
        plugin: &str,
        project: &str,
        profile: &str,
        settings: Value,
        agent: Option<&Agent>,
    ) -> Result<PathBuf> {
        let plugins = self.plugins().clone();
        intercept(
            self.dispatcher(),
            SAVE_CONFIG_POINT,
            agent,
            CallArgs::new()
                .arg(plugin)
                .arg(settings)
                .kwarg("project", project)
                .kwarg("profile", profile),
            |call| async move {
                let plugin = str_arg(&call, 0, "plugin")?;
                let settings = call.args.get(1).cloned().unwrap_or(Value::Null);
                anyhow::Ok(plugins.save_config(
                    &plugin,
                    &str_kwarg(&call, "project"),
                    &str_kwarg(&call, "profile"),
                    &settings,
                )?)
            },
        )
        .await
    }

    /// Toggle a plugin through [`TOGGLE_PLUGIN_POINT`].
    ///
    /// Arguments: `[plugin, enabled]`, kwargs `project`, `profile` and
    /// `clear_overrides`.
    pub async fn toggle_plugin(
        &self,
        plugin: &str,
        enabled: bool,
        project: &str,
        profile: &str,
        clear_overrides: bool,
        agent: Option<&Agent>,
    ) -> Result<PathBuf> {
        let plugins = self.plugins().clone();
        intercept(
            self.dispatcher(),
            TOGGLE_PLUGIN_POINT,
            agent,
            CallArgs::new()
                .arg(plugin)
                .arg(enabled)
                .kwarg("project", project)
                .kwarg("profile", profile)
                .kwarg("clear_overrides", clear_overrides),
            |call| async move {
                let plugin = str_arg(&call, 0, "plugin")?;
                let enabled = call.args.get(1).and_then(Value::as_bool).unwrap_or(enabled);
                let clear = call
                    .kwargs
                    .get("clear_overrides")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                anyhow::Ok(plugins.toggle_plugin(
                    &plugin,
                    enabled,
                    &str_kwarg(&call, "project"),
                    &str_kwarg(&call, "profile"),
                    clear,
                )?)
            },
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_config_without_extensions_reads_default() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("plugins/search");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("plugin.yaml"), "title: Search\n").unwrap();
        std::fs::write(dir.join("default_config.yaml"), "limit: 5\n").unwrap();

        let kernel = Kernel::new(Config {
            root: tmp.path().to_path_buf(),
            user_dir: tmp.path().join("usr"),
            ..Config::default()
        });
        let loaded = kernel.load_config("search", "", "", None).await.unwrap();
        assert_eq!(loaded.data, serde_json::json!({"limit": 5}));
        assert_eq!(loaded.path, Some(dir.join("default_config.yaml")));
    }

    #[test]
    fn point_names_are_module_qualified() {
        assert_eq!(LOAD_CONFIG_POINT, "plexus_kernel::state.load_config");
        assert_eq!(TOGGLE_PLUGIN_POINT, "plexus_kernel::state.toggle_plugin");
    }
}
