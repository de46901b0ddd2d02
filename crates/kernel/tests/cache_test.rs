#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the cache layer as the kernel uses it.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use plexus_kernel::cache::{CacheLayer, CacheOptions};
use plexus_kernel::extension::CACHE_AREA_EXTENSION_DIRS;
use plexus_kernel::plugin::{AssetQuery, Scope};
use plexus_kernel::{Config, Kernel};
use plexus_test_utils::{At, Base, PluginTree};
use serde_json::json;

fn kernel(tree: &PluginTree, config: Config) -> Kernel {
    Kernel::new(Config {
        root: tree.root().to_path_buf(),
        user_dir: tree.user_dir(),
        ..config
    })
}

#[test]
fn test_clones_share_storage_across_threads() {
    let cache = CacheLayer::default();
    let handles: Vec<_> = (0..4u32)
        .map(|i| {
            let cache = cache.clone();
            thread::spawn(move || {
                for k in 0..25u32 {
                    cache.add("numbers", &format!("{i}-{k}"), i * 100 + k);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.get::<u32>("numbers", "3-24"), Some(324));
    assert_eq!(cache.stats().entry_count, 100);
}

#[test]
fn test_ttl_expires_entries() {
    let cache = CacheLayer::new(CacheOptions {
        ttl: Some(Duration::from_millis(50)),
        ..CacheOptions::default()
    });
    cache.add("a", "k", Arc::new("value".to_string()));
    assert!(cache.get::<Arc<String>>("a", "k").is_some());

    thread::sleep(Duration::from_millis(150));
    assert!(cache.get::<Arc<String>>("a", "k").is_none());
}

#[test]
fn test_disabled_cache_always_reads_disk() {
    let tree = PluginTree::new();
    tree.scoped_plugin(Base::Root, "memory");
    let kernel = kernel(
        &tree,
        Config {
            cache_enabled: false,
            ..Config::default()
        },
    );
    let plugins = kernel.plugins();
    let query = AssetQuery::new("memory", "config.json");

    assert!(plugins.find_asset(&query).is_none());
    tree.config("memory", &At::user(), &json!({}));
    assert!(plugins.find_asset(&query).is_some());

    tree.toggle("memory", &At::user(), false);
    assert!(!plugins.is_enabled("memory", &Scope::global()));
    assert_eq!(kernel.cache().stats().areas, 0);
}

#[test]
fn test_disabled_area_from_config() {
    let tree = PluginTree::new();
    tree.extension("", "agent_init", "a", &PluginTree::trace_manifest("a"));
    let kernel = kernel(
        &tree,
        Config {
            cache_disabled_areas: vec![CACHE_AREA_EXTENSION_DIRS.to_string()],
            ..Config::default()
        },
    );
    let dispatcher = kernel.dispatcher();

    assert_eq!(dispatcher.list_implementations("agent_init", None).unwrap().len(), 1);
    tree.extension("", "agent_init", "b", &PluginTree::trace_manifest("b"));
    assert_eq!(dispatcher.list_implementations("agent_init", None).unwrap().len(), 2);
}

#[test]
fn test_clearing_one_area_keeps_the_rest() {
    let tree = PluginTree::new();
    tree.scoped_plugin(Base::Root, "memory");
    let kernel = kernel(&tree, Config::default());
    let plugins = kernel.plugins();
    let query = AssetQuery::new("memory", "config.json");

    assert!(plugins.find_asset(&query).is_none());
    tree.config("memory", &At::user(), &json!({}));
    tree.write("usr/plugins/extra/plugin.yaml", "title: Extra\n");

    kernel.cache().clear("plugin_assets");
    assert!(plugins.find_asset(&query).is_some());
    // Discovery is still served from the cache.
    assert!(plugins.find_plugin("extra").is_none());

    kernel.cache().clear("plugin_*");
    assert!(plugins.find_plugin("extra").is_some());
}
