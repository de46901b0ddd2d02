#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for plugin discovery, asset resolution and config.
//!
//! Every test builds its own application tree in a temporary directory
//! through `plexus_test_utils::PluginTree`.

use std::sync::Arc;

use plexus_kernel::cache::CacheLayer;
use plexus_kernel::plugin::{
    AssetQuery, ConfigKind, Layout, ListFilter, PluginDoc, PluginError, PluginService, Provenance,
    Scope, ScopeFilter,
};
use plexus_test_utils::{At, Base, PluginTree};
use serde_json::json;

fn service(tree: &PluginTree) -> PluginService {
    PluginService::new(Arc::new(Layout::new(tree.root())), CacheLayer::default())
}

fn named(name: &str) -> ScopeFilter {
    ScopeFilter::Named(name.to_string())
}

// =============================================================================
// Discovery
// =============================================================================

#[test]
fn test_discovery_prefers_user_root() {
    let tree = PluginTree::new();
    tree.plugin(Base::Root, "memory", "title: Memory\nversion: 1.0.0\n");
    tree.plugin(Base::User, "memory", "title: My Memory\n");
    tree.plugin(Base::Root, "search", "");

    let service = service(&tree);
    let plugins = service.list_plugins();
    assert_eq!(plugins.len(), 2);

    let memory = service.find_plugin("memory").unwrap();
    assert_eq!(memory.provenance, Provenance::User);
    assert_eq!(memory.display_title(), "My Memory");

    let search = service.find_plugin("search").unwrap();
    assert_eq!(search.display_title(), "search");
    assert!(!search.meta.per_project_config);
    assert!(!search.meta.always_enabled);
}

#[test]
fn test_summaries_filter_by_provenance() {
    let tree = PluginTree::new();
    tree.plugin(Base::Root, "memory", "title: Memory\nsettings_sections: [agent]\n");
    tree.plugin(Base::User, "custom", "title: Custom\n");
    tree.write("plugins/memory/README.md", "# Memory\n");

    let service = service(&tree);
    let custom = service.plugin_summaries(ListFilter {
        custom: true,
        builtin: false,
    });
    assert_eq!(custom.len(), 1);
    assert_eq!(custom[0].name, "custom");

    let builtin = service.plugin_summaries(ListFilter {
        custom: false,
        builtin: true,
    });
    assert_eq!(builtin.len(), 1);
    assert!(builtin[0].has_readme);
    assert!(!builtin[0].has_license);
    assert!(builtin[0].has_config_screen);

    assert_eq!(service.plugin_summaries(ListFilter::default()).len(), 2);
}

#[test]
fn test_read_doc() {
    let tree = PluginTree::new();
    tree.plugin(Base::Root, "memory", "");
    tree.write("plugins/memory/README.md", "# Memory\nRemembers things.\n");

    let service = service(&tree);
    let (path, content) = service.read_doc("memory", PluginDoc::Readme).unwrap();
    assert_eq!(path, tree.root().join("plugins/memory/README.md"));
    assert!(content.contains("Remembers things"));

    assert!(matches!(
        service.read_doc("memory", PluginDoc::License),
        Err(PluginError::MissingDoc { .. })
    ));
    assert!(matches!(
        service.read_doc("nope", PluginDoc::Readme),
        Err(PluginError::NotFound { .. })
    ));
}

// =============================================================================
// Asset resolution
// =============================================================================

fn layered_memory(tree: &PluginTree) {
    tree.scoped_plugin(Base::Root, "memory");
    tree.config("memory", &At::builtin(), &json!({"level": "builtin"}));
    tree.config("memory", &At::user(), &json!({"level": "user"}));
    tree.config("memory", &At::profile("analyst"), &json!({"level": "user_profile"}));
    tree.config("memory", &At::project("acme"), &json!({"level": "project"}));
    tree.config(
        "memory",
        &At::project_profile("acme", "analyst"),
        &json!({"level": "project_profile"}),
    );
}

#[test]
fn test_only_first_returns_most_specific_level() {
    let tree = PluginTree::new();
    layered_memory(&tree);
    let service = service(&tree);

    let query = AssetQuery::new("memory", "config.json")
        .project(named("acme"))
        .profile(named("analyst"));
    let found = service.find_assets(&query);
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].path,
        tree.plugin_dir_at("memory", &At::project_profile("acme", "analyst"))
            .join("config.json")
    );
    assert_eq!(found[0].project.as_deref(), Some("acme"));
    assert_eq!(found[0].profile.as_deref(), Some("analyst"));

    // Dropping the profile falls back to the project level.
    let query = AssetQuery::new("memory", "config.json").project(named("acme"));
    let found = service.find_asset(&query).unwrap();
    assert_eq!(found.profile, None);
    assert_eq!(found.project.as_deref(), Some("acme"));

    // Unscoped lookups only see user and built-in levels.
    let found = service
        .find_asset(&AssetQuery::new("memory", "config.json"))
        .unwrap();
    assert_eq!(found.path, tree.root().join("usr/plugins/memory/config.json"));
    assert!(!found.is_scoped());
}

#[test]
fn test_full_walk_is_ordered_by_precedence() {
    let tree = PluginTree::new();
    layered_memory(&tree);
    let service = service(&tree);

    let query = AssetQuery::new("memory", "config.json")
        .project(named("acme"))
        .profile(named("analyst"))
        .all();
    let found = service.find_assets(&query);
    let dirs: Vec<_> = found
        .iter()
        .map(|m| m.path.parent().unwrap().to_path_buf())
        .collect();
    assert_eq!(
        dirs,
        vec![
            tree.plugin_dir_at("memory", &At::project_profile("acme", "analyst")),
            tree.plugin_dir_at("memory", &At::project("acme")),
            tree.plugin_dir_at("memory", &At::profile("analyst")),
            tree.plugin_dir_at("memory", &At::user()),
            tree.plugin_dir_at("memory", &At::builtin()),
        ]
    );
}

#[test]
fn test_wildcard_scope_inference() {
    let tree = PluginTree::new();
    tree.scoped_plugin(Base::Root, "memory");
    tree.config("memory", &At::project("beta"), &json!({}));
    tree.config("memory", &At::project("acme"), &json!({}));
    tree.config("memory", &At::project_profile("acme", "analyst"), &json!({}));
    tree.config("memory", &At::plugin_profile(Base::Root, "helper", "coder"), &json!({}));
    tree.config("memory", &At::builtin_profile("writer"), &json!({}));

    let service = service(&tree);
    let query = AssetQuery::new("memory", "config.json")
        .project(ScopeFilter::Any)
        .profile(ScopeFilter::Any)
        .all();
    let scopes: Vec<_> = service
        .find_assets(&query)
        .iter()
        .map(|m| (m.project.clone(), m.profile.clone()))
        .collect();

    assert_eq!(
        scopes,
        vec![
            (Some("acme".to_string()), Some("analyst".to_string())),
            (Some("acme".to_string()), None),
            (Some("beta".to_string()), None),
            (None, Some("coder".to_string())),
            (None, Some("writer".to_string())),
        ]
    );
}

#[test]
fn test_scoped_levels_need_plugin_flags() {
    let tree = PluginTree::new();
    tree.plugin(Base::Root, "search", "title: Search\n");
    tree.config("search", &At::project("acme"), &json!({"scoped": true}));

    let service = service(&tree);
    let query = AssetQuery::new("search", "config.json").project(named("acme"));
    assert!(service.find_asset(&query).is_none());
}

#[test]
fn test_results_are_cached_until_invalidated() {
    let tree = PluginTree::new();
    tree.scoped_plugin(Base::Root, "memory");
    let service = service(&tree);

    let query = AssetQuery::new("memory", "config.json");
    assert!(service.find_asset(&query).is_none());

    tree.config("memory", &At::user(), &json!({}));
    assert!(service.find_asset(&query).is_none());

    service.invalidate();
    assert!(service.find_asset(&query).is_some());
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_search_falls_back_to_default_config() {
    let tree = PluginTree::new();
    tree.plugin(Base::Root, "search", "title: Search\n");
    tree.write("plugins/search/default_config.yaml", "provider: local\nlimit: 10\n");
    let service = service(&tree);

    let query = AssetQuery::new("search", "config.json")
        .project(named("acme"))
        .profile(named("analyst"));
    assert!(service.find_asset(&query).is_none());

    let loaded = service
        .load_config("search", &named("acme"), &named("analyst"))
        .unwrap();
    assert_eq!(
        loaded.path,
        Some(tree.root().join("plugins/search/default_config.yaml"))
    );
    assert_eq!(loaded.data, json!({"provider": "local", "limit": 10}));
    assert_eq!(loaded.project, None);

    let scope = Scope::new(Some("acme"), Some("analyst"));
    assert_eq!(
        service.plugin_config("search", &scope).unwrap(),
        Some(json!({"provider": "local", "limit": 10}))
    );
}

#[test]
fn test_config_without_any_file() {
    let tree = PluginTree::new();
    tree.plugin(Base::Root, "bare", "");
    let service = service(&tree);

    assert_eq!(service.plugin_config("bare", &Scope::global()).unwrap(), None);
    let loaded = service
        .load_config("bare", &ScopeFilter::Unset, &ScopeFilter::Unset)
        .unwrap();
    assert_eq!(loaded.path, None);
    assert_eq!(loaded.data, json!({}));
}

#[test]
fn test_save_list_and_delete_configs() {
    let tree = PluginTree::new();
    tree.scoped_plugin(Base::Root, "memory");
    tree.write("plugins/memory/default_config.yaml", "recall: 5\n");
    let service = service(&tree);

    let saved = service
        .save_config("memory", "acme", "", &json!({"recall": 9}))
        .unwrap();
    assert_eq!(
        saved,
        tree.root()
            .join("usr/projects/acme/.plexus/plugins/memory/config.json")
    );

    let scope = Scope::new(Some("acme"), None);
    assert_eq!(
        service.plugin_config("memory", &scope).unwrap(),
        Some(json!({"recall": 9}))
    );
    assert_eq!(
        service.plugin_config("memory", &Scope::global()).unwrap(),
        Some(json!({"recall": 5}))
    );

    service
        .save_config("memory", "", "analyst", &json!({"recall": 1}))
        .unwrap();
    let listed = service.list_configs("memory", ConfigKind::Config).unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|m| m.is_scoped()));

    service.delete_config("memory", &saved).unwrap();
    assert!(!saved.exists());
    assert_eq!(
        service.plugin_config("memory", &scope).unwrap(),
        Some(json!({"recall": 5}))
    );
}

#[test]
fn test_save_config_rejects_bad_input() {
    let tree = PluginTree::new();
    tree.scoped_plugin(Base::Root, "memory");
    let service = service(&tree);

    assert!(matches!(
        service.save_config("memory", "", "", &json!([1, 2])),
        Err(PluginError::InvalidSettings { .. })
    ));
    assert!(matches!(
        service.save_config("memory", "../escape", "", &json!({})),
        Err(PluginError::InvalidName { .. })
    ));
    assert!(matches!(
        service.save_config("ghost", "", "", &json!({})),
        Err(PluginError::NotFound { .. })
    ));
}

#[test]
fn test_delete_config_only_known_files() {
    let tree = PluginTree::new();
    tree.scoped_plugin(Base::Root, "memory");
    let stray = tree.write("usr/notes.json", "{}");
    let marker = tree.toggle("memory", &At::project("acme"), false);
    let service = service(&tree);

    let err = service.delete_config("memory", &stray).unwrap_err();
    assert!(matches!(err, PluginError::NotAConfigFile { .. }));
    assert!(stray.exists());

    service.delete_config("memory", &marker).unwrap();
    assert!(!marker.exists());
}

#[test]
fn test_malformed_override_is_an_error() {
    let tree = PluginTree::new();
    tree.scoped_plugin(Base::Root, "memory");
    tree.asset("memory", &At::user(), "config.json", "{broken");
    let service = service(&tree);

    assert!(matches!(
        service.plugin_config("memory", &Scope::global()),
        Err(PluginError::MalformedConfig { .. })
    ));
}
