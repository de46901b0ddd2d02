#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the runtime and persistent key/value stores.

use std::sync::Arc;
use std::thread;

use plexus_kernel::kvp::KvpError;
use plexus_kernel::{Config, Kernel};
use plexus_test_utils::PluginTree;
use serde_json::json;

fn kernel(tree: &PluginTree) -> Kernel {
    Kernel::new(Config {
        root: tree.root().to_path_buf(),
        user_dir: tree.user_dir(),
        ..Config::default()
    })
}

#[test]
fn test_persistent_store_lives_under_user_dir() {
    let tree = PluginTree::new();
    let kernel = kernel(&tree);
    assert_eq!(kernel.kvp().dir(), tree.user_dir().join("kvp"));

    kernel
        .kvp()
        .set_persistent("memory.last_run", &json!({"at": 1700000000}))
        .unwrap();
    assert!(tree.user_dir().join("kvp/memory.last_run.json").is_file());

    // A second kernel over the same tree sees the value.
    let other = self::kernel(&tree);
    assert_eq!(
        other.kvp().get_persistent("memory.last_run").unwrap(),
        Some(json!({"at": 1700000000}))
    );
    assert_eq!(other.kvp().get_runtime("memory.last_run"), None);
}

#[test]
fn test_runtime_values_are_per_kernel() {
    let tree = PluginTree::new();
    let kernel = kernel(&tree);
    kernel.kvp().set_runtime("session.a", json!(1)).unwrap();
    kernel.kvp().set_runtime("session.b", json!(2)).unwrap();
    kernel.kvp().set_runtime("other", json!(3)).unwrap();

    assert_eq!(
        kernel.kvp().find_runtime("session.*").unwrap(),
        vec!["session.a", "session.b"]
    );
    assert_eq!(kernel.kvp().remove_runtime("session.a"), Some(json!(1)));
    assert_eq!(kernel.kvp().find_runtime("session.*").unwrap(), vec!["session.b"]);

    // Clones share the same stores.
    let clone = kernel.clone();
    assert_eq!(clone.kvp().get_runtime("other"), Some(json!(3)));
    assert!(self::kernel(&tree).kvp().get_runtime("other").is_none());
}

#[test]
fn test_overwrite_and_remove_persistent() {
    let tree = PluginTree::new();
    let kernel = kernel(&tree);
    let kvp = kernel.kvp();

    kvp.set_persistent("counter", &json!(1)).unwrap();
    kvp.set_persistent("counter", &json!(2)).unwrap();
    assert_eq!(kvp.get_persistent("counter").unwrap(), Some(json!(2)));
    assert_eq!(kvp.find_persistent("*").unwrap(), vec!["counter"]);

    assert!(kvp.remove_persistent("counter").unwrap());
    assert!(!kvp.remove_persistent("counter").unwrap());
    assert_eq!(kvp.get_persistent("counter").unwrap(), None);
    assert!(kvp.find_persistent("*").unwrap().is_empty());
}

#[test]
fn test_bad_keys_never_touch_disk() {
    let tree = PluginTree::new();
    let kernel = kernel(&tree);
    let kvp = kernel.kvp();

    assert!(matches!(
        kvp.set_persistent("../escape", &json!(1)),
        Err(KvpError::SeparatorInKey(_))
    ));
    assert!(matches!(kvp.get_persistent(""), Err(KvpError::EmptyKey)));
    assert!(matches!(
        kvp.find_persistent("[unclosed"),
        Ok(keys) if keys.is_empty()
    ));
    assert!(!tree.root().join("escape.json").exists());
    assert!(!tree.user_dir().join("kvp").exists());
}

#[test]
fn test_corrupt_entry_is_reported() {
    let tree = PluginTree::new();
    tree.write("usr/kvp/broken.json", "{not json");
    let kernel = kernel(&tree);

    assert!(matches!(
        kernel.kvp().get_persistent("broken"),
        Err(KvpError::Decode { .. })
    ));
    assert_eq!(kernel.kvp().find_persistent("b*").unwrap(), vec!["broken"]);
}

#[test]
fn test_concurrent_persistent_writes() {
    let tree = PluginTree::new();
    let kernel = Arc::new(kernel(&tree));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || {
                for round in 0..10 {
                    kernel
                        .kvp()
                        .set_persistent("shared", &json!({"writer": i, "round": round}))
                        .unwrap();
                    kernel
                        .kvp()
                        .set_persistent(&format!("own.{i}"), &json!(round))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let shared = kernel.kvp().get_persistent("shared").unwrap().unwrap();
    assert_eq!(shared["round"], json!(9));
    assert_eq!(kernel.kvp().find_persistent("own.*").unwrap().len(), 8);
    // No temporary files are left behind.
    assert_eq!(kernel.kvp().find_persistent("*").unwrap().len(), 9);
    let leftovers = std::fs::read_dir(tree.user_dir().join("kvp"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
        .count();
    assert_eq!(leftovers, 0);
}
