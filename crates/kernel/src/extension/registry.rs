//! Extension registry - maps implementation ids to factories.
//!
//! Manifests on disk only name an implementation; the code behind that name
//! must have been registered here at startup. Ids are conventionally
//! namespaced with a dot (`core.trace`, `memory.recall`).

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use super::Extension;
use super::builtin;
use super::manifest::ManifestEntry;

/// Builds a fresh extension instance for one invocation.
pub type ExtensionFactory = Arc<dyn Fn(&ManifestEntry) -> Result<Box<dyn Extension>> + Send + Sync>;

/// Registry of implementation factories.
#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    factories: BTreeMap<String, ExtensionFactory>,
}

impl ExtensionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the kernel's own implementations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    /// Register (or replace) the factory for `id`.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&ManifestEntry) -> Result<Box<dyn Extension>> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    pub fn get(&self, id: &str) -> Option<&ExtensionFactory> {
        self.factories.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("ids", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
