//! Minimal agent handle threaded through extension points.
//!
//! The kernel only needs to know which project and agent profile an agent
//! runs under; everything else is free-form data extensions may share.

use dashmap::DashMap;
use serde_json::Value;

use crate::plugin::Scope;

/// An agent as seen by extensions.
#[derive(Debug, Default)]
pub struct Agent {
    pub name: String,
    pub scope: Scope,
    data: DashMap<String, Value>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Run under a project and/or agent profile. Empty strings mean unset.
    pub fn with_scope(mut self, project: Option<&str>, profile: Option<&str>) -> Self {
        self.scope = Scope::new(project, profile);
        self
    }

    pub fn project(&self) -> Option<&str> {
        self.scope.project.as_deref()
    }

    pub fn profile(&self) -> Option<&str> {
        self.scope.profile.as_deref()
    }

    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|v| v.value().clone())
    }

    pub fn set_data(&self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }
}
