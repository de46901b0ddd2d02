//! Implementations shipped with the kernel.
//!
//! - `core.trace`: append a label to the `trace` list in the point data.
//! - `core.set_value`: store a fixed value under a key in the point data.
//! - `core.set_result`: short-circuit an intercepted call with a fixed result.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::manifest::ManifestEntry;
use super::registry::ExtensionRegistry;
use super::{Extension, ExtensionData};
use crate::agent::Agent;

/// Key `core.trace` appends to.
pub const TRACE_KEY: &str = "trace";

pub(super) fn register(registry: &mut ExtensionRegistry) {
    registry.register("core.trace", |entry| Ok(Box::new(Trace::from_entry(entry))));
    registry.register("core.set_value", |entry| Ok(Box::new(SetValue::from_entry(entry)?)));
    registry.register("core.set_result", |entry| Ok(Box::new(SetResult::from_entry(entry))));
}

fn setting_str<'a>(entry: &'a ManifestEntry, key: &str) -> Option<&'a str> {
    entry.manifest.settings.get(key).and_then(Value::as_str)
}

/// Records that it ran, under `settings.label` or the manifest stem.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    label: String,
}

impl Trace {
    fn from_entry(entry: &ManifestEntry) -> Self {
        Self {
            label: setting_str(entry, "label").unwrap_or(&entry.stem).to_string(),
        }
    }
}

#[async_trait]
impl Extension for Trace {
    async fn execute(&self, agent: Option<&Agent>, data: &mut ExtensionData) -> Result<()> {
        debug!(label = %self.label, agent = agent.map(|a| a.name.as_str()), "trace extension");
        let entry = data
            .values
            .entry(TRACE_KEY)
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(Value::String(self.label.clone())),
            other => *other = Value::Array(vec![Value::String(self.label.clone())]),
        }
        Ok(())
    }
}

/// Writes `settings.value` under `settings.key`.
#[derive(Debug, Clone, Default)]
pub struct SetValue {
    key: String,
    value: Value,
}

impl SetValue {
    fn from_entry(entry: &ManifestEntry) -> Result<Self> {
        let Some(key) = setting_str(entry, "key") else {
            bail!(
                "extension {} ({}) needs a string `key` setting",
                entry.stem,
                entry.path.display()
            );
        };
        Ok(Self {
            key: key.to_string(),
            value: entry.manifest.settings.get("value").cloned().unwrap_or(Value::Null),
        })
    }
}

#[async_trait]
impl Extension for SetValue {
    async fn execute(&self, _agent: Option<&Agent>, data: &mut ExtensionData) -> Result<()> {
        data.insert(self.key.clone(), self.value.clone());
        Ok(())
    }
}

/// Sets the exchange result to `settings.value`.
#[derive(Debug, Clone, Default)]
pub struct SetResult {
    value: Value,
}

impl SetResult {
    fn from_entry(entry: &ManifestEntry) -> Self {
        Self {
            value: entry.manifest.settings.get("value").cloned().unwrap_or(Value::Null),
        }
    }
}

#[async_trait]
impl Extension for SetResult {
    async fn execute(&self, _agent: Option<&Agent>, data: &mut ExtensionData) -> Result<()> {
        let Some(exchange) = data.exchange_mut() else {
            bail!("core.set_result only applies to intercepted calls");
        };
        exchange.result.set(self.value.clone());
        Ok(())
    }
}
