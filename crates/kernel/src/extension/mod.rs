//! Extension points.
//!
//! An extension point is a named place in the code where extensions run.
//! Implementations are declared by manifest files in `extensions/<point>/`
//! folders (built-in, user, agent profile, project, or inside an enabled
//! plugin) and backed by factories registered in an [`ExtensionRegistry`].

pub mod builtin;
mod dispatcher;
mod exchange;
mod intercept;
mod manifest;
mod registry;

use anyhow::Result;
use async_trait::async_trait;

use crate::agent::Agent;

pub use dispatcher::{
    CACHE_AREA_EXTENSION_DIRS, ExtensionDispatcher, ResolvedExtension, validate_point,
};
pub use exchange::{CallArgs, ExchangeRecord, ExtensionData, Slot};
pub use intercept::{END_SUFFIX, START_SUFFIX, intercept, intercept_blocking};
pub use manifest::{ExtensionManifest, MANIFEST_EXTENSION, ManifestEntry, scan_dir};
pub use registry::{ExtensionFactory, ExtensionRegistry};

/// Code that runs at an extension point.
///
/// A fresh instance is built from its manifest for every invocation.
#[async_trait]
pub trait Extension: Send + Sync {
    async fn execute(&self, agent: Option<&Agent>, data: &mut ExtensionData) -> Result<()>;
}
