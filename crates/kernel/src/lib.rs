//! Plexus Kernel Library
//!
//! Plugin discovery, hierarchical asset resolution, toggle state and
//! extension point dispatch. The command-line entry point is the `plexus`
//! binary.

pub mod agent;
pub mod cache;
pub mod config;
pub mod extension;
pub mod kvp;
pub mod plugin;
pub mod state;

pub use agent::Agent;
pub use config::Config;
pub use state::Kernel;
