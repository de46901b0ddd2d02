//! CLI command implementations for plugin and extension administration.
//!
//! These commands work directly on the directory tree; nothing is kept
//! running between invocations.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use super::{
    AssetQuery, ConfigKind, ListFilter, PluginDoc, Scope, ScopeFilter, explain_fold,
};
use crate::agent::Agent;
use crate::state::Kernel;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{text}");
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn scope_label(project: Option<&str>, profile: Option<&str>) -> String {
    match (project, profile) {
        (None, None) => "global".to_string(),
        (Some(p), None) => format!("project {p}"),
        (None, Some(a)) => format!("profile {a}"),
        (Some(p), Some(a)) => format!("project {p} / profile {a}"),
    }
}

/// Agent standing in for the scope given on the command line.
fn scoped_agent(project: &str, profile: &str) -> Option<Agent> {
    if project.is_empty() && profile.is_empty() {
        return None;
    }
    Some(Agent::new("cli").with_scope(Some(project), Some(profile)))
}

/// List all discovered plugins and their toggle state.
pub fn cmd_plugin_list(kernel: &Kernel, filter: ListFilter, json: bool) -> Result<()> {
    let summaries = kernel.plugins().plugin_summaries(filter);
    if json {
        return print_json(&summaries);
    }

    if summaries.is_empty() {
        println!("No plugins found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:<10} {:<9} {:<8} {:<8}",
        "PLUGIN", "VERSION", "STATE", "SOURCE", "PROJECT", "PROFILE"
    );
    println!("{}", "-".repeat(70));

    for s in &summaries {
        let source = match s.provenance {
            super::Provenance::Builtin => "builtin",
            super::Provenance::User => "user",
        };
        println!(
            "{:<20} {:<10} {:<10} {:<9} {:<8} {}",
            s.name,
            if s.version.is_empty() { "-" } else { s.version.as_str() },
            s.toggle_state,
            source,
            yes_no(s.per_project_config),
            yes_no(s.per_agent_config)
        );
    }

    Ok(())
}

/// Show one plugin: metadata, toggle fold for a scope, and per-scope files.
pub fn cmd_plugin_show(kernel: &Kernel, name: &str, project: &str, profile: &str) -> Result<()> {
    let plugins = kernel.plugins();
    let descriptor = plugins.require_plugin(name)?;
    let scope = Scope::new(Some(project), Some(profile));

    println!("Plugin:      {}", descriptor.name);
    println!("Title:       {}", descriptor.display_title());
    if !descriptor.meta.description.is_empty() {
        println!("Description: {}", descriptor.meta.description);
    }
    if !descriptor.meta.version.is_empty() {
        println!("Version:     {}", descriptor.meta.version);
    }
    println!("Path:        {}", descriptor.path.display());
    println!(
        "Overrides:   project={} profile={} always_enabled={}",
        yes_no(descriptor.meta.per_project_config),
        yes_no(descriptor.meta.per_agent_config),
        yes_no(descriptor.meta.always_enabled)
    );
    println!("State:       {}", plugins.toggle_state(name));
    println!(
        "Enabled:     {} ({})",
        yes_no(plugins.is_enabled(name, &scope)),
        scope_label(scope.project.as_deref(), scope.profile.as_deref())
    );

    let fold = explain_fold(plugins, name, &scope)?;
    if !fold.is_empty() {
        println!();
        println!("Toggle markers (least specific first):");
        for (path, markers) in fold {
            let label = if markers.enabled { "enable " } else { "disable" };
            println!("  {label} {}", path.display());
        }
    }

    let configs = plugins.list_configs(name, ConfigKind::Config)?;
    if !configs.is_empty() {
        println!();
        println!("Config overrides:");
        for m in configs.iter() {
            println!(
                "  {:<28} {}",
                scope_label(m.project.as_deref(), m.profile.as_deref()),
                m.path.display()
            );
        }
    }

    Ok(())
}

/// Enable or disable a plugin at a scope.
pub async fn cmd_plugin_toggle(
    kernel: &Kernel,
    name: &str,
    enabled: bool,
    project: &str,
    profile: &str,
    clear_overrides: bool,
) -> Result<()> {
    let agent = scoped_agent(project, profile);
    let marker = kernel
        .toggle_plugin(name, enabled, project, profile, clear_overrides, agent.as_ref())
        .await?;

    println!(
        "Plugin '{name}' {} ({}).",
        if enabled { "enabled" } else { "disabled" },
        scope_label(
            Some(project).filter(|p| !p.is_empty()),
            Some(profile).filter(|p| !p.is_empty())
        )
    );
    println!("  marker: {}", marker.display());
    println!("  state:  {}", kernel.plugins().toggle_state(name));
    Ok(())
}

/// Print the effective config, or save a new one when `set` is given.
pub async fn cmd_plugin_config(
    kernel: &Kernel,
    name: &str,
    project: &str,
    profile: &str,
    set: Option<&str>,
) -> Result<()> {
    let agent = scoped_agent(project, profile);

    if let Some(raw) = set {
        let settings: Value = serde_json::from_str(raw).context("--set must be a JSON object")?;
        let path = kernel
            .save_config(name, project, profile, settings, agent.as_ref())
            .await?;
        println!("Saved config for '{name}' to {}", path.display());
        return Ok(());
    }

    let loaded = kernel.load_config(name, project, profile, agent.as_ref()).await?;
    print_json(&loaded)
}

/// List per-scope config or toggle files of a plugin.
pub fn cmd_plugin_configs(kernel: &Kernel, name: &str, kind: ConfigKind, json: bool) -> Result<()> {
    let found = kernel.plugins().list_configs(name, kind)?;
    if json {
        return print_json(&found);
    }

    if found.is_empty() {
        println!("No files found for '{name}'.");
        return Ok(());
    }

    println!("{:<16} {:<16} PATH", "PROJECT", "PROFILE");
    println!("{}", "-".repeat(70));
    for m in &found {
        println!(
            "{:<16} {:<16} {}",
            m.project.as_deref().unwrap_or("-"),
            m.profile.as_deref().unwrap_or("-"),
            m.path.display()
        );
    }
    Ok(())
}

/// Delete one config or toggle file of a plugin.
pub fn cmd_plugin_delete_config(kernel: &Kernel, name: &str, path: &Path) -> Result<()> {
    kernel.plugins().delete_config(name, path)?;
    println!("Deleted {}", path.display());
    Ok(())
}

/// Print a plugin's README or LICENSE.
pub fn cmd_plugin_doc(kernel: &Kernel, name: &str, doc: PluginDoc) -> Result<()> {
    let (_, content) = kernel.plugins().read_doc(name, doc)?;
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Resolve a plugin asset and print the match(es).
pub fn cmd_asset_find(
    kernel: &Kernel,
    plugin: &str,
    subpath: &str,
    project: &str,
    profile: &str,
    all: bool,
    json: bool,
) -> Result<()> {
    let mut query = AssetQuery::new(plugin, subpath)
        .project(ScopeFilter::parse(project))
        .profile(ScopeFilter::parse(profile));
    if all {
        query = query.all();
    }

    let found = kernel.plugins().find_assets(&query);
    if json {
        return print_json(found.as_slice());
    }

    if found.is_empty() {
        println!("No match for '{subpath}' in plugin '{plugin}'.");
        return Ok(());
    }
    for m in found.iter() {
        println!(
            "{}  [{}]",
            m.path.display(),
            scope_label(m.project.as_deref(), m.profile.as_deref())
        );
    }
    Ok(())
}

/// List the implementations that would run at an extension point.
pub fn cmd_extension_list(
    kernel: &Kernel,
    point: &str,
    project: &str,
    profile: &str,
    json: bool,
) -> Result<()> {
    let agent = scoped_agent(project, profile);
    let found = kernel
        .dispatcher()
        .list_implementations(point, agent.as_ref())?;
    if json {
        return print_json(&found);
    }

    if found.is_empty() {
        println!("No extensions at '{point}'.");
        return Ok(());
    }

    println!("{:<24} {:<20} {:<11} PATH", "EXTENSION", "IMPLEMENTATION", "REGISTERED");
    println!("{}", "-".repeat(80));
    for ext in &found {
        println!(
            "{:<24} {:<20} {:<11} {}",
            ext.stem,
            ext.implementation,
            yes_no(ext.registered),
            ext.path.display()
        );
    }
    Ok(())
}

/// List the web UI files plugins contribute to a point.
pub fn cmd_webui_list(kernel: &Kernel, point: &str, filters: &[String], json: bool) -> Result<()> {
    let filters: Vec<&str> = filters.iter().map(String::as_str).collect();
    let found = kernel.plugins().webui_extensions(point, &filters)?;
    if json {
        return print_json(&found);
    }

    if found.is_empty() {
        println!("No web UI extensions at '{point}'.");
        return Ok(());
    }

    println!("{:<24} PATH", "PLUGIN");
    println!("{}", "-".repeat(60));
    for ext in &found {
        println!("{:<24} {}", ext.plugin, ext.path.display());
    }
    Ok(())
}
