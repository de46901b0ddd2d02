//! Plexus command-line administration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use plexus_kernel::config::Config;
use plexus_kernel::plugin::cli;
use plexus_kernel::plugin::{ConfigKind, ListFilter, PluginDoc};
use plexus_kernel::state::Kernel;

#[derive(Parser)]
#[command(name = "plexus", version, about = "Plugin and extension administration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect and manage plugins.
    #[command(subcommand)]
    Plugins(PluginsCommand),
    /// Resolve plugin assets.
    #[command(subcommand)]
    Assets(AssetsCommand),
    /// Inspect extension points.
    #[command(subcommand)]
    Extensions(ExtensionsCommand),
}

/// Project / agent profile selection. Empty means unscoped.
#[derive(Args, Debug, Default)]
struct ScopeArgs {
    /// Project name (`*` for any, where a lookup allows it).
    #[arg(long, default_value = "")]
    project: String,
    /// Agent profile name.
    #[arg(long, default_value = "")]
    profile: String,
}

#[derive(Subcommand)]
enum PluginsCommand {
    /// List discovered plugins.
    List {
        /// Only plugins installed under the user directory.
        #[arg(long)]
        custom: bool,
        /// Only plugins shipped with the application.
        #[arg(long)]
        builtin: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show a plugin's metadata and toggle state.
    Show {
        name: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Enable or disable a plugin.
    Toggle {
        name: String,
        /// `on` or `off`.
        #[arg(value_parser = parse_on_off)]
        state: bool,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Remove project and profile overrides first.
        #[arg(long)]
        clear_overrides: bool,
    },
    /// Print the effective config, or save one with --set.
    Config {
        name: String,
        #[command(flatten)]
        scope: ScopeArgs,
        /// JSON object to save as the config for the scope.
        #[arg(long)]
        set: Option<String>,
    },
    /// List per-scope config or toggle files.
    Configs {
        name: String,
        /// `config` or `toggle`.
        #[arg(long, default_value = "config")]
        kind: ConfigKind,
        #[arg(long)]
        json: bool,
    },
    /// Delete a per-scope config or toggle file.
    DeleteConfig { name: String, path: PathBuf },
    /// Print a plugin's README or LICENSE.
    Doc {
        name: String,
        #[arg(default_value = "readme")]
        doc: PluginDoc,
    },
}

#[derive(Subcommand)]
enum AssetsCommand {
    /// Find an asset across the precedence levels.
    Find {
        plugin: String,
        subpath: String,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Return every match instead of the most specific one.
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ExtensionsCommand {
    /// List the implementations that would run at a point.
    List {
        point: String,
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        json: bool,
    },
    /// List the web UI files plugins contribute to a point.
    Webui {
        point: String,
        /// Glob pattern for file names; repeatable.
        #[arg(long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        json: bool,
    },
}

fn parse_on_off(value: &str) -> Result<bool, String> {
    match value {
        "on" | "enable" | "enabled" => Ok(true),
        "off" | "disable" | "disabled" => Ok(false),
        other => Err(format!("expected 'on' or 'off', got '{other}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(root = %config.root.display(), "configuration loaded");

    let kernel = Kernel::new(config);

    match cli.command {
        Command::Plugins(cmd) => run_plugins(&kernel, cmd).await,
        Command::Assets(AssetsCommand::Find {
            plugin,
            subpath,
            scope,
            all,
            json,
        }) => cli::cmd_asset_find(
            &kernel,
            &plugin,
            &subpath,
            &scope.project,
            &scope.profile,
            all,
            json,
        ),
        Command::Extensions(ExtensionsCommand::List { point, scope, json }) => {
            cli::cmd_extension_list(&kernel, &point, &scope.project, &scope.profile, json)
        }
        Command::Extensions(ExtensionsCommand::Webui {
            point,
            filters,
            json,
        }) => cli::cmd_webui_list(&kernel, &point, &filters, json),
    }
}

async fn run_plugins(kernel: &Kernel, cmd: PluginsCommand) -> Result<()> {
    match cmd {
        PluginsCommand::List {
            custom,
            builtin,
            json,
        } => cli::cmd_plugin_list(kernel, ListFilter { custom, builtin }, json),
        PluginsCommand::Show { name, scope } => {
            cli::cmd_plugin_show(kernel, &name, &scope.project, &scope.profile)
        }
        PluginsCommand::Toggle {
            name,
            state,
            scope,
            clear_overrides,
        } => {
            cli::cmd_plugin_toggle(
                kernel,
                &name,
                state,
                &scope.project,
                &scope.profile,
                clear_overrides,
            )
            .await
        }
        PluginsCommand::Config { name, scope, set } => {
            cli::cmd_plugin_config(kernel, &name, &scope.project, &scope.profile, set.as_deref())
                .await
        }
        PluginsCommand::Configs { name, kind, json } => {
            cli::cmd_plugin_configs(kernel, &name, kind, json)
        }
        PluginsCommand::DeleteConfig { name, path } => {
            cli::cmd_plugin_delete_config(kernel, &name, &path)
        }
        PluginsCommand::Doc { name, doc } => cli::cmd_plugin_doc(kernel, &name, doc),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
