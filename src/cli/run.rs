//! CLI entry point and dispatch logic.
//!
//! `run()` parses arguments, resolves configuration, builds the registry and
//! pipeline (populating the registry from discovered user hooks and
//! installed plugins at startup), and dispatches to a command handler. It
//! owns all error output: `main.rs` only maps the returned `ExitCode` to a
//! process exit.

use clap::Parser;
use mine_config::CliOverrides;
use mine_pipeline::Pipeline;
use mine_registry::Registry;
use mine_sandbox::HostDirs;
use mine_types::ExitCode;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::args::{Cli, Commands};
use super::commands;

/// Shared context every command handler needs: the resolved config and the
/// pipeline (and, through it, the registry discovery populated at startup).
pub struct AppContext {
    pub config: mine_config::Config,
    pub pipeline: Pipeline,
}

/// Run the CLI. Prints all output (including error messages) itself; the
/// caller only needs to map the returned [`ExitCode`] to a process exit.
///
/// # Errors
/// Returns the [`ExitCode`] the process should exit with when any stage of
/// configuration loading, discovery, or command dispatch fails.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = mine_utils::logging::init_tracing(cli.verbose) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(mine_utils::paths::config_file);
    let overrides = CliOverrides {
        hooks_dir: cli.hooks_dir.clone(),
        plugins_root: cli.plugins_root.clone(),
        verbose: cli.verbose.then_some(true),
    };
    let config = mine_config::load(&config_path, overrides).map_err(|e| {
        eprintln!("error: failed to load configuration: {e}");
        ExitCode::PIPELINE_FAILURE
    })?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        eprintln!("error: failed to start async runtime: {e}");
        ExitCode::PIPELINE_FAILURE
    })?;

    let result = rt.block_on(dispatch(cli.command, config));
    rt.shutdown_timeout(mine_pipeline::NOTIFY_GRACE_PERIOD);
    result
}

/// Read every installed plugin's manifest from the catalog and project its
/// declared hooks into `registry`, sandboxed per its own permissions (§4.6
/// step 5, run again at each process start per §5's "mutators: discovery,
/// plugin install/remove; the core does not watch directories").
async fn load_plugin_hooks(registry: &Registry, config: &mine_config::Config) -> anyhow::Result<()> {
    let host_env: BTreeMap<String, String> = std::env::vars().collect();
    let host_dirs = HostDirs {
        config_dir: &config.hooks_dir.parent().map_or_else(
            || mine_utils::paths::config_dir().display().to_string(),
            |p| p.display().to_string(),
        ),
        data_dir: &config.plugins_root.parent().map_or_else(
            || mine_utils::paths::data_dir().display().to_string(),
            |p| p.display().to_string(),
        ),
    };

    for entry in mine_manifest::list(&config.plugins_root).await? {
        let plugin_dir = config.plugins_root.join(&entry.name);
        let manifest_text = match tokio::fs::read_to_string(plugin_dir.join("mine-plugin.toml")).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(plugin = %entry.name, %e, "skipping plugin with unreadable manifest");
                continue;
            }
        };
        let manifest = match mine_manifest::Manifest::parse(&manifest_text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(plugin = %entry.name, %e, "skipping plugin with unparseable manifest");
                continue;
            }
        };
        let entrypoint = plugin_dir.join(&entry.entrypoint);
        mine_plugin::register_plugin_hooks(registry, &manifest, &entrypoint, &host_env, Some(&host_dirs))
            .await?;
    }
    Ok(())
}

async fn dispatch(command: Commands, config: mine_config::Config) -> Result<(), ExitCode> {
    let registry = Arc::new(Registry::new());

    let discovered = mine_discovery::discover(&config.hooks_dir).await.map_err(|e| {
        eprintln!("error: failed to read hooks directory: {e}");
        ExitCode::PIPELINE_FAILURE
    })?;
    if let Err(e) = mine_discovery::register_discovered(&registry, discovered).await {
        eprintln!("error: {e}");
        return Err(ExitCode::REGISTRATION_FAILURE);
    }
    if let Err(e) = load_plugin_hooks(&registry, &config).await {
        eprintln!("error: failed to load installed plugins: {e}");
        return Err(ExitCode::PIPELINE_FAILURE);
    }

    let ctx = AppContext {
        pipeline: Pipeline::new(Arc::clone(&registry)),
        config,
    };

    match command {
        Commands::Hook { command } => commands::hook::run(&ctx, command).await.map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::REGISTRATION_FAILURE
        }),
        Commands::Plugin { command } => commands::plugin::run(&ctx, command).await.map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::REGISTRATION_FAILURE
        }),
        Commands::Version => commands::demo::version(&ctx).await.map_err(pipeline_error),
        Commands::Echo { message } => commands::demo::echo(&ctx, message).await.map_err(pipeline_error),
        Commands::Todo { command } => commands::demo::todo(&ctx, command).await.map_err(pipeline_error),
    }
}

fn pipeline_error(e: mine_types::MineError) -> ExitCode {
    eprintln!("error: {}", e.display_for_user());
    e.to_exit_code()
}

/// Shared helper: pretty-print the result a command wrapped by the pipeline
/// produced.
pub(crate) fn print_result(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}
