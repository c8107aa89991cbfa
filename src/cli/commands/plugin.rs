//! `mine plugin install|remove|list|info` (§4.6's lifecycle operations).

use super::super::args::PluginCommands;
use super::super::run::AppContext;
use anyhow::{anyhow, Context};
use mine_plugin::LifecycleEvent;
use std::collections::BTreeMap;

pub async fn run(ctx: &AppContext, command: PluginCommands) -> anyhow::Result<()> {
    match command {
        PluginCommands::Install { source_dir } => install(ctx, source_dir).await,
        PluginCommands::Remove { name } => remove(ctx, name).await,
        PluginCommands::List => list(ctx).await,
        PluginCommands::Info { name, check } => info(ctx, name, check).await,
    }
}

fn host_env() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

async fn install(ctx: &AppContext, source_dir: std::path::PathBuf) -> anyhow::Result<()> {
    let manifest = mine_manifest::install(
        &source_dir,
        &ctx.config.plugins_root,
        &ctx.config.protocol_version_strs(),
    )
    .await
    .context("plugin install failed")?;

    let entrypoint = ctx
        .config
        .plugins_root
        .join(&manifest.plugin.name)
        .join(manifest.plugin.entrypoint_name());
    let env = mine_sandbox::build_environment(&manifest.permissions, &host_env(), None);
    if let Err(e) = mine_plugin::run_lifecycle(
        &entrypoint,
        &env,
        &manifest.plugin.name,
        LifecycleEvent::Init,
        mine_types::Mode::Notify.default_timeout(),
    )
    .await
    {
        tracing::warn!(plugin = %manifest.plugin.name, %e, "plugin init notification failed (best-effort)");
    }

    println!("Installed {} v{}", manifest.plugin.name, manifest.plugin.version);
    Ok(())
}

async fn remove(ctx: &AppContext, name: String) -> anyhow::Result<()> {
    if let Some(entry) = mine_manifest::info(&name, &ctx.config.plugins_root).await? {
        let entrypoint = ctx.config.plugins_root.join(&name).join(&entry.entrypoint);
        if let Err(e) = mine_plugin::run_lifecycle(
            &entrypoint,
            &host_env(),
            &name,
            LifecycleEvent::Shutdown,
            mine_types::Mode::Notify.default_timeout(),
        )
        .await
        {
            tracing::warn!(plugin = %name, %e, "plugin shutdown notification failed (best-effort)");
        }
    }

    mine_manifest::remove(&name, &ctx.config.plugins_root).await?;
    println!("Removed {name}");
    Ok(())
}

async fn list(ctx: &AppContext) -> anyhow::Result<()> {
    let entries = mine_manifest::list(&ctx.config.plugins_root).await?;
    if entries.is_empty() {
        println!("No plugins installed.");
        return Ok(());
    }
    for entry in entries {
        println!("{:<20} v{:<10} {}", entry.name, entry.version, entry.description);
    }
    Ok(())
}

async fn info(ctx: &AppContext, name: String, check: bool) -> anyhow::Result<()> {
    let entry = mine_manifest::info(&name, &ctx.config.plugins_root)
        .await?
        .ok_or_else(|| anyhow!("no plugin named '{name}' is installed"))?;

    println!("name:        {}", entry.name);
    println!("version:     {}", entry.version);
    println!("description: {}", entry.description);
    println!("entrypoint:  {}", entry.entrypoint);

    if check {
        let entrypoint = ctx.config.plugins_root.join(&name).join(&entry.entrypoint);
        let status = mine_plugin::run_lifecycle(
            &entrypoint,
            &host_env(),
            &name,
            LifecycleEvent::Health,
            mine_types::Mode::Transform.default_timeout(),
        )
        .await
        .context("health check failed")?;
        match status {
            mine_plugin::LifecycleStatus::Ok => println!("health:      ok"),
            mine_plugin::LifecycleStatus::Error(msg) => println!("health:      error: {msg}"),
        }
    }
    Ok(())
}
