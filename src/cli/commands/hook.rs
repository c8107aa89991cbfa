//! `mine hook list|create|test` (§4.5's auxiliary operations).

use super::super::args::HookCommands;
use super::super::run::AppContext;
use anyhow::{anyhow, Context};
use mine_types::Stage;

pub async fn run(ctx: &AppContext, command: HookCommands) -> anyhow::Result<()> {
    match command {
        HookCommands::List => list(ctx).await,
        HookCommands::Create { pattern, stage, ext } => create(ctx, pattern, stage, ext).await,
        HookCommands::Test { filename } => test(ctx, filename).await,
    }
}

async fn list(ctx: &AppContext) -> anyhow::Result<()> {
    let hooks = mine_discovery::discover(&ctx.config.hooks_dir).await?;
    if hooks.is_empty() {
        println!("No hooks found in {}", ctx.config.hooks_dir.display());
        return Ok(());
    }
    for hook in hooks {
        let status = if hook.executable { "active" } else { "inactive" };
        println!(
            "{:<30} pattern={:<16} stage={:<12} mode={:<10} {status}",
            hook.name, hook.pattern, hook.stage, hook.mode, status = status
        );
    }
    Ok(())
}

async fn create(ctx: &AppContext, pattern: String, stage: String, ext: String) -> anyhow::Result<()> {
    let stage = Stage::parse(&stage).ok_or_else(|| anyhow!("unknown stage '{stage}'"))?;
    let path = mine_discovery::create_scaffold(&ctx.config.hooks_dir, &pattern, stage, &ext)
        .await
        .with_context(|| format!("failed to scaffold hook under {}", ctx.config.hooks_dir.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

async fn test(ctx: &AppContext, filename: String) -> anyhow::Result<()> {
    let hooks = mine_discovery::discover(&ctx.config.hooks_dir).await?;
    let hook = hooks
        .into_iter()
        .find(|h| h.name == filename)
        .ok_or_else(|| anyhow!("no hook named '{filename}' in {}", ctx.config.hooks_dir.display()))?;
    let result = mine_discovery::test_hook(&hook)
        .await
        .map_err(|e| anyhow!("hook '{filename}' failed: {e}"))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
