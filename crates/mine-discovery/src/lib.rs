//! Discovery (§4.5): turns files in a known directory into registered hooks
//! by convention, and the `hook create`/`hook test` auxiliary operations.

use mine_exec::ScriptExecutor;
use mine_registry::Registry;
use mine_types::{Context, HookError, HookRegistrationBuilder, Mode, RegistryError, Stage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One file found under the hooks directory, parsed but not yet registered.
#[derive(Debug, Clone)]
pub struct DiscoveredHook {
    pub path: PathBuf,
    pub pattern: String,
    pub stage: Stage,
    pub mode: Mode,
    /// The full filename, used as the hook's registration name so that
    /// alphabetical sort gives deterministic chaining (§4.5).
    pub name: String,
    pub executable: bool,
}

/// Parse `<pattern>.<stage>.<ext>` right-to-left: strip the extension, then
/// the stage segment; the remainder is the pattern. Returns `None` for
/// filenames with fewer than two dots or an unrecognized stage segment.
#[must_use]
pub fn parse_filename(filename: &str) -> Option<(String, Stage)> {
    let (rest, _ext) = filename.rsplit_once('.')?;
    let (pattern, stage_str) = rest.rsplit_once('.')?;
    if pattern.is_empty() {
        return None;
    }
    let stage = Stage::parse(stage_str)?;
    Some((pattern.to_string(), stage))
}

#[cfg(unix)]
async fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(windows)]
async fn is_executable(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("exe" | "bat" | "cmd" | "ps1")
    )
}

async fn is_directory(path: &Path) -> bool {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.file_type().is_symlink() => tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false),
        Ok(meta) => meta.is_dir(),
        Err(_) => false,
    }
}

/// Enumerate the hooks directory once and parse every entry into a
/// [`DiscoveredHook`]. Missing directories yield an empty list, not an error.
///
/// # Errors
/// Returns an error if the directory exists but cannot be read.
pub async fn discover(dir: &Path) -> std::io::Result<Vec<DiscoveredHook>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut hooks = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_directory(&path).await {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str().map(str::to_string)) else {
            continue;
        };
        let Some((pattern, stage)) = parse_filename(&filename) else {
            tracing::warn!(file = %filename, "hook filename has fewer than two dots, ignoring");
            continue;
        };
        let executable = is_executable(&path).await;
        if !executable {
            tracing::warn!(file = %filename, "hook file is not executable, listing as inactive");
        }
        hooks.push(DiscoveredHook {
            path,
            pattern,
            stage,
            mode: stage.required_mode(),
            name: filename,
            executable,
        });
    }
    Ok(hooks)
}

/// Register every executable discovered hook with `source = "user"`.
/// Inactive (non-executable) hooks are skipped, not registered.
///
/// # Errors
/// Returns an error if any hook's stage/mode pairing is invalid, which
/// cannot happen for hooks produced by [`discover`] (mode is always derived
/// from stage) but can for hand-constructed [`DiscoveredHook`] values.
pub async fn register_discovered(
    registry: &Registry,
    hooks: Vec<DiscoveredHook>,
) -> Result<usize, RegistryError> {
    let mut registered = 0;
    for hook in hooks {
        if !hook.executable {
            continue;
        }
        let timeout = hook.mode.default_timeout();
        let handler =
            ScriptExecutor::new(hook.path.clone(), hook.mode, timeout, hook.name.clone(), "user")
                .into_handler();
        registry
            .register(HookRegistrationBuilder::new(
                hook.pattern,
                hook.stage,
                hook.mode,
                hook.name,
                "user",
                handler,
            ))
            .await?;
        registered += 1;
    }
    Ok(registered)
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o755);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(windows)]
async fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn scaffold_body(stage: Stage, ext: &str) -> String {
    let shebang = match ext {
        "py" => "#!/usr/bin/env python3",
        _ => "#!/bin/sh",
    };
    format!(
        "{shebang}\n\
         # mine hook ({stage})\n\
         # Reads a JSON context on stdin. Transform stages should write a\n\
         # (possibly mutated) context as JSON on stdout; notify stages may\n\
         # write nothing.\n\
         cat\n"
    )
}

/// Write a scaffold script for a new hook and mark it executable (§4.5: `Create`).
///
/// # Errors
/// Returns an error if the directory cannot be created or the file cannot be
/// written or marked executable.
pub async fn create_scaffold(
    dir: &Path,
    pattern: &str,
    stage: Stage,
    ext: &str,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{pattern}.{}.{ext}", stage.as_str()));
    tokio::fs::write(&path, scaffold_body(stage, ext)).await?;
    set_executable(&path).await?;
    Ok(path)
}

/// Run a discovered hook against a synthetic context without registering it
/// (§4.5: `Test`).
///
/// # Errors
/// Returns the [`HookError`] the hook produced, if any.
pub async fn test_hook(hook: &DiscoveredHook) -> Result<Context, HookError> {
    let executor = ScriptExecutor::new(
        hook.path.clone(),
        hook.mode,
        hook.mode.default_timeout(),
        hook.name.clone(),
        "user",
    );
    let synthetic = Context::new(hook.pattern.clone(), vec!["test".to_string()], BTreeMap::new());
    let result = mine_types::Handler::call(&executor, &synthetic).await?;
    Ok(result.unwrap_or(synthetic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn parse_filename_splits_right_to_left() {
        assert_eq!(
            parse_filename("todo.*.preexec.sh"),
            Some(("todo.*".to_string(), Stage::Preexec))
        );
        assert_eq!(parse_filename("all.notify.py"), Some(("all".to_string(), Stage::Notify)));
    }

    #[test]
    fn parse_filename_rejects_too_few_dots() {
        assert_eq!(parse_filename("nodots"), None);
        assert_eq!(parse_filename("one.dot"), None);
    }

    #[test]
    fn parse_filename_rejects_unknown_stage() {
        assert_eq!(parse_filename("todo.bogus.sh"), None);
    }

    fn write_file(dir: &Path, name: &str, executable: bool) {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\ncat\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(if executable { 0o755 } else { 0o644 });
        std::fs::set_permissions(&path, perms).unwrap();
    }

    #[tokio::test]
    async fn discover_ignores_directories_and_malformed_names() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "todo.*.preexec.sh", true);
        write_file(dir.path(), "malformed", true);
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let hooks = discover(dir.path()).await.unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].pattern, "todo.*");
        assert_eq!(hooks[0].stage, Stage::Preexec);
        assert!(hooks[0].executable);
    }

    #[tokio::test]
    async fn discover_missing_directory_yields_empty() {
        let hooks = discover(Path::new("/nonexistent/mine/hooks")).await.unwrap();
        assert!(hooks.is_empty());
    }

    #[tokio::test]
    async fn non_executable_file_is_listed_inactive() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "todo.*.notify.sh", false);

        let hooks = discover(dir.path()).await.unwrap();
        assert_eq!(hooks.len(), 1);
        assert!(!hooks[0].executable);
    }

    #[tokio::test]
    async fn register_discovered_skips_inactive_hooks() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.notify.sh", true);
        write_file(dir.path(), "b.notify.sh", false);

        let hooks = discover(dir.path()).await.unwrap();
        let registry = Registry::new();
        let registered = register_discovered(&registry, hooks).await.unwrap();
        assert_eq!(registered, 1);
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn create_scaffold_writes_executable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_scaffold(dir.path(), "todo.add", Stage::Preexec, "sh")
            .await
            .unwrap();
        assert!(path.ends_with("todo.add.preexec.sh"));
        let perms = std::fs::metadata(&path).unwrap().permissions();
        assert_eq!(perms.mode() & 0o111, 0o111);
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("#!/bin/sh"));
    }

    #[tokio::test]
    async fn test_hook_runs_without_registering() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "todo.*.preexec.sh", true);
        let hooks = discover(dir.path()).await.unwrap();
        let out = test_hook(&hooks[0]).await.unwrap();
        assert_eq!(out.command, "todo.*");

        let registry = Registry::new();
        assert_eq!(registry.count().await, 0);
    }
}
