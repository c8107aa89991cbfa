//! The three plugin invocation shapes over the JSON wire protocol (§4.8).
//!
//! A plugin is a single executable invoked three different ways, distinguished
//! by the payload's `type` field: `hook` (adapted into a [`Handler`] so plugin
//! hooks are scheduled by exactly the same machinery as user scripts),
//! `command` (a first-class subcommand whose stdout is forwarded verbatim),
//! and `lifecycle` (best-effort `init`/`shutdown` notifications plus `health`
//! for diagnostics).

use async_trait::async_trait;
use mine_manifest::Manifest;
use mine_registry::Registry;
use mine_sandbox::HostDirs;
use mine_types::{Context, Handler, HookError, HookRegistrationBuilder, Mode, RegistryError, SharedHandler, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// The wire protocol version this runtime speaks. Plugins may refuse a
/// request whose `protocol_version` they don't recognize.
pub const PROTOCOL_VERSION: &str = "1.0.0";

const MAX_STDERR_BYTES: usize = 2048;

fn truncate(s: &str) -> String {
    if s.len() <= MAX_STDERR_BYTES {
        return s.to_string();
    }
    let mut end = MAX_STDERR_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

/// Failures from running a plugin subprocess, independent of invocation shape.
#[derive(Debug, Error, Clone)]
pub enum PluginError {
    #[error("failed to spawn plugin '{plugin}' at {path}: {reason}")]
    Spawn {
        plugin: String,
        path: String,
        reason: String,
    },

    #[error("plugin '{plugin}' timed out after {duration:?}")]
    Timeout { plugin: String, duration: Duration },

    #[error("plugin '{plugin}' exited non-zero: {stderr}")]
    NonZeroExit { plugin: String, stderr: String },

    #[error("plugin '{plugin}' produced unparseable response: {reason}")]
    InvalidResponse { plugin: String, reason: String },
}

#[derive(Serialize)]
struct HookRequest<'a> {
    protocol_version: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    stage: Stage,
    mode: Mode,
    context: &'a Context,
}

#[derive(Deserialize)]
struct HookResponse {
    status: String,
    #[serde(default)]
    context: Option<Context>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    protocol_version: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    command: &'a str,
    args: &'a [String],
}

#[derive(Serialize)]
struct LifecycleRequest<'a> {
    protocol_version: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    event: &'a str,
}

#[derive(Deserialize)]
struct LifecycleResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

struct SpawnOutcome {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    success: bool,
}

async fn spawn_with_payload(
    path: &Path,
    env: &BTreeMap<String, String>,
    payload: &[u8],
    timeout: Duration,
    plugin: &str,
) -> Result<SpawnOutcome, PluginError> {
    let mut command = Command::new(path);
    command.env_clear();
    command.envs(env);
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| PluginError::Spawn {
        plugin: plugin.to_string(),
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(payload).await;
        let _ = stdin.shutdown().await;
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(PluginError::Spawn {
                plugin: plugin.to_string(),
                path: path.display().to_string(),
                reason: format!("I/O error waiting for plugin: {e}"),
            });
        }
        Err(_) => return Err(PluginError::Timeout { plugin: plugin.to_string(), duration: timeout }),
    };

    Ok(SpawnOutcome {
        stdout: output.stdout,
        stderr: output.stderr,
        success: output.status.success(),
    })
}

/// Adapts a plugin's hook declaration into a [`Handler`], so a plugin hook is
/// scheduled, timed out, and chained by exactly the same machinery (§4.3) as a
/// user script (`mine-exec`).
#[derive(Clone)]
pub struct PluginHookHandler {
    path: PathBuf,
    env: BTreeMap<String, String>,
    stage: Stage,
    mode: Mode,
    timeout: Duration,
    name: String,
    source: String,
}

impl PluginHookHandler {
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        env: BTreeMap<String, String>,
        stage: Stage,
        mode: Mode,
        timeout: Duration,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            env,
            stage,
            mode,
            timeout,
            name: name.into(),
            source: source.into(),
        }
    }

    #[must_use]
    pub fn into_handler(self) -> SharedHandler {
        Arc::new(self)
    }

    fn failed(&self, stderr: String) -> HookError {
        HookError::Failed {
            hook: self.name.clone(),
            hook_source: self.source.clone(),
            stderr,
        }
    }

    fn to_hook_error(&self, err: PluginError) -> HookError {
        match err {
            PluginError::Timeout { duration, .. } => HookError::Timeout {
                hook: self.name.clone(),
                hook_source: self.source.clone(),
                duration,
            },
            other => self.failed(other.to_string()),
        }
    }
}

#[async_trait]
impl Handler for PluginHookHandler {
    async fn call(&self, ctx: &Context) -> Result<Option<Context>, HookError> {
        let request = HookRequest {
            protocol_version: PROTOCOL_VERSION,
            kind: "hook",
            stage: self.stage,
            mode: self.mode,
            context: ctx,
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|e| self.failed(format!("failed to encode hook request: {e}")))?;

        let outcome = spawn_with_payload(&self.path, &self.env, &payload, self.timeout, &self.name)
            .await
            .map_err(|e| self.to_hook_error(e))?;

        match self.mode {
            Mode::Notify => {
                if !outcome.success {
                    tracing::warn!(
                        hook = %self.name,
                        source = %self.source,
                        stderr = %truncate(&String::from_utf8_lossy(&outcome.stderr)),
                        "notify plugin hook exited non-zero"
                    );
                }
                Ok(None)
            }
            Mode::Transform => {
                if !outcome.success {
                    return Err(self.failed(truncate(&String::from_utf8_lossy(&outcome.stderr))));
                }
                if outcome.stdout.is_empty() {
                    return Ok(None);
                }
                let response: HookResponse =
                    serde_json::from_slice(&outcome.stdout).map_err(|e| HookError::InvalidOutput {
                        hook: self.name.clone(),
                        hook_source: self.source.clone(),
                        reason: e.to_string(),
                    })?;
                if response.status != "ok" {
                    return Err(self.failed(response.message.unwrap_or_default()));
                }
                Ok(response.context)
            }
        }
    }
}

/// Run the `command` shape: forward the plugin's stdout to the caller
/// verbatim; a non-zero exit is a command failure.
///
/// # Errors
/// Returns [`PluginError`] if the plugin cannot be spawned, times out, or
/// exits non-zero.
pub async fn run_command(
    path: &Path,
    env: &BTreeMap<String, String>,
    name: &str,
    command: &str,
    args: &[String],
    timeout: Duration,
) -> Result<String, PluginError> {
    let request = CommandRequest {
        protocol_version: PROTOCOL_VERSION,
        kind: "command",
        command,
        args,
    };
    let payload = serde_json::to_vec(&request).map_err(|e| PluginError::InvalidResponse {
        plugin: name.to_string(),
        reason: format!("failed to encode command request: {e}"),
    })?;
    let outcome = spawn_with_payload(path, env, &payload, timeout, name).await?;
    if !outcome.success {
        return Err(PluginError::NonZeroExit {
            plugin: name.to_string(),
            stderr: truncate(&String::from_utf8_lossy(&outcome.stderr)),
        });
    }
    Ok(String::from_utf8_lossy(&outcome.stdout).into_owned())
}

/// The three lifecycle events a plugin may be notified of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Init,
    Shutdown,
    Health,
}

impl LifecycleEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Shutdown => "shutdown",
            Self::Health => "health",
        }
    }
}

/// A lifecycle event's outcome, as reported by the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStatus {
    Ok,
    Error(String),
}

/// Run the `lifecycle` shape. `init`/`shutdown` are best-effort: a plugin
/// that replies with nothing on stdout is treated as [`LifecycleStatus::Ok`].
/// `health` is used for `mine plugin info --check` diagnostics and expects a
/// `{"status": "ok"}` or `{"status": "error", "message": "..."}` reply.
///
/// # Errors
/// Returns [`PluginError`] if the plugin cannot be spawned, times out, exits
/// non-zero, or replies with unparseable JSON.
pub async fn run_lifecycle(
    path: &Path,
    env: &BTreeMap<String, String>,
    name: &str,
    event: LifecycleEvent,
    timeout: Duration,
) -> Result<LifecycleStatus, PluginError> {
    let request = LifecycleRequest {
        protocol_version: PROTOCOL_VERSION,
        kind: "lifecycle",
        event: event.as_str(),
    };
    let payload = serde_json::to_vec(&request).map_err(|e| PluginError::InvalidResponse {
        plugin: name.to_string(),
        reason: format!("failed to encode lifecycle request: {e}"),
    })?;
    let outcome = spawn_with_payload(path, env, &payload, timeout, name).await?;
    if !outcome.success {
        return Err(PluginError::NonZeroExit {
            plugin: name.to_string(),
            stderr: truncate(&String::from_utf8_lossy(&outcome.stderr)),
        });
    }
    if outcome.stdout.is_empty() {
        return Ok(LifecycleStatus::Ok);
    }
    let response: LifecycleResponse =
        serde_json::from_slice(&outcome.stdout).map_err(|e| PluginError::InvalidResponse {
            plugin: name.to_string(),
            reason: e.to_string(),
        })?;
    match response.status.as_str() {
        "ok" => Ok(LifecycleStatus::Ok),
        _ => Ok(LifecycleStatus::Error(response.message.unwrap_or_default())),
    }
}

/// Project every hook declaration in `manifest` into `registry` as a
/// [`PluginHookHandler`], tagged `source = "plugin:<name>"`, sandboxed per
/// [`mine_sandbox::build_environment`].
///
/// Assumes `manifest` already passed [`mine_manifest::validate`] (install
/// always validates before calling this), so stage/mode parsing cannot fail.
///
/// # Errors
/// Returns [`RegistryError`] if registration itself rejects a pairing, which
/// cannot happen for a validated manifest but is surfaced rather than panicked
/// on, matching `mine-discovery`'s `register_discovered`.
pub async fn register_plugin_hooks(
    registry: &Registry,
    manifest: &Manifest,
    entrypoint: &Path,
    host_env: &BTreeMap<String, String>,
    host_dirs: Option<&HostDirs<'_>>,
) -> Result<usize, RegistryError> {
    let env = mine_sandbox::build_environment(&manifest.permissions, host_env, host_dirs);
    let mut registered = 0;
    for hook in &manifest.hooks {
        let Some(stage) = Stage::parse(&hook.stage) else {
            continue;
        };
        let mode = match hook.mode.as_str() {
            "transform" => Mode::Transform,
            "notify" => Mode::Notify,
            _ => continue,
        };
        let timeout = hook
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| mode.default_timeout());
        let name = format!("{}:{}", manifest.plugin.name, hook.command);
        let source = format!("plugin:{}", manifest.plugin.name);
        let handler = PluginHookHandler::new(
            entrypoint,
            env.clone(),
            stage,
            mode,
            timeout,
            name.clone(),
            source.clone(),
        )
        .into_handler();
        registry
            .register(
                HookRegistrationBuilder::new(hook.command.clone(), stage, mode, name, source, handler)
                    .timeout(timeout),
            )
            .await?;
        registered += 1;
    }
    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{NamedTempFile, TempPath};

    fn script(body: &str) -> TempPath {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(&file, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(file.path()).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&file, perms).unwrap();
        file.into_temp_path()
    }

    fn env() -> BTreeMap<String, String> {
        BTreeMap::from([("PATH".to_string(), std::env::var("PATH").unwrap_or_default())])
    }

    fn ctx() -> Context {
        Context::new("todo.add", vec!["hello".to_string()], BTreeMap::new())
    }

    #[tokio::test]
    async fn hook_transform_empty_stdout_passes_through_unchanged() {
        let file = script("cat > /dev/null; exit 0");
        let handler = PluginHookHandler::new(
            &file,
            env(),
            Stage::Preexec,
            Mode::Transform,
            Duration::from_secs(5),
            "sync",
            "plugin:todo-sync",
        );
        let out = handler.call(&ctx()).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn hook_transform_parses_ok_response_context() {
        let file = script(
            r#"cat > /dev/null; printf '{"status":"ok","context":{"command":"todo.add","args":["hello","tagged"],"flags":{},"timestamp":"2026-01-15T10:30:00Z"}}'"#,
        );
        let handler = PluginHookHandler::new(
            &file,
            env(),
            Stage::Preexec,
            Mode::Transform,
            Duration::from_secs(5),
            "sync",
            "plugin:todo-sync",
        );
        let out = handler.call(&ctx()).await.unwrap().unwrap();
        assert_eq!(out.args, vec!["hello", "tagged"]);
    }

    #[tokio::test]
    async fn hook_transform_error_status_yields_failed() {
        let file = script(r#"cat > /dev/null; printf '{"status":"error","message":"bad input"}'"#);
        let handler = PluginHookHandler::new(
            &file,
            env(),
            Stage::Preexec,
            Mode::Transform,
            Duration::from_secs(5),
            "sync",
            "plugin:todo-sync",
        );
        let err = handler.call(&ctx()).await.unwrap_err();
        match err {
            HookError::Failed { stderr, .. } => assert!(stderr.contains("bad input")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hook_notify_discards_output_and_never_fails() {
        let file = script("cat > /dev/null; echo ignored; exit 9");
        let handler = PluginHookHandler::new(
            &file,
            env(),
            Stage::Notify,
            Mode::Notify,
            Duration::from_secs(5),
            "sync",
            "plugin:todo-sync",
        );
        let out = handler.call(&ctx()).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn hook_timeout_reports_duration() {
        let file = script("sleep 5");
        let handler = PluginHookHandler::new(
            &file,
            env(),
            Stage::Preexec,
            Mode::Transform,
            Duration::from_millis(100),
            "slow",
            "plugin:todo-sync",
        );
        let err = handler.call(&ctx()).await.unwrap_err();
        match err {
            HookError::Timeout { duration, .. } => assert_eq!(duration, Duration::from_millis(100)),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn command_forwards_stdout_verbatim() {
        let file = script("cat > /dev/null; printf 'sync status: up to date'");
        let out = run_command(
            &file,
            &env(),
            "todo-sync",
            "todo-sync-status",
            &[],
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(out, "sync status: up to date");
    }

    #[tokio::test]
    async fn command_nonzero_exit_yields_error() {
        let file = script("cat > /dev/null; echo boom 1>&2; exit 3");
        let err = run_command(
            &file,
            &env(),
            "todo-sync",
            "todo-sync-status",
            &[],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PluginError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn lifecycle_health_ok() {
        let file = script(r#"cat > /dev/null; printf '{"status":"ok"}'"#);
        let status = run_lifecycle(&file, &env(), "todo-sync", LifecycleEvent::Health, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status, LifecycleStatus::Ok);
    }

    #[tokio::test]
    async fn lifecycle_health_error_carries_message() {
        let file = script(r#"cat > /dev/null; printf '{"status":"error","message":"db down"}'"#);
        let status = run_lifecycle(&file, &env(), "todo-sync", LifecycleEvent::Health, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status, LifecycleStatus::Error("db down".to_string()));
    }

    #[tokio::test]
    async fn lifecycle_init_with_no_reply_is_best_effort_ok() {
        let file = script("cat > /dev/null; exit 0");
        let status = run_lifecycle(&file, &env(), "todo-sync", LifecycleEvent::Init, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status, LifecycleStatus::Ok);
    }

    #[tokio::test]
    async fn register_plugin_hooks_projects_into_registry_with_plugin_source() {
        let manifest = Manifest::parse(
            r#"
                [plugin]
                name = "todo-sync"
                version = "0.1.0"
                description = "Syncs todos"
                author = "jane"
                protocol_version = "1.0.0"

                [[hooks]]
                command = "todo.*"
                stage = "postexec"
                mode = "transform"
            "#,
        )
        .unwrap();
        let file = script("cat");
        let registry = Registry::new();
        let registered = register_plugin_hooks(&registry, &manifest, &file, &env(), None)
            .await
            .unwrap();
        assert_eq!(registered, 1);
        let hooks = registry.resolve("todo.add", Stage::Postexec).await;
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].source, "plugin:todo-sync");
    }
}
