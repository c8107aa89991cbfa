//! The script executor (§4.4): a [`Handler`] that runs an external program
//! with JSON over stdio under an enforced timeout.
//!
//! Processes are spawned argv-style only (`tokio::process::Command::new(path)`,
//! no shell string evaluation), mirroring the security posture the teacher
//! codebase documents for its own process runner.

use async_trait::async_trait;
use mine_types::{Context, Handler, HookError, Mode, SharedHandler};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Upper bound on captured stderr included in error messages.
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

/// Runs `path` as a subprocess, handing it the context as JSON on stdin and
/// reading a (possibly mutated) context back from stdout.
///
/// Stateless beyond its own configuration (`Clone`, no interior state); safe
/// for concurrent use across many hooks.
#[derive(Clone, Debug)]
pub struct ScriptExecutor {
    path: PathBuf,
    mode: Mode,
    timeout: Duration,
    name: String,
    source: String,
}

impl ScriptExecutor {
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        mode: Mode,
        timeout: Duration,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            mode,
            timeout,
            name: name.into(),
            source: source.into(),
        }
    }

    /// Build a [`SharedHandler`] backed by this executor, ready for registration.
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
}

#[async_trait]
impl Handler for ScriptExecutor {
    async fn call(&self, ctx: &Context) -> Result<Option<Context>, HookError> {
        let payload = ctx
            .serialize()
            .map_err(|e| self.failed(format!("failed to serialize context: {e}")))?;

        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failed(format!("failed to spawn {}: {e}", self.path.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(&payload).await;
            let _ = stdin.shutdown().await;
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(self.failed(format!(
                    "I/O error waiting for {}: {e}",
                    self.path.display()
                )));
            }
            Err(_) => {
                return Err(HookError::Timeout {
                    hook: self.name.clone(),
                    hook_source: self.source.clone(),
                    duration: self.timeout,
                });
            }
        };

        match self.mode {
            Mode::Notify => {
                if !output.status.success() {
                    tracing::warn!(
                        hook = %self.name,
                        source = %self.source,
                        exit_code = ?output.status.code(),
                        stderr = %truncate(&String::from_utf8_lossy(&output.stderr)),
                        "notify hook exited non-zero"
                    );
                }
                Ok(None)
            }
            Mode::Transform => {
                if !output.status.success() {
                    return Err(HookError::Failed {
                        hook: self.name.clone(),
                        hook_source: self.source.clone(),
                        stderr: truncate(&String::from_utf8_lossy(&output.stderr)),
                    });
                }
                if output.stdout.is_empty() {
                    return Ok(None);
                }
                Context::deserialize(&output.stdout)
                    .map(Some)
                    .map_err(|e| HookError::InvalidOutput {
                        hook: self.name.clone(),
                        hook_source: self.source.clone(),
                        reason: e.to_string(),
                    })
            }
        }
    }
}
