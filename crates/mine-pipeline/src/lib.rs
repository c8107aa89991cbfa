//! The pipeline runner (§4.3): stage orchestration, transform chaining,
//! notify fan-out, and the zero-cost fast path every command wrapper funnels
//! through.

use mine_registry::Registry;
use mine_types::{Context, HookError, HookRegistration, MineError, Stage};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Grace period given to in-flight notify hooks when the process is shutting
/// down (§5). Callers that build their own `tokio::runtime::Runtime` should
/// pass this to `Builder::shutdown_timeout`.
pub const NOTIFY_GRACE_PERIOD: Duration = Duration::from_millis(1500);

/// A transform stage failed partway through its chain.
///
/// Carries the context as of the last successfully applied hook, so the
/// caller can still fire notify hooks against the most recent state (§7:
/// postexec failure does not suppress the already-computed result).
struct StageFailure {
    ctx: Context,
    error: HookError,
}

/// The earlier of a hook's own timeout and whatever remains of the ambient
/// deadline (§5). A deadline already in the past yields a zero duration, so
/// the next `tokio::time::timeout` call fails immediately rather than
/// running the hook.
fn bounded_timeout(own: Duration, deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(deadline) => own.min(deadline.saturating_duration_since(Instant::now())),
        None => own,
    }
}

fn invariant_violation(hook: &HookRegistration, before: &Context, after: &Context) -> Option<HookError> {
    let field = if after.command != before.command {
        Some("command")
    } else if after.timestamp != before.timestamp {
        Some("timestamp")
    } else {
        None
    };
    field.map(|field| HookError::InvariantViolation {
        hook: hook.name.clone(),
        hook_source: hook.source.clone(),
        field: field.to_string(),
    })
}

/// Orchestrates the four-stage hook pipeline over a shared [`Registry`].
pub struct Pipeline {
    registry: Arc<Registry>,
}

impl Pipeline {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Wrap a command's own work with the hook pipeline.
    ///
    /// `work` receives the (possibly hook-mutated) args/flags and returns the
    /// command's result as JSON; its errors are forwarded to the caller
    /// unchanged as [`MineError::CommandWorkFailed`].
    pub async fn wrap<F, Fut>(
        &self,
        command: impl Into<String>,
        args: Vec<String>,
        flags: std::collections::BTreeMap<String, String>,
        work: F,
    ) -> Result<serde_json::Value, MineError>
    where
        F: FnOnce(Vec<String>, std::collections::BTreeMap<String, String>) -> Fut,
        Fut: Future<Output = anyhow::Result<serde_json::Value>>,
    {
        self.wrap_with_deadline(command, args, flags, None, work).await
    }

    /// Like [`Pipeline::wrap`], but bounds the whole invocation by `deadline`
    /// (§5). Each stage's hooks still honor their own per-hook timeout; a
    /// hook's effective timeout is the earlier of its own and whatever is
    /// left of the ambient deadline when that stage starts.
    pub async fn wrap_with_deadline<F, Fut>(
        &self,
        command: impl Into<String>,
        args: Vec<String>,
        flags: std::collections::BTreeMap<String, String>,
        deadline: Option<Duration>,
        work: F,
    ) -> Result<serde_json::Value, MineError>
    where
        F: FnOnce(Vec<String>, std::collections::BTreeMap<String, String>) -> Fut,
        Fut: Future<Output = anyhow::Result<serde_json::Value>>,
    {
        let command = command.into();
        let deadline = deadline.map(|d| Instant::now() + d);

        if !self.registry.has_any(&command).await {
            tracing::debug!(%command, "fast path: no hooks registered, skipping pipeline");
            return work(args, flags).await.map_err(MineError::CommandWorkFailed);
        }

        let ctx = Context::new(command.clone(), args, flags);

        let ctx = match self.run_stage(Stage::Prevalidate, ctx, deadline).await {
            Ok(ctx) => ctx,
            Err(failure) => {
                self.fire_notify(failure.ctx, deadline).await;
                return Err(MineError::PrevalidateFailed(failure.error));
            }
        };

        let ctx = match self.run_stage(Stage::Preexec, ctx, deadline).await {
            Ok(ctx) => ctx,
            Err(failure) => {
                self.fire_notify(failure.ctx, deadline).await;
                return Err(MineError::PreexecFailed(failure.error));
            }
        };

        match work(ctx.args.clone(), ctx.flags.clone()).await {
            Err(e) => {
                // Command work failed: postexec is skipped, notify still runs (§7).
                self.fire_notify(ctx, deadline).await;
                Err(MineError::CommandWorkFailed(e))
            }
            Ok(value) => {
                let mut ctx = ctx;
                ctx.result = Some(value.clone());
                match self.run_stage(Stage::Postexec, ctx, deadline).await {
                    Ok(ctx) => {
                        self.fire_notify(ctx, deadline).await;
                        Ok(value)
                    }
                    Err(failure) => {
                        self.fire_notify(failure.ctx, deadline).await;
                        Err(MineError::PostexecFailed(failure.error))
                    }
                }
            }
        }
    }

    /// Run every transform hook matching `stage` in order, chaining the
    /// context from one hook to the next.
    async fn run_stage(
        &self,
        stage: Stage,
        ctx: Context,
        deadline: Option<Instant>,
    ) -> Result<Context, StageFailure> {
        let hooks = self.registry.resolve(&ctx.command, stage).await;
        let mut current = ctx;
        for hook in hooks {
            let timeout = bounded_timeout(hook.effective_timeout(), deadline);
            let outcome = tokio::time::timeout(timeout, hook.handler.call(&current)).await;
            match outcome {
                Ok(Ok(Some(next))) => {
                    if let Some(err) = invariant_violation(&hook, &current, &next) {
                        return Err(StageFailure { ctx: current, error: err });
                    }
                    current = next;
                }
                Ok(Ok(None)) => {}
                Ok(Err(error)) => return Err(StageFailure { ctx: current, error }),
                Err(_) => {
                    let error = HookError::Timeout {
                        hook: hook.name.clone(),
                        hook_source: hook.source.clone(),
                        duration: timeout,
                    };
                    return Err(StageFailure { ctx: current, error });
                }
            }
        }
        Ok(current)
    }

    /// Dispatch every matching notify hook on its own detached task; returns
    /// as soon as the tasks are spawned, without waiting on them.
    async fn fire_notify(&self, ctx: Context, deadline: Option<Instant>) {
        let hooks = self.registry.resolve(&ctx.command, Stage::Notify).await;
        for hook in hooks {
            let ctx = ctx.clone();
            let timeout = bounded_timeout(hook.effective_timeout(), deadline);
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, hook.handler.call(&ctx)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(error)) => {
                        tracing::warn!(
                            hook = %hook.name,
                            source = %hook.source,
                            stage = %Stage::Notify,
                            %error,
                            "notify hook failed"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            hook = %hook.name,
                            source = %hook.source,
                            stage = %Stage::Notify,
                            ?timeout,
                            "notify hook timed out"
                        );
                    }
                }
            });
        }
    }
}
