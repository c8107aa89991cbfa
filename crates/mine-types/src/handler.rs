//! The `Handler` capability: the single polymorphic seam in the pipeline.
//!
//! A handler receives a context and returns either a (possibly modified)
//! context or a [`HookError`]. It is implemented by both in-process closures
//! and subprocess-backed handlers (`mine-exec`, `mine-plugin`) — callers never
//! need to know which.

use crate::context::Context;
use crate::error::HookError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A hook's executable body, independent of how it is implemented.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run the handler against `ctx`.
    ///
    /// Returning `Ok(None)` declares a no-op: the caller's context before this
    /// hook is used unchanged, without requiring the handler to clone it.
    async fn call(&self, ctx: &Context) -> Result<Option<Context>, HookError>;
}

/// A boxed handler, cheap to clone and share across registrations.
pub type SharedHandler = Arc<dyn Handler>;

/// Adapts a plain async closure into a [`Handler`].
///
/// Used for in-process hooks (tests, and any first-party hook that doesn't
/// need a subprocess round-trip).
pub struct FnHandler<F>(F);

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Option<Context>, HookError>> + Send,
{
    async fn call(&self, ctx: &Context) -> Result<Option<Context>, HookError> {
        (self.0)(ctx.clone()).await
    }
}
