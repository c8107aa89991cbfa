//! The hook registration record (§3).

use crate::handler::SharedHandler;
use crate::stage::{Mode, Stage};
use std::time::Duration;

/// One hook bound to a pattern, stage, and mode, plus its handler.
///
/// `name` need not be globally unique; within one `(pattern, stage)` bucket two
/// hooks with identical names sort stably by insertion order (`seq`).
#[derive(Clone)]
pub struct HookRegistration {
    pub pattern: String,
    pub stage: Stage,
    pub mode: Mode,
    pub name: String,
    /// Provenance tag, e.g. `"user"` or `"plugin:<name>"`. Used for bulk unregister.
    pub source: String,
    pub handler: SharedHandler,
    /// Per-hook deadline; `None` means "use the mode's default".
    pub timeout: Option<Duration>,
    /// Insertion order, assigned by the registry, used to break name ties.
    pub(crate) seq: u64,
}

impl HookRegistration {
    /// The effective timeout for this hook: its own override, or the mode default.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or_else(|| self.mode.default_timeout())
    }

    /// Whether `stage`/`mode` on this record is a legal pairing (§3).
    #[must_use]
    pub fn has_legal_pairing(&self) -> bool {
        self.mode.legal_for(self.stage)
    }

    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl std::fmt::Debug for HookRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistration")
            .field("pattern", &self.pattern)
            .field("stage", &self.stage)
            .field("mode", &self.mode)
            .field("name", &self.name)
            .field("source", &self.source)
            .field("timeout", &self.timeout)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Builder used by registries/discovery/plugin projection to construct a
/// registration without exposing the `seq` field (assigned at insertion time).
pub struct HookRegistrationBuilder {
    pattern: String,
    stage: Stage,
    mode: Mode,
    name: String,
    source: String,
    handler: SharedHandler,
    timeout: Option<Duration>,
}

impl HookRegistrationBuilder {
    #[must_use]
    pub fn new(
        pattern: impl Into<String>,
        stage: Stage,
        mode: Mode,
        name: impl Into<String>,
        source: impl Into<String>,
        handler: SharedHandler,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            stage,
            mode,
            name: name.into(),
            source: source.into(),
            handler,
            timeout: None,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Peek at the fields a registry needs to validate before assigning `seq`
    /// and consuming the builder with [`Self::build`].
    #[must_use]
    pub fn preview(&self) -> (String, Stage, Mode, String) {
        (self.pattern.clone(), self.stage, self.mode, self.name.clone())
    }

    #[must_use]
    pub fn build(self, seq: u64) -> HookRegistration {
        HookRegistration {
            pattern: self.pattern,
            stage: self.stage,
            mode: self.mode,
            name: self.name,
            source: self.source,
            handler: self.handler,
            timeout: self.timeout,
            seq,
        }
    }
}
