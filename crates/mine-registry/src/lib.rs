//! The hook registry: a thread-safe set of registrations with glob resolution.
//!
//! Command names are dotted (`todo.add`); patterns match them with shell-glob
//! semantics by translating `.` segment separators to `/` and matching against
//! a [`globset::Glob`] built with `literal_separator(true)`, so a bare `*` does
//! not cross a segment boundary.

use globset::{GlobBuilder, GlobMatcher};
use mine_types::{HookRegistration, RegistryError, Stage};
use tokio::sync::RwLock;

pub use mine_types::HookRegistrationBuilder;

fn to_path(command: &str) -> String {
    command.replace('.', "/")
}

fn compile_matcher(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(&to_path(pattern))
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

struct Entry {
    registration: HookRegistration,
    matcher: GlobMatcher,
}

#[derive(Default)]
struct RegistryState {
    entries: Vec<Entry>,
    next_seq: u64,
}

/// Concurrent-safe store of hook registrations (§4.2).
///
/// Reads take a shared lock and return a detached snapshot; the lock is never
/// held across handler execution. Mutations take an exclusive lock for the
/// minimal critical section. Insertion order (used to break name ties in
/// [`Registry::resolve`]) is assigned here, at registration time.
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Register a hook. Validates the stage/mode pairing (§3); no deduplication.
    ///
    /// # Errors
    /// Returns [`RegistryError::InvalidStageModePairing`] if the builder's
    /// declared mode is not legal for its stage.
    pub async fn register(&self, hook: HookRegistrationBuilder) -> Result<(), RegistryError> {
        let (pattern, stage, mode, name) = hook.preview();
        if !mode.legal_for(stage) {
            return Err(RegistryError::InvalidStageModePairing {
                name,
                stage: stage.to_string(),
                mode: mode.to_string(),
            });
        }
        let matcher = compile_matcher(&pattern).map_err(|e| RegistryError::InvalidStageModePairing {
            name: name.clone(),
            stage: stage.to_string(),
            mode: format!("malformed pattern '{pattern}': {e}"),
        })?;

        let mut state = self.state.write().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        let registration = hook.build(seq);
        tracing::debug!(
            name = %registration.name,
            pattern = %registration.pattern,
            stage = %registration.stage,
            source = %registration.source,
            seq,
            "registered hook"
        );
        state.entries.push(Entry { registration, matcher });
        Ok(())
    }

    /// Remove every registration with provenance tag `source`. Idempotent.
    pub async fn unregister(&self, source: &str) {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|e| e.registration.source != source);
        let removed = before - state.entries.len();
        if removed > 0 {
            tracing::debug!(source, removed, "unregistered hooks");
        }
    }

    /// All registrations whose stage equals `stage` and whose pattern matches
    /// `command`, ordered ascending by name with stable insertion-order ties.
    pub async fn resolve(&self, command: &str, stage: Stage) -> Vec<HookRegistration> {
        let path = to_path(command);
        let state = self.state.read().await;
        let mut matches: Vec<&Entry> = state
            .entries
            .iter()
            .filter(|e| e.registration.stage == stage && e.matcher.is_match(&path))
            .collect();
        matches.sort_by(|a, b| {
            a.registration
                .name
                .cmp(&b.registration.name)
                .then(a.registration.seq().cmp(&b.registration.seq()))
        });
        matches.into_iter().map(|e| e.registration.clone()).collect()
    }

    /// Fast predicate: does any hook at all (any stage) match `command`?
    pub async fn has_any(&self, command: &str) -> bool {
        let path = to_path(command);
        let state = self.state.read().await;
        state.entries.iter().any(|e| e.matcher.is_match(&path))
    }

    /// A detached snapshot of every registration, in insertion order.
    pub async fn all(&self) -> Vec<HookRegistration> {
        let state = self.state.read().await;
        state.entries.iter().map(|e| e.registration.clone()).collect()
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}
