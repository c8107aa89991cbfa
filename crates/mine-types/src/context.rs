//! The data envelope carried through the pipeline for one command invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shared state for one command invocation as it travels through the pipeline.
///
/// `Context` is a plain tree of strings, sequences, and maps plus an opaque
/// `result`, so it is cheap to `Clone` and has no cyclic ownership — notify
/// fan-out relies on that to hand each hook its own deep copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Dotted, user-visible command identifier (e.g. `todo.add`).
    pub command: String,
    /// Ordered positional arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Flag name -> value. Order is never significant.
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
    /// The command's own work output, present from postexec onward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Set once at construction, never mutated by any hook.
    pub timestamp: DateTime<Utc>,
}

impl Context {
    /// Build a new context, normalizing absent sequences/maps to empty ones.
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        flags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            flags,
            result: None,
            timestamp: Utc::now(),
        }
    }

    /// Canonical JSON encoding with stable field names and ordering.
    ///
    /// # Errors
    /// Returns an error if the context cannot be represented as JSON (practically
    /// unreachable given the field types, but the fallible signature mirrors the
    /// wire boundary).
    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a context from its canonical JSON encoding.
    ///
    /// # Errors
    /// Returns an error if `bytes` is not valid JSON or does not match the
    /// context shape.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Whether two contexts agree on the fields hooks are forbidden to mutate.
    #[must_use]
    pub fn preserves_invariants(&self, other: &Self) -> bool {
        self.command == other.command && self.timestamp == other.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_empty_collections() {
        let ctx = Context::new("todo.add", Vec::new(), BTreeMap::new());
        assert_eq!(ctx.command, "todo.add");
        assert!(ctx.args.is_empty());
        assert!(ctx.flags.is_empty());
        assert!(ctx.result.is_none());
    }

    #[test]
    fn serialize_round_trip_preserves_fields() {
        let mut flags = BTreeMap::new();
        flags.insert("force".to_string(), "true".to_string());
        let mut ctx = Context::new("todo.add", vec!["buy milk".to_string()], flags);
        ctx.result = Some(serde_json::json!({"id": 1}));

        let bytes = ctx.serialize().unwrap();
        let decoded = Context::deserialize(&bytes).unwrap();
        assert_eq!(ctx, decoded);
    }

    #[test]
    fn result_omitted_from_wire_when_absent() {
        let ctx = Context::new("version", Vec::new(), BTreeMap::new());
        let bytes = ctx.serialize().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("\"result\""));
    }

    #[test]
    fn preserves_invariants_checks_command_and_timestamp() {
        let a = Context::new("todo.add", Vec::new(), BTreeMap::new());
        let mut b = a.clone();
        assert!(a.preserves_invariants(&b));

        b.command = "todo.remove".to_string();
        assert!(!a.preserves_invariants(&b));
    }
}
