//! Stage and mode enums for the hook pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One of the four ordered phases a command invocation passes through.
///
/// The ordering is fixed: `Prevalidate < Preexec < Postexec < Notify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prevalidate,
    Preexec,
    Postexec,
    Notify,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 4] = [
        Stage::Prevalidate,
        Stage::Preexec,
        Stage::Postexec,
        Stage::Notify,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prevalidate => "prevalidate",
            Self::Preexec => "preexec",
            Self::Postexec => "postexec",
            Self::Notify => "notify",
        }
    }

    /// Parse a stage from its wire/filename representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prevalidate" => Some(Self::Prevalidate),
            "preexec" => Some(Self::Preexec),
            "postexec" => Some(Self::Postexec),
            "notify" => Some(Self::Notify),
            _ => None,
        }
    }

    /// The only mode legal at this stage.
    #[must_use]
    pub const fn required_mode(&self) -> Mode {
        match self {
            Self::Notify => Mode::Notify,
            Self::Prevalidate | Self::Preexec | Self::Postexec => Mode::Transform,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a hook transforms the context (synchronous, effects returned) or
/// merely observes (asynchronous, effects ignored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Transform,
    Notify,
}

impl Mode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::Notify => "notify",
        }
    }

    /// Default per-hook timeout for this mode (§3: 5s transform, 30s notify).
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        match self {
            Self::Transform => Duration::from_secs(5),
            Self::Notify => Duration::from_secs(30),
        }
    }

    /// Whether `stage` is a legal pairing for this mode.
    #[must_use]
    pub const fn legal_for(&self, stage: Stage) -> bool {
        match self {
            Self::Notify => matches!(stage, Stage::Notify),
            Self::Transform => !matches!(stage, Stage::Notify),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
