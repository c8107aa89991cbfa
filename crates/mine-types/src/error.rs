//! Error taxonomy for the hook pipeline, registry, and plugin lifecycle.
//!
//! [`MineError`] is the library-level error type every component funnels into.
//! It exists so the CLI binary has exactly one place to map a failure to an
//! exit code and a user-facing message (see [`MineError::to_exit_code`] and
//! [`MineError::display_for_user`]).

use std::time::Duration;
use thiserror::Error;

/// The failure of a single hook invocation, independent of which stage it ran in.
///
/// This is the "underlying cause" that stage-level errors wrap; notify hooks
/// surface it to the diagnostic log directly instead of propagating it.
#[derive(Error, Debug, Clone)]
pub enum HookError {
    #[error("hook '{hook}' ({hook_source}) timed out after {duration:?}")]
    Timeout {
        hook: String,
        hook_source: String,
        duration: Duration,
    },

    #[error("hook '{hook}' ({hook_source}) exited non-zero: {stderr}")]
    Failed {
        hook: String,
        hook_source: String,
        stderr: String,
    },

    #[error("hook '{hook}' ({hook_source}) produced unparseable output: {reason}")]
    InvalidOutput {
        hook: String,
        hook_source: String,
        reason: String,
    },

    #[error("hook '{hook}' ({hook_source}) attempted to mutate immutable field '{field}'")]
    InvariantViolation {
        hook: String,
        hook_source: String,
        field: String,
    },
}

impl HookError {
    #[must_use]
    pub fn hook(&self) -> &str {
        match self {
            Self::Timeout { hook, .. }
            | Self::Failed { hook, .. }
            | Self::InvalidOutput { hook, .. }
            | Self::InvariantViolation { hook, .. } => hook,
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Timeout { hook_source, .. }
            | Self::Failed { hook_source, .. }
            | Self::InvalidOutput { hook_source, .. }
            | Self::InvariantViolation { hook_source, .. } => hook_source,
        }
    }
}

/// Registration-time validation failures (§4.2).
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("hook '{name}' declares stage {stage} with mode {mode}, which is not a legal pairing")]
    InvalidStageModePairing {
        name: String,
        stage: String,
        mode: String,
    },
}

/// Plugin manifest validation failures (§4.6).
#[derive(Error, Debug, Clone)]
pub enum ManifestError {
    #[error("manifest is missing required field '{0}'")]
    MissingField(String),

    #[error("plugin name '{0}' is not kebab-case ([a-z0-9]+(-[a-z0-9]+)*)")]
    InvalidName(String),

    #[error("protocol version '{0}' is not supported by this runtime")]
    UnsupportedProtocolVersion(String),

    #[error("hook declaration for '{command}' has illegal stage/mode pairing: {stage}/{mode}")]
    InvalidHookPairing {
        command: String,
        stage: String,
        mode: String,
    },

    #[error("command declaration '{0}' uses a reserved prefix")]
    ReservedCommandPrefix(String),

    #[error("command declaration name must not be empty")]
    EmptyCommandName,

    #[error("permission filesystem path '{0}' must be absolute or home-relative (~/...)")]
    InvalidFilesystemPermission(String),

    #[error("permission env_vars entry '{0}' is not a valid environment variable name")]
    InvalidEnvVarPermission(String),

    #[error("failed to parse manifest TOML: {0}")]
    Toml(String),

    #[error("manifest I/O error: {0}")]
    Io(String),
}

/// Stable exit codes the host CLI maps errors to (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const COMMAND_WORK_FAILED: ExitCode = ExitCode(1);
    pub const PIPELINE_FAILURE: ExitCode = ExitCode(2);
    pub const REGISTRATION_FAILURE: ExitCode = ExitCode(3);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

/// The library-level error type returned by every `mine` core operation.
#[derive(Error, Debug)]
pub enum MineError {
    #[error("invalid registration: {0}")]
    InvalidRegistration(#[from] RegistryError),

    #[error("invalid manifest: {0}")]
    InvalidManifest(#[from] ManifestError),

    #[error("prevalidate hook failed: {0}")]
    PrevalidateFailed(HookError),

    #[error("preexec hook failed: {0}")]
    PreexecFailed(HookError),

    #[error("postexec hook failed: {0}")]
    PostexecFailed(HookError),

    #[error("command work failed: {0}")]
    CommandWorkFailed(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MineError {
    /// Map this error to the exit code the host CLI should use (§6).
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::CommandWorkFailed(_) => ExitCode::COMMAND_WORK_FAILED,
            Self::PrevalidateFailed(_) | Self::PreexecFailed(_) | Self::PostexecFailed(_) => {
                ExitCode::PIPELINE_FAILURE
            }
            Self::InvalidRegistration(_) | Self::InvalidManifest(_) => {
                ExitCode::REGISTRATION_FAILURE
            }
            Self::Io(_) => ExitCode::PIPELINE_FAILURE,
        }
    }

    /// The underlying [`HookError`], if this failure originated from a stage's
    /// transform chain.
    #[must_use]
    pub fn hook_error(&self) -> Option<&HookError> {
        match self {
            Self::PrevalidateFailed(e) | Self::PreexecFailed(e) | Self::PostexecFailed(e) => {
                Some(e)
            }
            _ => None,
        }
    }

    /// Render a user-facing message including the offending hook's hook_source,
    /// stage, and underlying cause (§7).
    #[must_use]
    pub fn display_for_user(&self) -> String {
        if let Some(hook_err) = self.hook_error() {
            let stage = match self {
                Self::PrevalidateFailed(_) => "prevalidate",
                Self::PreexecFailed(_) => "preexec",
                Self::PostexecFailed(_) => "postexec",
                _ => unreachable!(),
            };
            format!(
                "hook '{}' (source: {}, stage: {}) failed: {}",
                hook_err.hook(),
                hook_err.source(),
                stage,
                hook_err
            )
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec_table() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::COMMAND_WORK_FAILED.as_i32(), 1);
        assert_eq!(ExitCode::PIPELINE_FAILURE.as_i32(), 2);
        assert_eq!(ExitCode::REGISTRATION_FAILURE.as_i32(), 3);
    }

    #[test]
    fn preexec_failed_maps_to_pipeline_failure() {
        let err = MineError::PreexecFailed(HookError::Timeout {
            hook: "slow".into(),
            hook_source: "user".into(),
            duration: Duration::from_millis(500),
        });
        assert_eq!(err.to_exit_code(), ExitCode::PIPELINE_FAILURE);
    }

    #[test]
    fn display_for_user_includes_source_and_stage() {
        let err = MineError::PreexecFailed(HookError::Failed {
            hook: "a-tag".into(),
            hook_source: "plugin:foo".into(),
            stderr: "boom".into(),
        });
        let msg = err.display_for_user();
        assert!(msg.contains("a-tag"));
        assert!(msg.contains("plugin:foo"));
        assert!(msg.contains("preexec"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn invalid_registration_maps_to_registration_failure() {
        let err = MineError::from(RegistryError::InvalidStageModePairing {
            name: "h".into(),
            stage: "preexec".into(),
            mode: "notify".into(),
        });
        assert_eq!(err.to_exit_code(), ExitCode::REGISTRATION_FAILURE);
    }
}
