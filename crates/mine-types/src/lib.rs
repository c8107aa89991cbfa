//! Shared data model for the `mine` hook pipeline: context, stage/mode enums,
//! the handler capability, and the error taxonomy every other crate funnels
//! into.

pub mod context;
pub mod error;
pub mod handler;
pub mod registration;
pub mod stage;

pub use context::Context;
pub use error::{ExitCode, HookError, ManifestError, MineError, RegistryError};
pub use handler::{FnHandler, Handler, SharedHandler};
pub use registration::{HookRegistration, HookRegistrationBuilder};
pub use stage::{Mode, Stage};
