//! `mine`: a personal developer CLI built around an extensible hook
//! pipeline and subprocess plugin runtime.
//!
//! All logic lives here; `main.rs` only maps [`cli::run`]'s result to a
//! process exit code.

pub mod cli;

pub use mine_types::{ExitCode, MineError};
