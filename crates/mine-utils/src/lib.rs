//! Ambient stack for `mine`: XDG-aware filesystem layout and structured
//! logging setup, shared by the CLI binary and the discovery/manifest
//! crates that need to know where things live on disk.

pub mod logging;
pub mod paths;

