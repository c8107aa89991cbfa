//! Command implementations: thin handlers over the core crates, wired
//! through `AppContext`.

pub mod demo;
pub mod hook;
pub mod plugin;
