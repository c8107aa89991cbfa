//! Structured logging setup (§3a).
//!
//! Compact human-readable format by default; `--verbose` switches to a more
//! detailed format with target/field output. `RUST_LOG` (standard
//! `tracing_subscriber::EnvFilter` syntax) overrides the built-in default
//! filter (`mine=info,warn` / `mine=debug,info` when verbose).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global `tracing` subscriber. Safe to call at most once per
/// process; a second call is a programmer error in the CLI binary, not a
/// library concern, so this does not guard against it.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if verbose {
        "mine=debug,info"
    } else {
        "mine=info,warn"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()?;
    }
    Ok(())
}
