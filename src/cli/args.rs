//! CLI argument definitions (§6's `hook`/`plugin` subcommand families plus a
//! handful of demonstration commands that exercise `Wrap` end-to-end).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// A personal developer CLI with an extensible hook pipeline.
#[derive(Parser)]
#[command(name = "mine")]
#[command(about = "A personal developer CLI with an extensible hook pipeline")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (overrides discovery).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the hooks directory (default: `~/.config/mine/hooks`).
    #[arg(long, global = true)]
    pub hooks_dir: Option<PathBuf>,

    /// Override the plugin install root (default: `<data-home>/mine/plugins`).
    #[arg(long, global = true)]
    pub plugins_root: Option<PathBuf>,

    /// Verbose structured logging with target/field output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage user-local hook scripts (§4.5).
    Hook {
        #[command(subcommand)]
        command: HookCommands,
    },
    /// Manage installed plugins (§4.6).
    Plugin {
        #[command(subcommand)]
        command: PluginCommands,
    },
    /// Print the CLI version, wrapped by the pipeline (demonstration command).
    Version,
    /// Echo `message` back, wrapped by the pipeline (demonstration command).
    Echo {
        message: Vec<String>,
    },
    /// A minimal task tracker, wrapped by the pipeline (demonstration command).
    Todo {
        #[command(subcommand)]
        command: TodoCommands,
    },
}

#[derive(Subcommand)]
pub enum HookCommands {
    /// List discovered hooks, including inactive (non-executable) ones.
    List,
    /// Scaffold a new hook script under the hooks directory.
    Create {
        /// Command pattern the hook should match, e.g. `todo.*`.
        pattern: String,
        /// Stage the hook should run at.
        #[arg(value_parser = ["prevalidate", "preexec", "postexec", "notify"])]
        stage: String,
        /// Script extension, e.g. `sh` or `py`.
        #[arg(default_value = "sh")]
        ext: String,
    },
    /// Run a discovered hook against a synthetic context without registering it.
    Test {
        /// The hook's filename, as shown by `mine hook list`.
        filename: String,
    },
}

#[derive(Subcommand)]
pub enum PluginCommands {
    /// Validate and install a plugin staged at `source_dir`.
    Install {
        source_dir: PathBuf,
    },
    /// Unregister and delete an installed plugin.
    Remove {
        name: String,
    },
    /// List installed plugins.
    List,
    /// Show a single installed plugin's details.
    Info {
        name: String,
        /// Also run the plugin's `health` lifecycle check.
        #[arg(long)]
        check: bool,
    },
}

#[derive(Subcommand)]
pub enum TodoCommands {
    /// Add a task.
    Add {
        text: Vec<String>,
    },
}
