//! Layered configuration (§3a): built-in defaults, then `config.toml`, then
//! `MINE_*` environment variables, then CLI flags — later layers win.
//!
//! Discovery (`mine-discovery`) and the plugin installer (`mine-manifest`)
//! consult a resolved [`Config`] for their root paths rather than hardcoding
//! `~/.config/mine`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PROTOCOL_VERSIONS: &[&str] = &["1.0.0"];

/// Fully resolved configuration, after all layers have been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub hooks_dir: PathBuf,
    pub plugins_root: PathBuf,
    pub transform_timeout: Duration,
    pub notify_timeout: Duration,
    pub protocol_versions: Vec<String>,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hooks_dir: mine_utils::paths::hooks_dir(),
            plugins_root: mine_utils::paths::plugins_root(),
            transform_timeout: mine_types::Mode::Transform.default_timeout(),
            notify_timeout: mine_types::Mode::Notify.default_timeout(),
            protocol_versions: DEFAULT_PROTOCOL_VERSIONS.iter().map(|s| s.to_string()).collect(),
            verbose: false,
        }
    }
}

impl Config {
    #[must_use]
    pub fn protocol_version_strs(&self) -> Vec<&str> {
        self.protocol_versions.iter().map(String::as_str).collect()
    }
}

/// The `config.toml` shape: every field optional, so an absent file or an
/// absent key simply falls through to the next layer.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    hooks_dir: Option<PathBuf>,
    #[serde(default)]
    plugins_root: Option<PathBuf>,
    #[serde(default)]
    transform_timeout_ms: Option<u64>,
    #[serde(default)]
    notify_timeout_ms: Option<u64>,
    #[serde(default)]
    protocol_versions: Option<Vec<String>>,
    #[serde(default)]
    verbose: Option<bool>,
}

impl FileConfig {
    fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn merge_into(self, config: &mut Config) {
        if let Some(v) = self.hooks_dir {
            config.hooks_dir = v;
        }
        if let Some(v) = self.plugins_root {
            config.plugins_root = v;
        }
        if let Some(v) = self.transform_timeout_ms {
            config.transform_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.notify_timeout_ms {
            config.notify_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.protocol_versions {
            config.protocol_versions = v;
        }
        if let Some(v) = self.verbose {
            config.verbose = v;
        }
    }
}

/// Environment-variable layer: `MINE_HOOKS_DIR`, `MINE_PLUGINS_ROOT`,
/// `MINE_TRANSFORM_TIMEOUT_MS`, `MINE_NOTIFY_TIMEOUT_MS`,
/// `MINE_PROTOCOL_VERSIONS` (comma-separated), `MINE_VERBOSE` (`1`/`true`).
fn merge_env<F>(config: &mut Config, get_var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = get_var("MINE_HOOKS_DIR") {
        config.hooks_dir = PathBuf::from(v);
    }
    if let Some(v) = get_var("MINE_PLUGINS_ROOT") {
        config.plugins_root = PathBuf::from(v);
    }
    if let Some(v) = get_var("MINE_TRANSFORM_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
        config.transform_timeout = Duration::from_millis(v);
    }
    if let Some(v) = get_var("MINE_NOTIFY_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
        config.notify_timeout = Duration::from_millis(v);
    }
    if let Some(v) = get_var("MINE_PROTOCOL_VERSIONS") {
        config.protocol_versions = v.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(v) = get_var("MINE_VERBOSE") {
        config.verbose = matches!(v.as_str(), "1" | "true" | "yes");
    }
}

/// The CLI-flags layer: whatever `clap` parsed, as explicit overrides.
/// `None` means "not passed on this invocation" — fall through to the layer
/// below.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub hooks_dir: Option<PathBuf>,
    pub plugins_root: Option<PathBuf>,
    pub verbose: Option<bool>,
}

impl CliOverrides {
    fn merge_into(self, config: &mut Config) {
        if let Some(v) = self.hooks_dir {
            config.hooks_dir = v;
        }
        if let Some(v) = self.plugins_root {
            config.plugins_root = v;
        }
        if let Some(v) = self.verbose {
            config.verbose = v;
        }
    }
}

/// Load configuration from defaults, an optional file at `file_path` (falls
/// through silently if absent), the process environment, and `cli`, in that
/// order of increasing precedence.
///
/// # Errors
/// Returns an error if `file_path` exists but cannot be read or is not
/// well-formed TOML. A *missing* file is not an error.
pub fn load(file_path: &Path, cli: CliOverrides) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    match std::fs::read_to_string(file_path) {
        Ok(text) => {
            let file_config = FileConfig::parse(&text).map_err(ConfigError::Toml)?;
            file_config.merge_into(&mut config);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %file_path.display(), "no config file found, using defaults");
        }
        Err(e) => return Err(ConfigError::Io(e)),
    }

    merge_env(&mut config, |name| std::env::var(name).ok());
    cli.merge_into(&mut config);

    Ok(config)
}

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_through_to_defaults() {
        let config = load(Path::new("/nonexistent/mine/config.toml"), CliOverrides::default()).unwrap();
        assert_eq!(config.transform_timeout, Duration::from_secs(5));
        assert_eq!(config.notify_timeout, Duration::from_secs(30));
        assert_eq!(config.protocol_versions, vec!["1.0.0".to_string()]);
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "transform_timeout_ms = 1500\nverbose = true\n").unwrap();

        let config = load(&path, CliOverrides::default()).unwrap();
        assert_eq!(config.transform_timeout, Duration::from_millis(1500));
        assert!(config.verbose);
    }

    #[test]
    fn env_layer_overrides_file_layer() {
        let mut config = Config::default();
        let file_config = FileConfig {
            transform_timeout_ms: Some(1000),
            ..Default::default()
        };
        file_config.merge_into(&mut config);
        merge_env(&mut config, |name| {
            (name == "MINE_TRANSFORM_TIMEOUT_MS").then(|| "2000".to_string())
        });
        assert_eq!(config.transform_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn cli_layer_has_final_say() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "hooks_dir = \"/from/file\"\n").unwrap();

        let cli = CliOverrides {
            hooks_dir: Some(PathBuf::from("/from/cli")),
            ..Default::default()
        };
        let config = load(&path, cli).unwrap();
        assert_eq!(config.hooks_dir, PathBuf::from("/from/cli"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml [[[").unwrap();
        assert!(load(&path, CliOverrides::default()).is_err());
    }

    #[test]
    fn protocol_version_strs_borrows_without_allocating_strings() {
        let config = Config::default();
        assert_eq!(config.protocol_version_strs(), vec!["1.0.0"]);
    }
}
