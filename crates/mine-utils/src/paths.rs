//! XDG-aware filesystem layout (§6): hooks directory, plugins root, and the
//! ambient config file's location.

use directories::ProjectDirs;
use std::cell::RefCell;
use std::path::PathBuf;

// Thread-local override so tests don't race on the real `HOME`/XDG env vars.
thread_local! {
    static THREAD_DIRS: RefCell<Option<(PathBuf, PathBuf)>> = const { RefCell::new(None) };
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "mine")
}

/// `(config_dir, data_dir)`, honoring a test-only thread-local override.
fn base_dirs() -> (PathBuf, PathBuf) {
    if let Some(dirs) = THREAD_DIRS.with(|tl| tl.borrow().clone()) {
        return dirs;
    }
    project_dirs()
        .map(|d| (d.config_dir().to_path_buf(), d.data_dir().to_path_buf()))
        .unwrap_or_else(|| (PathBuf::from(".mine/config"), PathBuf::from(".mine/data")))
}

/// `~/.config/mine` (or the platform-appropriate equivalent).
#[must_use]
pub fn config_dir() -> PathBuf {
    base_dirs().0
}

/// `<data-home>/mine` (or the platform-appropriate equivalent).
#[must_use]
pub fn data_dir() -> PathBuf {
    base_dirs().1
}

/// `~/.config/mine/hooks`, the convention-based hook discovery directory (§4.5).
#[must_use]
pub fn hooks_dir() -> PathBuf {
    config_dir().join("hooks")
}

/// `<data-home>/mine/plugins`, the plugin install root (§4.6).
#[must_use]
pub fn plugins_root() -> PathBuf {
    data_dir().join("plugins")
}

/// `~/.config/mine/config.toml`, the ambient configuration file (§3a).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// `mkdir -p`, treating `AlreadyExists` as success.
pub fn ensure_dir_all(path: &std::path::Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Test helper: point `config_dir`/`data_dir` at an isolated temp directory
/// for the current thread's duration. Not part of the crate's public API
/// stability guarantees.
#[cfg(test)]
#[cfg_attr(not(test), allow(dead_code))]
pub fn with_isolated_dirs() -> tempfile::TempDir {
    let td = tempfile::TempDir::new().expect("create temp dirs");
    let config = td.path().join("config");
    let data = td.path().join("data");
    THREAD_DIRS.with(|tl| *tl.borrow_mut() = Some((config, data)));
    td
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_dir_is_nested_under_config_dir() {
        let _guard = with_isolated_dirs();
        assert_eq!(hooks_dir(), config_dir().join("hooks"));
    }

    #[test]
    fn plugins_root_is_nested_under_data_dir() {
        let _guard = with_isolated_dirs();
        assert_eq!(plugins_root(), data_dir().join("plugins"));
    }

    #[test]
    fn ensure_dir_all_is_idempotent() {
        let guard = with_isolated_dirs();
        let target = guard.path().join("a/b/c");
        ensure_dir_all(&target).unwrap();
        ensure_dir_all(&target).unwrap();
        assert!(target.is_dir());
    }
}
