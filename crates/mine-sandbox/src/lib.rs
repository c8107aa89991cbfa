//! Permission-filtered subprocess environment builder for plugins (§4.7).
//!
//! [`build_environment`] is a pure function: the host environment is passed
//! in explicitly rather than read globally, so it can be unit-tested without
//! touching the real process environment.

use mine_manifest::Permissions;
use std::collections::BTreeMap;

/// Config/data directories to expose to plugins that declare `config_read`.
pub struct HostDirs<'a> {
    pub config_dir: &'a str,
    pub data_dir: &'a str,
}

/// Build the environment map for a plugin subprocess from its declared
/// `permissions`, the ambient host environment, and (when `config_read` is
/// set) the caller's config/data directories.
///
/// `PATH` and `HOME` are forwarded unconditionally when present in `host_env`
/// — everything else is opt-in per the manifest's `permissions.env_vars`
/// list. A declared variable absent from `host_env` is skipped with a
/// warning rather than causing an error, since the plugin may tolerate its
/// absence.
#[must_use]
pub fn build_environment(
    permissions: &Permissions,
    host_env: &BTreeMap<String, String>,
    host_dirs: Option<&HostDirs<'_>>,
) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    for always in ["PATH", "HOME"] {
        if let Some(value) = host_env.get(always) {
            env.insert(always.to_string(), value.clone());
        }
    }

    if permissions.config_read
        && let Some(dirs) = host_dirs
    {
        env.insert("MINE_CONFIG_DIR".to_string(), dirs.config_dir.to_string());
        env.insert("MINE_DATA_DIR".to_string(), dirs.data_dir.to_string());
    }

    for var in &permissions.env_vars {
        match host_env.get(var) {
            Some(value) => {
                env.insert(var.clone(), value.clone());
            }
            None => {
                tracing::warn!(env_var = %var, "plugin declared env_vars entry not set in host environment, skipping");
            }
        }
    }

    env
}
