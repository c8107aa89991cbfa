//! Plugin manifest parsing, validation, and on-disk install lifecycle (§4.6).
//!
//! A manifest is a TOML file (`mine-plugin.toml`) describing a plugin's
//! identity, the hooks and commands it contributes, and the permissions it
//! declares. This crate owns the manifest's data model, its validation rules,
//! and the catalog of installed plugins — it does not run plugin processes
//! (see `mine-plugin`) or build their sandboxed environment (see
//! `mine-sandbox`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub use mine_types::ManifestError;
use mine_types::{Mode, Stage};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid regex"));
static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("valid regex"));

const RESERVED_COMMAND_PREFIXES: [&str; 2] = ["hook.", "plugin."];

/// The `[plugin]` section: identity and compatibility metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PluginMeta {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    #[serde(default)]
    pub license: Option<String>,
    pub protocol_version: String,
    #[serde(default)]
    pub min_mine_version: Option<String>,
    /// Entrypoint binary name, relative to the plugin's install directory.
    /// Defaults to `mine-plugin-<name>` when absent.
    #[serde(default)]
    pub entrypoint: Option<String>,
}

impl PluginMeta {
    #[must_use]
    pub fn entrypoint_name(&self) -> String {
        self.entrypoint
            .clone()
            .unwrap_or_else(|| format!("mine-plugin-{}", self.name))
    }
}

/// One `[[hooks]]` entry: a hook this plugin contributes once installed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HookDecl {
    pub command: String,
    pub stage: String,
    pub mode: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// One `[[commands]]` entry: a subcommand this plugin contributes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandDecl {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// The `[permissions]` section: declarative consent surfaced to the user at
/// install time (§4.7 enforces the `env_vars`/`config_read` subset of this;
/// `filesystem`/`network` are informational only in this core).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Permissions {
    #[serde(default)]
    pub network: bool,
    #[serde(default)]
    pub store: bool,
    #[serde(default)]
    pub config_read: bool,
    #[serde(default)]
    pub config_write: bool,
    #[serde(default)]
    pub filesystem: Vec<String>,
    #[serde(default)]
    pub env_vars: Vec<String>,
}

/// A fully parsed `mine-plugin.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    pub plugin: PluginMeta,
    #[serde(default, rename = "hooks")]
    pub hooks: Vec<HookDecl>,
    #[serde(default, rename = "commands")]
    pub commands: Vec<CommandDecl>,
    #[serde(default)]
    pub permissions: Permissions,
}

impl Manifest {
    /// Parse a manifest from its TOML text. Does not validate it — call
    /// [`validate`] with the runtime's supported protocol versions next.
    ///
    /// # Errors
    /// Returns [`ManifestError::Toml`] if the text is not well-formed TOML or
    /// is missing a field with no default (`name`, `version`, `description`,
    /// `author`, `protocol_version`).
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        toml::from_str(text).map_err(|e| ManifestError::Toml(e.to_string()))
    }
}

/// Validate a manifest against the structural rules in §4.6.
///
/// # Errors
/// Returns the first rule violation found, in the order: plugin metadata,
/// then hooks, then commands, then permissions.
pub fn validate(manifest: &Manifest, supported_protocol_versions: &[&str]) -> Result<(), ManifestError> {
    let plugin = &manifest.plugin;
    if plugin.name.is_empty() {
        return Err(ManifestError::MissingField("name".to_string()));
    }
    if !NAME_RE.is_match(&plugin.name) {
        return Err(ManifestError::InvalidName(plugin.name.clone()));
    }
    if plugin.version.is_empty() {
        return Err(ManifestError::MissingField("version".to_string()));
    }
    if plugin.description.is_empty() {
        return Err(ManifestError::MissingField("description".to_string()));
    }
    if plugin.author.is_empty() {
        return Err(ManifestError::MissingField("author".to_string()));
    }
    if plugin.protocol_version.is_empty() {
        return Err(ManifestError::MissingField("protocol_version".to_string()));
    }
    if !supported_protocol_versions.contains(&plugin.protocol_version.as_str()) {
        return Err(ManifestError::UnsupportedProtocolVersion(
            plugin.protocol_version.clone(),
        ));
    }

    for hook in &manifest.hooks {
        let stage = Stage::parse(&hook.stage);
        let mode = match hook.mode.as_str() {
            "transform" => Some(Mode::Transform),
            "notify" => Some(Mode::Notify),
            _ => None,
        };
        let legal = matches!((stage, mode), (Some(s), Some(m)) if m.legal_for(s));
        if !legal {
            return Err(ManifestError::InvalidHookPairing {
                command: hook.command.clone(),
                stage: hook.stage.clone(),
                mode: hook.mode.clone(),
            });
        }
    }

    for command in &manifest.commands {
        if command.name.is_empty() {
            return Err(ManifestError::EmptyCommandName);
        }
        if RESERVED_COMMAND_PREFIXES
            .iter()
            .any(|prefix| command.name.starts_with(prefix))
        {
            return Err(ManifestError::ReservedCommandPrefix(command.name.clone()));
        }
    }

    for path in &manifest.permissions.filesystem {
        if !(path.starts_with('/') || path.starts_with("~/")) {
            return Err(ManifestError::InvalidFilesystemPermission(path.clone()));
        }
    }
    for var in &manifest.permissions.env_vars {
        if !ENV_VAR_RE.is_match(var) {
            return Err(ManifestError::InvalidEnvVarPermission(var.clone()));
        }
    }

    Ok(())
}

/// One entry in the installed-plugin catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub version: String,
    pub description: String,
    pub entrypoint: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct Catalog {
    #[serde(default)]
    plugin: Vec<CatalogEntry>,
}

fn catalog_path(plugins_root: &Path) -> PathBuf {
    plugins_root.join("catalog.toml")
}

async fn read_catalog(plugins_root: &Path) -> Result<Catalog, ManifestError> {
    match tokio::fs::read_to_string(catalog_path(plugins_root)).await {
        Ok(text) => toml::from_str(&text).map_err(|e| ManifestError::Toml(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Catalog::default()),
        Err(e) => Err(ManifestError::Io(e.to_string())),
    }
}

/// Write the catalog via temp-file-plus-rename so a reader never observes a
/// partially written index, mirroring the teacher's atomic-write convention.
async fn write_catalog_atomic(plugins_root: &Path, catalog: &Catalog) -> Result<(), ManifestError> {
    let text = toml::to_string_pretty(catalog).map_err(|e| ManifestError::Toml(e.to_string()))?;
    let tmp_path = plugins_root.join(".catalog.toml.tmp");
    tokio::fs::write(&tmp_path, text)
        .await
        .map_err(|e| ManifestError::Io(e.to_string()))?;
    tokio::fs::rename(&tmp_path, catalog_path(plugins_root))
        .await
        .map_err(|e| ManifestError::Io(e.to_string()))
}

/// Stream-copy `src` to `dst`, never buffering the whole file in memory.
async fn copy_streamed(src: &Path, dst: &Path) -> std::io::Result<()> {
    let mut reader = tokio::io::BufReader::new(tokio::fs::File::open(src).await?);
    let mut writer = tokio::io::BufWriter::new(tokio::fs::File::create(dst).await?);
    tokio::io::copy(&mut reader, &mut writer).await?;
    use tokio::io::AsyncWriteExt;
    writer.flush().await?;
    Ok(())
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o755);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(windows)]
async fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Validate and copy a plugin staged at `source_dir` (containing
/// `mine-plugin.toml` and the entrypoint binary) into
/// `<plugins_root>/<name>/`, then record it in the catalog.
///
/// Does not project the plugin's hooks into a registry; that is the
/// caller's job once this returns the parsed [`Manifest`] (see `mine-plugin`
/// for the hook adapter and `mine-registry` for projection).
///
/// # Errors
/// Returns [`ManifestError::Toml`]/validation variants if the manifest is
/// malformed or fails a rule in [`validate`] — in that case nothing is
/// copied and the catalog is untouched. Returns [`ManifestError::Io`] if the
/// manifest or binary cannot be read, or the destination cannot be written.
pub async fn install(
    source_dir: &Path,
    plugins_root: &Path,
    supported_protocol_versions: &[&str],
) -> Result<Manifest, ManifestError> {
    let manifest_text = tokio::fs::read_to_string(source_dir.join("mine-plugin.toml"))
        .await
        .map_err(|e| ManifestError::Io(e.to_string()))?;
    let manifest = Manifest::parse(&manifest_text)?;
    validate(&manifest, supported_protocol_versions)?;

    let dest_dir = plugins_root.join(&manifest.plugin.name);
    tokio::fs::create_dir_all(&dest_dir)
        .await
        .map_err(|e| ManifestError::Io(e.to_string()))?;

    copy_streamed(
        &source_dir.join("mine-plugin.toml"),
        &dest_dir.join("mine-plugin.toml"),
    )
    .await
    .map_err(|e| ManifestError::Io(e.to_string()))?;

    let entrypoint = manifest.plugin.entrypoint_name();
    let dest_binary = dest_dir.join(&entrypoint);
    copy_streamed(&source_dir.join(&entrypoint), &dest_binary)
        .await
        .map_err(|e| ManifestError::Io(e.to_string()))?;
    mark_executable(&dest_binary)
        .await
        .map_err(|e| ManifestError::Io(e.to_string()))?;

    let mut catalog = read_catalog(plugins_root).await?;
    catalog.plugin.retain(|p| p.name != manifest.plugin.name);
    catalog.plugin.push(CatalogEntry {
        name: manifest.plugin.name.clone(),
        version: manifest.plugin.version.clone(),
        description: manifest.plugin.description.clone(),
        entrypoint,
    });
    write_catalog_atomic(plugins_root, &catalog).await?;

    Ok(manifest)
}

/// Remove a plugin's directory and catalog entry. Idempotent: removing an
/// already-absent plugin is not an error.
///
/// # Errors
/// Returns [`ManifestError::Io`] if the directory exists but cannot be
/// removed, or the catalog cannot be rewritten.
pub async fn remove(name: &str, plugins_root: &Path) -> Result<(), ManifestError> {
    let dest_dir = plugins_root.join(name);
    if dest_dir.exists() {
        tokio::fs::remove_dir_all(&dest_dir)
            .await
            .map_err(|e| ManifestError::Io(e.to_string()))?;
    }

    let mut catalog = read_catalog(plugins_root).await?;
    let before = catalog.plugin.len();
    catalog.plugin.retain(|p| p.name != name);
    if catalog.plugin.len() != before {
        write_catalog_atomic(plugins_root, &catalog).await?;
    }
    Ok(())
}

/// List installed plugins. Read-only; missing catalog yields an empty list.
///
/// # Errors
/// Returns [`ManifestError`] if the catalog exists but cannot be parsed.
pub async fn list(plugins_root: &Path) -> Result<Vec<CatalogEntry>, ManifestError> {
    Ok(read_catalog(plugins_root).await?.plugin)
}

/// Look up one installed plugin's catalog entry by name.
///
/// # Errors
/// Returns [`ManifestError`] if the catalog exists but cannot be parsed.
pub async fn info(name: &str, plugins_root: &Path) -> Result<Option<CatalogEntry>, ManifestError> {
    Ok(list(plugins_root)
        .await?
        .into_iter()
        .find(|p| p.name == name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUPPORTED: &[&str] = &["1.0.0"];

    fn valid_toml() -> &'static str {
        r#"
            [plugin]
            name = "todo-sync"
            version = "0.1.0"
            description = "Syncs todos to a remote"
            author = "jane"
            protocol_version = "1.0.0"

            [[hooks]]
            command = "todo.*"
            stage = "postexec"
            mode = "transform"

            [[commands]]
            name = "todo-sync-status"
            description = "Show sync status"

            [permissions]
            network = true
            env_vars = ["TODO_SYNC_TOKEN"]
            filesystem = ["~/.todo-sync"]
        "#
    }

    #[test]
    fn parses_full_manifest() {
        let manifest = Manifest::parse(valid_toml()).unwrap();
        assert_eq!(manifest.plugin.name, "todo-sync");
        assert_eq!(manifest.hooks.len(), 1);
        assert_eq!(manifest.commands.len(), 1);
        assert!(manifest.permissions.network);
    }

    #[test]
    fn entrypoint_defaults_from_name() {
        let manifest = Manifest::parse(valid_toml()).unwrap();
        assert_eq!(manifest.plugin.entrypoint_name(), "mine-plugin-todo-sync");
    }

    #[test]
    fn validate_accepts_well_formed_manifest() {
        let manifest = Manifest::parse(valid_toml()).unwrap();
        assert!(validate(&manifest, SUPPORTED).is_ok());
    }

    #[test]
    fn validate_rejects_non_kebab_case_name() {
        let mut manifest = Manifest::parse(valid_toml()).unwrap();
        manifest.plugin.name = "Todo_Sync".to_string();
        assert!(matches!(
            validate(&manifest, SUPPORTED),
            Err(ManifestError::InvalidName(_))
        ));
    }

    #[test]
    fn validate_rejects_unsupported_protocol_version() {
        let mut manifest = Manifest::parse(valid_toml()).unwrap();
        manifest.plugin.protocol_version = "9.9.9".to_string();
        assert!(matches!(
            validate(&manifest, SUPPORTED),
            Err(ManifestError::UnsupportedProtocolVersion(_))
        ));
    }

    #[test]
    fn validate_rejects_illegal_hook_stage_mode_pairing() {
        let mut manifest = Manifest::parse(valid_toml()).unwrap();
        manifest.hooks[0].stage = "preexec".to_string();
        manifest.hooks[0].mode = "notify".to_string();
        assert!(matches!(
            validate(&manifest, SUPPORTED),
            Err(ManifestError::InvalidHookPairing { .. })
        ));
    }

    #[test]
    fn validate_rejects_reserved_command_prefix() {
        let mut manifest = Manifest::parse(valid_toml()).unwrap();
        manifest.commands[0].name = "hook.sneaky".to_string();
        assert!(matches!(
            validate(&manifest, SUPPORTED),
            Err(ManifestError::ReservedCommandPrefix(_))
        ));
    }

    #[test]
    fn validate_rejects_relative_filesystem_permission() {
        let mut manifest = Manifest::parse(valid_toml()).unwrap();
        manifest.permissions.filesystem = vec!["relative/path".to_string()];
        assert!(matches!(
            validate(&manifest, SUPPORTED),
            Err(ManifestError::InvalidFilesystemPermission(_))
        ));
    }

    #[test]
    fn validate_rejects_malformed_env_var_permission() {
        let mut manifest = Manifest::parse(valid_toml()).unwrap();
        manifest.permissions.env_vars = vec!["not-a-valid-name".to_string()];
        assert!(matches!(
            validate(&manifest, SUPPORTED),
            Err(ManifestError::InvalidEnvVarPermission(_))
        ));
    }

    fn stage_file(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[tokio::test]
    async fn install_copies_manifest_and_binary_and_records_catalog() {
        let staging = tempfile::tempdir().unwrap();
        let plugins_root = tempfile::tempdir().unwrap();
        stage_file(staging.path(), "mine-plugin.toml", valid_toml());
        stage_file(staging.path(), "mine-plugin-todo-sync", "#!/bin/sh\necho ok\n");

        let manifest = install(staging.path(), plugins_root.path(), SUPPORTED)
            .await
            .unwrap();
        assert_eq!(manifest.plugin.name, "todo-sync");

        let installed_dir = plugins_root.path().join("todo-sync");
        assert!(installed_dir.join("mine-plugin.toml").exists());
        assert!(installed_dir.join("mine-plugin-todo-sync").exists());

        let entries = list(plugins_root.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "todo-sync");
    }

    #[tokio::test]
    async fn install_rejects_invalid_manifest_and_copies_nothing() {
        let staging = tempfile::tempdir().unwrap();
        let plugins_root = tempfile::tempdir().unwrap();
        let mut bad = valid_toml().replace("stage = \"postexec\"", "stage = \"preexec\"");
        bad = bad.replace("mode = \"transform\"", "mode = \"notify\"");
        stage_file(staging.path(), "mine-plugin.toml", &bad);
        stage_file(staging.path(), "mine-plugin-todo-sync", "#!/bin/sh\necho ok\n");

        let result = install(staging.path(), plugins_root.path(), SUPPORTED).await;
        assert!(matches!(result, Err(ManifestError::InvalidHookPairing { .. })));
        assert!(!plugins_root.path().join("todo-sync").exists());
        assert!(list(plugins_root.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let plugins_root = tempfile::tempdir().unwrap();
        remove("never-installed", plugins_root.path()).await.unwrap();
    }

    #[tokio::test]
    async fn remove_deletes_directory_and_catalog_entry() {
        let staging = tempfile::tempdir().unwrap();
        let plugins_root = tempfile::tempdir().unwrap();
        stage_file(staging.path(), "mine-plugin.toml", valid_toml());
        stage_file(staging.path(), "mine-plugin-todo-sync", "#!/bin/sh\necho ok\n");
        install(staging.path(), plugins_root.path(), SUPPORTED)
            .await
            .unwrap();

        remove("todo-sync", plugins_root.path()).await.unwrap();
        assert!(!plugins_root.path().join("todo-sync").exists());
        assert!(list(plugins_root.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn info_finds_installed_plugin_by_name() {
        let staging = tempfile::tempdir().unwrap();
        let plugins_root = tempfile::tempdir().unwrap();
        stage_file(staging.path(), "mine-plugin.toml", valid_toml());
        stage_file(staging.path(), "mine-plugin-todo-sync", "#!/bin/sh\necho ok\n");
        install(staging.path(), plugins_root.path(), SUPPORTED)
            .await
            .unwrap();

        let entry = info("todo-sync", plugins_root.path()).await.unwrap();
        assert_eq!(entry.unwrap().version, "0.1.0");
        assert!(info("nope", plugins_root.path()).await.unwrap().is_none());
    }
}
