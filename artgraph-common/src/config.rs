//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting that can come from several places:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never prevents startup: a warning is logged
//! and compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the root folder (preferred spelling)
pub const ENV_ROOT_FOLDER: &str = "ARTGRAPH_ROOT_FOLDER";
/// Environment variable naming the root folder (short spelling)
pub const ENV_ROOT: &str = "ARTGRAPH_ROOT";
/// Environment variable naming an explicit TOML config file
pub const ENV_CONFIG: &str = "ARTGRAPH_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "artgraph.db";

/// Platform-dependent compiled defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub bind_address: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("artgraph"))
            .unwrap_or_else(|| PathBuf::from("./artgraph_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
            bind_address: "127.0.0.1:5790".to_string(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing directive, e.g. "info" or "artgraph_discovery=debug"
    pub level: Option<String>,
}

/// `[sources.<kind>]` section
///
/// One shape for every upstream; each adapter reads the fields it understands
/// and applies its own defaults for the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    /// Minimum spacing between calls to this upstream
    pub delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    /// Ceiling on secondary entities processed per invocation
    pub max_entities: Option<usize>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub release_detail_limit: Option<usize>,
}

/// `[pipeline]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub max_candidates: Option<usize>,
    pub fanout_concurrency: Option<usize>,
    pub max_members_per_result: Option<usize>,
    pub cache_window_hours: Option<i64>,
}

/// Contents of `<module>.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub shared_secret: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Keyed by source kind tag ("ai", "discography", "registry", ...)
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSettings>,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl TomlConfig {
    /// Settings for one source kind, empty when the section is absent
    pub fn source(&self, kind: &str) -> SourceSettings {
        self.sources.get(kind).cloned().unwrap_or_default()
    }
}

/// Default config file location: `<config_dir>/artgraph/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("artgraph").join(format!("{}.toml", module_name)))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate and load the module's TOML file, degrading to defaults
///
/// Priority: explicit path → `ARTGRAPH_CONFIG` → default location.
pub fn load_or_default(module_name: &str, explicit: Option<&Path>) -> TomlConfig {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from))
        .or_else(|| default_config_path(module_name));

    let Some(path) = path else {
        warn!("No config directory available; using compiled defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        warn!("Config file {} not found; using defaults", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}; using compiled defaults", e);
            TomlConfig::default()
        }
    }
}

/// Root folder resolution
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        debug!(module = %self.module_name, "Using compiled default root folder");
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

/// Resolve a credential with Database → ENV → TOML priority
///
/// Blank values are treated as absent. Returns the value and the tier it came from.
pub fn resolve_layered(
    db_value: Option<String>,
    env_var: &str,
    toml_value: Option<&String>,
) -> Option<(String, &'static str)> {
    if let Some(value) = db_value.filter(|v| is_valid_key(v)) {
        return Some((value, "database"));
    }
    if let Some(value) = std::env::var(env_var).ok().filter(|v| is_valid_key(v)) {
        return Some((value, "environment"));
    }
    toml_value
        .filter(|v| is_valid_key(v))
        .map(|v| (v.clone(), "TOML"))
}

/// Validate a credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/srv/artgraph"
            bind_address = "0.0.0.0:8080"
            shared_secret = "s3cret"

            [logging]
            level = "debug"

            [sources.registry]
            base_url = "http://localhost:9000/ws/2"
            delay_ms = 1500

            [pipeline]
            max_candidates = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/artgraph")));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.source("registry").delay_ms, Some(1500));
        assert_eq!(config.source("ai"), SourceSettings::default());
        assert_eq!(config.pipeline.max_candidates, Some(4));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }
}
