//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: ~/.config/dbupdater/config.toml (platform equivalent)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables: DBUPDATER_*
//! 5. CLI flags (applied by the binary)
//!
//! # Example Config
//!
//! ```toml
//! database_dir = 'C:\Users\Public\Documents\PRO Landscape\Database'
//! database = "DrafixUpdate"
//! procedure = "dbo.USP_Upgrade_26_0"
//! connection = 'server=tcp:localhost\SQLEXPRESS;IntegratedSecurity=true;TrustServerCertificate=true'
//! stage_timeout_secs = 600
//!
//! [files]
//! primary = "DrafixUpdate.mdf"
//! log = "DrafixUpdate_log.ldf"
//!
//! [trace]
//! enabled = true
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    lifecycle::UpgradePlan,
    types::{DatabaseName, FileNames, ProcedureName},
    Error, Result,
};

/// Where the database files live when nothing is configured, below the
/// shared documents folder.
const DEFAULT_DIR_SUFFIX: [&str; 2] = ["PRO Landscape", "Database"];

/// Installer settings key under `HKEY_LOCAL_MACHINE`.
#[cfg_attr(not(windows), allow(dead_code))]
const REGISTRY_SETTINGS_KEY: &str = r"Software\Drafix\DrafixUtil\26.0\Settings";
#[cfg_attr(not(windows), allow(dead_code))]
const REGISTRY_DATABASE_PATH: &str = "DatabasePath";

/// Zero-argument query for the directory holding the database files.
pub trait PathSource: Send + Sync {
    fn database_dir(&self) -> Result<PathBuf>;
}

impl PathSource for PathBuf {
    fn database_dir(&self) -> Result<PathBuf> {
        Ok(self.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the two files; `None` means the documented default
    pub database_dir: Option<PathBuf>,
    pub database: String,
    pub procedure: String,
    /// ADO-style connection string for the engine
    pub connection: String,
    /// Per-stage deadline in seconds, 0 disables it
    pub stage_timeout_secs: u64,
    /// File names, derived from the database name when absent
    pub files: Option<FileNames>,
    pub trace: TraceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceConfig {
    pub enabled: bool,
    /// File name created inside the database directory
    pub file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_dir: None,
            database: "DrafixUpdate".to_string(),
            procedure: "dbo.USP_Upgrade_26_0".to_string(),
            connection:
                r"server=tcp:localhost\SQLEXPRESS;IntegratedSecurity=true;TrustServerCertificate=true"
                    .to_string(),
            stage_timeout_secs: 0,
            files: None,
            trace: TraceConfig::default(),
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file_name: "DatabaseUpdaterLog.txt".to_string(),
        }
    }
}

/// A config file: every key optional, only present keys override.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database_dir: Option<PathBuf>,
    database: Option<String>,
    procedure: Option<String>,
    connection: Option<String>,
    stage_timeout_secs: Option<u64>,
    files: Option<FileNames>,
    trace: Option<TraceFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TraceFile {
    enabled: Option<bool>,
    file_name: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════

impl Config {
    /// Load configuration from all sources
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - A config file is malformed TOML or has unknown keys
    /// - The explicit config file does not exist
    /// - An environment variable has an invalid value
    /// - The merged values fail validation
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(global_path) = global_config_path() {
            if global_path.exists() {
                config.merge(load_toml_file(&global_path).await?);
            }
        }

        if let Some(path) = explicit {
            config.merge(load_toml_file(path).await?);
        }

        config.apply_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    fn merge(&mut self, other: ConfigFile) {
        if let Some(dir) = other.database_dir {
            self.database_dir = Some(dir);
        }
        if let Some(database) = other.database {
            self.database = database;
        }
        if let Some(procedure) = other.procedure {
            self.procedure = procedure;
        }
        if let Some(connection) = other.connection {
            self.connection = connection;
        }
        if let Some(secs) = other.stage_timeout_secs {
            self.stage_timeout_secs = secs;
        }
        if let Some(files) = other.files {
            self.files = Some(files);
        }
        if let Some(trace) = other.trace {
            if let Some(enabled) = trace.enabled {
                self.trace.enabled = enabled;
            }
            if let Some(file_name) = trace.file_name {
                self.trace.file_name = file_name;
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if environment variable values are invalid
    fn apply_env_vars(&mut self) -> Result<()> {
        // DBUPDATER_DATABASE_DIR
        if let Ok(value) = std::env::var("DBUPDATER_DATABASE_DIR") {
            self.database_dir = Some(PathBuf::from(value));
        }

        // DBUPDATER_DATABASE
        if let Ok(value) = std::env::var("DBUPDATER_DATABASE") {
            self.database = value;
        }

        // DBUPDATER_PROCEDURE
        if let Ok(value) = std::env::var("DBUPDATER_PROCEDURE") {
            self.procedure = value;
        }

        // DBUPDATER_CONNECTION
        if let Ok(value) = std::env::var("DBUPDATER_CONNECTION") {
            self.connection = value;
        }

        // DBUPDATER_STAGE_TIMEOUT_SECS
        if let Ok(value) = std::env::var("DBUPDATER_STAGE_TIMEOUT_SECS") {
            self.stage_timeout_secs = value.parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid DBUPDATER_STAGE_TIMEOUT_SECS value: {e}"))
            })?;
        }

        // DBUPDATER_LOGGING
        if let Ok(value) = std::env::var("DBUPDATER_LOGGING") {
            self.trace.enabled = value.parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid DBUPDATER_LOGGING value: {e}"))
            })?;
        }

        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if a name is invalid or the connection string is empty
    pub fn validate(&self) -> Result<()> {
        self.upgrade_plan()?;

        if self.connection.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "connection string cannot be empty".to_string(),
            ));
        }

        let trace_name = Path::new(&self.trace.file_name);
        if trace_name.file_name().is_none() || trace_name.components().count() != 1 {
            return Err(Error::InvalidConfig(format!(
                "trace file name '{}' must be a plain file name",
                self.trace.file_name
            )));
        }

        Ok(())
    }

    /// Validated names for one run.
    pub fn upgrade_plan(&self) -> Result<UpgradePlan> {
        let database = DatabaseName::new(self.database.clone())?;
        let procedure = ProcedureName::new(self.procedure.clone())?;
        let files = self
            .files
            .clone()
            .unwrap_or_else(|| FileNames::for_database(&database));
        files.validate()?;
        Ok(UpgradePlan::new(database, procedure, files))
    }

    pub const fn stage_timeout(&self) -> Option<Duration> {
        match self.stage_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Trace file location inside `dir`.
    pub fn trace_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.trace.file_name)
    }
}

impl PathSource for Config {
    fn database_dir(&self) -> Result<PathBuf> {
        match &self.database_dir {
            Some(dir) if dir.as_os_str().is_empty() => Err(Error::PathUnresolved(
                "configured database directory is empty".to_string(),
            )),
            Some(dir) => Ok(dir.clone()),
            None => default_database_dir(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════

/// Installation fallback when no directory is configured: the path the
/// installer records in the registry, else the shared documents folder.
pub fn default_database_dir() -> Result<PathBuf> {
    choose_database_dir(registry_database_dir(), documents_dir())
}

/// Registry value wins when present and non-empty.
fn choose_database_dir(registry: Option<PathBuf>, documents: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = registry.filter(|dir| !dir.as_os_str().is_empty()) {
        return Ok(dir);
    }

    let documents = documents.ok_or_else(|| {
        Error::PathUnresolved(
            "no database directory configured and no documents folder found".to_string(),
        )
    })?;

    Ok(DEFAULT_DIR_SUFFIX
        .iter()
        .fold(documents, |path, part| path.join(part)))
}

/// `%PUBLIC%\Documents` on Windows, the user's documents folder elsewhere.
fn documents_dir() -> Option<PathBuf> {
    std::env::var_os("PUBLIC")
        .map(|public| PathBuf::from(public).join("Documents"))
        .or_else(|| {
            directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
        })
}

#[cfg(windows)]
fn registry_database_dir() -> Option<PathBuf> {
    use winreg::{enums::HKEY_LOCAL_MACHINE, RegKey};

    let value = RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey(REGISTRY_SETTINGS_KEY)
        .and_then(|key| key.get_value::<String, _>(REGISTRY_DATABASE_PATH));

    match value {
        Ok(path) => Some(PathBuf::from(path)),
        Err(e) => {
            tracing::debug!("No database path in HKLM\\{REGISTRY_SETTINGS_KEY}: {e}");
            None
        }
    }
}

#[cfg(not(windows))]
const fn registry_database_dir() -> Option<PathBuf> {
    None
}

/// Get path to global config file
fn global_config_path() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "dbupdater")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
        .ok_or_else(|| Error::IoError("Failed to determine global config directory".to_string()))
}

/// Load a TOML file into a partial config
///
/// # Errors
///
/// Returns error if:
/// - File cannot be read
/// - TOML is malformed
async fn load_toml_file(path: &Path) -> Result<ConfigFile> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::IoError(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    toml::from_str(&content)
        .map_err(|e| Error::ParseError(format!("Failed to parse config: {}: {e}", path.display())))
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
