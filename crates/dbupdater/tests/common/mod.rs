//! Common test helpers for integration tests
//!
//! The `TestHarness` isolates each test: a fresh database directory, a config
//! file pointing at an engine that is never there, and a clean environment so
//! neither the developer's global config nor `DBUPDATER_*` variables leak in.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Nothing listens on port 1; connection attempts fail fast.
pub const UNREACHABLE_ENGINE: &str =
    "server=tcp:127.0.0.1,1;User Id=sa;Password=unused;TrustServerCertificate=true";

const ENV_VARS: [&str; 6] = [
    "DBUPDATER_DATABASE_DIR",
    "DBUPDATER_DATABASE",
    "DBUPDATER_PROCEDURE",
    "DBUPDATER_CONNECTION",
    "DBUPDATER_STAGE_TIMEOUT_SECS",
    "DBUPDATER_LOGGING",
];

pub struct TestHarness {
    _temp_dir: TempDir,
    pub home: PathBuf,
    pub db_dir: PathBuf,
    pub config_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().join("home");
        let db_dir = temp_dir.path().join("Database");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::create_dir_all(&db_dir).unwrap();

        let config_path = temp_dir.path().join("dbupdater.toml");
        std::fs::write(
            &config_path,
            format!("database = \"Sample\"\nconnection = \"{UNREACHABLE_ENGINE}\"\n"),
        )
        .unwrap();

        Self {
            _temp_dir: temp_dir,
            home,
            db_dir,
            config_path,
        }
    }

    /// Create both database files.
    pub fn with_files(self) -> Self {
        self.write_file("Sample.mdf");
        self.write_file("Sample_log.ldf");
        self
    }

    pub fn write_file(&self, name: &str) {
        std::fs::write(self.db_dir.join(name), b"pages").unwrap();
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.db_dir.join(name)
    }

    /// `dbupdater --config <harness config> --database-dir <harness dir>`
    pub fn cmd(&self) -> Command {
        let mut cmd = self.bare_cmd();
        cmd.arg("--config")
            .arg(&self.config_path)
            .arg("--database-dir")
            .arg(&self.db_dir);
        cmd
    }

    /// The binary in an isolated environment, without any arguments.
    pub fn bare_cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("dbupdater").unwrap();
        cmd.env("HOME", &self.home)
            .env("XDG_CONFIG_HOME", self.home.join(".config"))
            .env("APPDATA", &self.home)
            .env_remove("RUST_LOG");
        for var in ENV_VARS {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }
}
