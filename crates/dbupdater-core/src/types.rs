//! Domain types for one lifecycle run.
//!
//! Names are validated newtypes so that nothing unchecked ever reaches the
//! engine. The file set, attachment state and outcome exist only for the
//! duration of a single run.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{Error, Result};

/// Longest identifier the engine accepts (`sysname`).
const MAX_IDENTIFIER_LEN: usize = 128;

// ═══════════════════════════════════════════════════════════════════════════
// NAMES
// ═══════════════════════════════════════════════════════════════════════════

/// Name under which the database is registered with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatabaseName(String);

impl DatabaseName {
    /// Validate and wrap a database name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "database name cannot be empty".to_string(),
            ));
        }

        if name.chars().count() > MAX_IDENTIFIER_LEN {
            return Err(Error::InvalidConfig(format!(
                "database name cannot exceed {MAX_IDENTIFIER_LEN} characters"
            )));
        }

        if name.trim() != name {
            return Err(Error::InvalidConfig(format!(
                "database name '{name}' has leading or trailing whitespace"
            )));
        }

        if name.chars().any(char::is_control) {
            return Err(Error::InvalidConfig(
                "database name cannot contain control characters".to_string(),
            ));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DatabaseName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for DatabaseName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DatabaseName> for String {
    fn from(value: DatabaseName) -> Self {
        value.0
    }
}

/// Stored routine identifier, `name` or `schema.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProcedureName(String);

impl ProcedureName {
    /// Validate and wrap a procedure name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let parts: Vec<&str> = name.split('.').collect();

        if parts.len() > 2 {
            return Err(Error::InvalidConfig(format!(
                "procedure '{name}' must be 'name' or 'schema.name'"
            )));
        }

        if let Some(bad) = parts.iter().find(|part| !is_identifier(part)) {
            return Err(Error::InvalidConfig(format!(
                "procedure '{name}' has an invalid identifier part '{bad}'"
            )));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    valid_start
        && part.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for ProcedureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProcedureName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProcedureName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ProcedureName> for String {
    fn from(value: ProcedureName) -> Self {
        value.0
    }
}

/// Engine session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PHYSICAL FILES
// ═══════════════════════════════════════════════════════════════════════════

/// Which of the two physical files a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    #[strum(serialize = "primary data")]
    Primary,
    #[strum(serialize = "transaction log")]
    Log,
}

/// The well-known file names expected inside the database directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNames {
    pub primary: String,
    pub log: String,
}

impl FileNames {
    /// Engine naming convention: `<db>.mdf` and `<db>_log.ldf`.
    pub fn for_database(name: &DatabaseName) -> Self {
        Self {
            primary: format!("{name}.mdf"),
            log: format!("{name}_log.ldf"),
        }
    }

    /// Both names must be bare file names, not paths.
    pub fn validate(&self) -> Result<()> {
        [(FileKind::Primary, &self.primary), (FileKind::Log, &self.log)]
            .into_iter()
            .try_for_each(|(kind, name)| {
                let is_bare = Path::new(name)
                    .file_name()
                    .is_some_and(|file| file == name.as_str());
                if name.is_empty() || !is_bare {
                    Err(Error::InvalidConfig(format!(
                        "{kind} file name '{name}' must be a plain file name"
                    )))
                } else {
                    Ok(())
                }
            })
    }
}

/// The two physical files of one database, verified to exist when built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseFileSet {
    primary: PathBuf,
    log: PathBuf,
}

impl DatabaseFileSet {
    pub(crate) const fn new(primary: PathBuf, log: PathBuf) -> Self {
        Self { primary, log }
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn log(&self) -> &Path {
        &self.log
    }

    /// Both files, primary first.
    pub fn files(&self) -> [(FileKind, &Path); 2] {
        [(FileKind::Primary, &self.primary), (FileKind::Log, &self.log)]
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RUN STATE
// ═══════════════════════════════════════════════════════════════════════════

/// Registration state of the target database as reported by the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttachmentState {
    #[default]
    Unknown,
    Attached,
    NotAttached,
}

/// Progress milestones of a run, in order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    EnumCount,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    PathResolved,
    FilesVerified,
    Attached,
    ProcedureRan,
    ConnectionsClosed,
    Detached,
    FilesDeleted,
}

impl Stage {
    /// Number of stages, used as the progress total.
    #[allow(clippy::cast_possible_truncation)]
    pub const TOTAL: u32 = Self::COUNT as u32;

    /// 1-based position of the stage.
    pub fn ordinal(self) -> u32 {
        Self::iter()
            .zip(1..)
            .find_map(|(stage, n)| (stage == self).then_some(n))
            .unwrap_or(Self::TOTAL)
    }
}

/// One status update handed to the presentation side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub text: String,
    pub progress_count: u32,
    pub progress_total: u32,
    pub success: bool,
}

impl StatusEvent {
    /// Event before any stage has been reached.
    pub fn starting(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            progress_count: 0,
            progress_total: Stage::TOTAL,
            success: true,
        }
    }

    pub fn at(stage: Stage, text: impl Into<String>, success: bool) -> Self {
        Self {
            text: text.into(),
            progress_count: stage.ordinal(),
            progress_total: Stage::TOTAL,
            success,
        }
    }
}

/// Terminal artifact of a run.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleOutcome {
    /// Last milestone completed, `None` if the directory never resolved
    pub stage_reached: Option<Stage>,
    pub success: bool,
    pub message: String,
    pub attachment: AttachmentState,
    pub files_deleted: bool,
    /// Failure that decided the outcome, if any
    #[serde(skip)]
    pub error: Option<Error>,
}

impl LifecycleOutcome {
    /// Process exit code: 0 on success, otherwise the failure's code.
    pub fn exit_code(&self) -> i32 {
        match (&self.error, self.success) {
            (_, true) => 0,
            (Some(err), false) => err.exit_code(),
            (None, false) => 4,
        }
    }
}
