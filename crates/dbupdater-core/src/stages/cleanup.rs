//! The deletion gate.
//!
//! Files are deleted only when the upgrade ran AND the detach succeeded.
//! Anything else leaves them on disk: deleting while attached, or after a
//! failed upgrade, loses the data with no way back.

use std::{
    fmt,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::types::DatabaseFileSet;

/// Why the gate refused to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[strum(serialize = "the upgrade procedure did not succeed")]
    ProcedureFailed,
    #[strum(serialize = "the database was not detached")]
    DetachFailed,
    #[strum(serialize = "neither the upgrade nor the detach succeeded")]
    BothFailed,
}

/// Outcome of evaluating the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupDecision {
    Delete,
    Skip(SkipReason),
}

impl CleanupDecision {
    pub const fn evaluate(procedure_ok: bool, detach_ok: bool) -> Self {
        match (procedure_ok, detach_ok) {
            (true, true) => Self::Delete,
            (false, true) => Self::Skip(SkipReason::ProcedureFailed),
            (true, false) => Self::Skip(SkipReason::DetachFailed),
            (false, false) => Self::Skip(SkipReason::BothFailed),
        }
    }

    pub const fn allows_deletion(self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl fmt::Display for CleanupDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => f.write_str("the upgrade and the detach succeeded"),
            Self::Skip(reason) => fmt::Display::fmt(reason, f),
        }
    }
}

/// Per-file result of a deletion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<PathBuf>,
    pub already_absent: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete both files. Callers must have obtained [`CleanupDecision::Delete`].
///
/// Each file is checked right before its delete; an absent file is skipped,
/// and a failure on one file does not stop the attempt on the other. A file
/// whose existence cannot be determined counts as a failure.
pub fn delete_files(files: &DatabaseFileSet) -> CleanupReport {
    let mut report = CleanupReport::default();

    for (kind, path) in files.files() {
        match remove(path) {
            Ok(Removal::Deleted) => {
                tracing::info!("Deleted {}", path.display());
                report.deleted.push(path.to_path_buf());
            }
            Ok(Removal::Absent) => {
                tracing::debug!("{kind} file {} already absent", path.display());
                report.already_absent.push(path.to_path_buf());
            }
            Err(e) => {
                tracing::warn!("Failed to delete {kind} file {}: {e}", path.display());
                report.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Deleted,
    Absent,
}

fn remove(path: &Path) -> io::Result<Removal> {
    if !path.try_exists()? {
        return Ok(Removal::Absent);
    }
    settle(std::fs::remove_file(path))
}

/// A file that vanished between the check and the delete is absent, not failed.
fn settle(result: io::Result<()>) -> io::Result<Removal> {
    match result {
        Ok(()) => Ok(Removal::Deleted),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Removal::Absent),
        Err(e) => Err(e),
    }
}
