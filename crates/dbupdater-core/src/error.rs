//! Error types for dbupdater with categorization:
//!
//! - **Precondition errors**: unresolvable directory, missing physical files (exit code 1)
//! - **Validation errors**: configuration and names (exit code 1)
//! - **System errors**: local IO (exit code 2)
//! - **Connectivity errors**: engine unreachable, credentials rejected (exit code 3)
//! - **Execution errors**: engine rejected an operation, stage deadline, state (exit code 4)

use std::path::PathBuf;

use thiserror::Error;

use crate::types::FileKind;

/// Core error type for lifecycle operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Configuration value is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file or value could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The directory holding the database files could not be determined
    #[error("Cannot resolve database directory: {0}")]
    PathUnresolved(String),

    /// One of the two physical database files is absent
    #[error("Cannot find {kind} file: {}", path.display())]
    MissingFile { kind: FileKind, path: PathBuf },

    /// Local IO failure (trace file, file deletion)
    #[error("IO error: {0}")]
    IoError(String),

    /// A connection to the engine could not be opened
    #[error("Cannot connect to the {scope} context: {message}")]
    Connection { scope: String, message: String },

    /// The engine rejected an operation
    #[error("{operation} failed: {message}")]
    Engine { operation: String, message: String },

    /// A stage did not complete before its deadline
    #[error("{stage} did not finish within {seconds}s")]
    StageTimeout { stage: String, seconds: u64 },

    /// The controller attempted a transition its state machine forbids
    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl Error {
    /// Create a connectivity error for the given connection scope.
    pub fn connection(scope: impl ToString, message: impl Into<String>) -> Self {
        Self::Connection {
            scope: scope.to_string(),
            message: message.into(),
        }
    }

    /// Create an engine error for a rejected operation.
    pub fn engine(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// True for failures detected before any engine contact.
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::PathUnresolved(_) | Self::MissingFile { .. })
    }

    /// Returns the process exit code for this error.
    ///
    /// Exit code scheme:
    /// - 1: Precondition or validation failure (nothing touched)
    /// - 2: Local IO failure
    /// - 3: Engine unreachable
    /// - 4: Engine rejected an operation, deadline hit, or invalid state
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig(_)
            | Self::ParseError(_)
            | Self::PathUnresolved(_)
            | Self::MissingFile { .. } => 1,
            Self::IoError(_) => 2,
            Self::Connection { .. } => 3,
            Self::Engine { .. } | Self::StageTimeout { .. } | Self::InvalidTransition { .. } => 4,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::ParseError(format!("Failed to parse config: {err}"))
    }
}

/// Result type alias for dbupdater-core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_missing_file() {
        let err = Error::MissingFile {
            kind: FileKind::Log,
            path: PathBuf::from("/data/Sample_log.ldf"),
        };
        assert_eq!(
            err.to_string(),
            "Cannot find transaction log file: /data/Sample_log.ldf"
        );
    }

    #[test]
    fn test_error_display_engine() {
        let err = Error::engine("Attach", "file is in use");
        assert_eq!(err.to_string(), "Attach failed: file is in use");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::IoError(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_precondition_classification() {
        assert!(Error::PathUnresolved("no dir".into()).is_precondition());
        assert!(Error::MissingFile {
            kind: FileKind::Primary,
            path: PathBuf::from("x.mdf"),
        }
        .is_precondition());
        assert!(!Error::connection("admin", "refused").is_precondition());
        assert!(!Error::engine("Detach", "in use").is_precondition());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::InvalidConfig("x".into()).exit_code(), 1);
        assert_eq!(Error::PathUnresolved("x".into()).exit_code(), 1);
        assert_eq!(Error::connection("admin", "x").exit_code(), 3);
        assert_eq!(Error::engine("Detach", "x").exit_code(), 4);
        assert_eq!(
            Error::StageTimeout {
                stage: "Detach".into(),
                seconds: 5
            }
            .exit_code(),
            4
        );
    }
}
