//! Seam between the lifecycle and the database engine.
//!
//! A stage opens exactly one connection through [`Engine::connect`], uses it,
//! and hands it to [`release`] on every exit path. Dropping a connection
//! without closing it must still free the underlying socket, so a stage that
//! is cancelled by its deadline never leaks a session.

use std::fmt;

use async_trait::async_trait;

use crate::{
    types::{DatabaseFileSet, DatabaseName, ProcedureName, SessionId},
    Result,
};

#[cfg(test)]
pub mod testing;

/// Catalog a connection is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionScope {
    /// Engine-wide operations: existence checks, attach/detach, session kills
    Admin,
    /// Queries against the target database itself
    Target(DatabaseName),
}

impl fmt::Display for ConnectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "administrative"),
            Self::Target(name) => write!(f, "database '{name}'"),
        }
    }
}

/// Factory for engine connections.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Open a connection scoped to `scope`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` when the engine is unreachable or rejects
    /// the credentials.
    async fn connect(&self, scope: &ConnectionScope) -> Result<Box<dyn EngineConnection>>;
}

/// One open engine session.
///
/// Every method that takes a name or path must send it as a query parameter,
/// never spliced into statement text.
#[async_trait]
pub trait EngineConnection: Send {
    /// Engine product version, for diagnostics.
    async fn server_version(&mut self) -> Result<String>;

    /// Whether the catalog currently lists `name`.
    async fn database_exists(&mut self, name: &DatabaseName) -> Result<bool>;

    /// Register `files` as database `name`.
    async fn attach_database(&mut self, name: &DatabaseName, files: &DatabaseFileSet)
        -> Result<()>;

    /// Invoke a parameterless stored routine.
    async fn execute_procedure(&mut self, procedure: &ProcedureName) -> Result<()>;

    /// Sessions bound to `name`, excluding this connection's own session.
    async fn list_sessions(&mut self, name: &DatabaseName) -> Result<Vec<SessionId>>;

    /// Forcibly terminate one session.
    async fn kill_session(&mut self, session: SessionId) -> Result<()>;

    /// Unregister `name` without touching its files.
    async fn detach_database(&mut self, name: &DatabaseName) -> Result<()>;

    /// Gracefully end the session. Called at most once.
    async fn close(&mut self) -> Result<()>;
}

/// Close a stage's connection, logging instead of failing if the engine
/// complains. The stage result has already been decided at this point.
pub async fn release(mut conn: Box<dyn EngineConnection>) {
    if let Err(e) = conn.close().await {
        tracing::warn!("Failed to close engine connection cleanly: {e}");
    }
}
