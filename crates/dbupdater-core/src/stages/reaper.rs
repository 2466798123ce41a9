//! Terminate other sessions on the target database before detaching.
//!
//! Best effort: nothing here fails the run. A session that survives will
//! make the detach fail, and the detach is the authoritative check.

use serde::Serialize;

use crate::{
    engine::{release, ConnectionScope, Engine, EngineConnection},
    types::{DatabaseName, SessionId},
};

/// What the reaper found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapSummary {
    pub found: usize,
    pub killed: usize,
    pub failed: Vec<SessionId>,
    /// Set when the session list could not be obtained at all
    pub error: Option<String>,
}

impl ReapSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.error.is_none()
    }
}

/// Kill every session bound to `name` except the reaper's own.
pub async fn close_connections<E>(engine: &E, name: &DatabaseName) -> ReapSummary
where
    E: Engine + ?Sized,
{
    let mut conn = match engine.connect(&ConnectionScope::Admin).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("Cannot close connections to '{name}': {e}");
            return ReapSummary {
                error: Some(e.to_string()),
                ..ReapSummary::default()
            };
        }
    };

    let summary = reap(conn.as_mut(), name).await;
    release(conn).await;
    summary
}

async fn reap(conn: &mut dyn EngineConnection, name: &DatabaseName) -> ReapSummary {
    let sessions = match conn.list_sessions(name).await {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::warn!("Cannot list sessions on '{name}': {e}");
            return ReapSummary {
                error: Some(e.to_string()),
                ..ReapSummary::default()
            };
        }
    };

    let mut summary = ReapSummary {
        found: sessions.len(),
        ..ReapSummary::default()
    };

    for session in sessions {
        match conn.kill_session(session).await {
            Ok(()) => summary.killed += 1,
            Err(e) => {
                tracing::warn!("Failed to kill session {session} on '{name}': {e}");
                summary.failed.push(session);
            }
        }
    }

    tracing::debug!(
        "Closed {}/{} session(s) on '{name}'",
        summary.killed,
        summary.found
    );
    summary
}
