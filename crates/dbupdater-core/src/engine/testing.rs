//! Scripted in-memory engine for lifecycle tests.
//!
//! Keeps a tiny catalog (is the database attached?) and records every call,
//! so tests can assert both outcomes and ordering.

#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use super::{ConnectionScope, Engine, EngineConnection};
use crate::{
    types::{DatabaseFileSet, DatabaseName, ProcedureName, SessionId},
    Error, Result,
};

/// Behaviour the fake engine should exhibit.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub unreachable: bool,
    pub attached: bool,
    pub attach_error: Option<String>,
    pub procedure_error: Option<String>,
    pub procedure_delay: Option<Duration>,
    pub sessions: Vec<SessionId>,
    pub list_sessions_error: Option<String>,
    pub kill_errors: Vec<SessionId>,
    pub detach_error: Option<String>,
}

/// A recorded engine interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(ConnectionScope),
    ServerVersion,
    DatabaseExists(String),
    Attach(String),
    ExecuteProcedure(String),
    ListSessions(String),
    KillSession(SessionId),
    Detach(String),
    Close,
}

#[derive(Debug, Default)]
struct State {
    script: Script,
    calls: Vec<Call>,
    open: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<Mutex<State>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                script,
                ..State::default()
            })),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn connections_opened(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Connect(_)))
            .count()
    }

    /// Connections opened but never closed or dropped.
    pub fn connections_open(&self) -> usize {
        self.state.lock().unwrap().open
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().unwrap().script.attached
    }

    /// Position of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(pred)
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn connect(&self, scope: &ConnectionScope) -> Result<Box<dyn EngineConnection>> {
        self.record(Call::Connect(scope.clone()));
        let mut state = self.state.lock().unwrap();
        if state.script.unreachable {
            return Err(Error::connection(scope, "server was not found"));
        }
        state.open += 1;
        drop(state);
        Ok(Box::new(ScriptedConnection {
            engine: self.clone(),
            closed: false,
        }))
    }
}

struct ScriptedConnection {
    engine: ScriptedEngine,
    closed: bool,
}

impl ScriptedConnection {
    fn script(&self) -> Script {
        self.engine.state.lock().unwrap().script.clone()
    }

    fn set_attached(&self, attached: bool) {
        self.engine.state.lock().unwrap().script.attached = attached;
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        if !self.closed {
            if let Ok(mut state) = self.engine.state.lock() {
                state.open = state.open.saturating_sub(1);
            }
        }
    }
}

#[async_trait]
impl EngineConnection for ScriptedConnection {
    async fn server_version(&mut self) -> Result<String> {
        self.engine.record(Call::ServerVersion);
        Ok("16.0.1000.6".to_string())
    }

    async fn database_exists(&mut self, name: &DatabaseName) -> Result<bool> {
        self.engine
            .record(Call::DatabaseExists(name.as_str().to_string()));
        Ok(self.script().attached)
    }

    async fn attach_database(
        &mut self,
        name: &DatabaseName,
        _files: &DatabaseFileSet,
    ) -> Result<()> {
        self.engine.record(Call::Attach(name.as_str().to_string()));
        let script = self.script();
        if script.attached {
            return Err(Error::engine(
                "Attach",
                format!("Database '{name}' already exists"),
            ));
        }
        match script.attach_error {
            Some(msg) => Err(Error::engine("Attach", msg)),
            None => {
                self.set_attached(true);
                Ok(())
            }
        }
    }

    async fn execute_procedure(&mut self, procedure: &ProcedureName) -> Result<()> {
        self.engine
            .record(Call::ExecuteProcedure(procedure.as_str().to_string()));
        let script = self.script();
        if let Some(delay) = script.procedure_delay {
            tokio::time::sleep(delay).await;
        }
        script
            .procedure_error
            .map_or(Ok(()), |msg| Err(Error::engine("Stored procedure", msg)))
    }

    async fn list_sessions(&mut self, name: &DatabaseName) -> Result<Vec<SessionId>> {
        self.engine
            .record(Call::ListSessions(name.as_str().to_string()));
        let script = self.script();
        script
            .list_sessions_error
            .map_or(Ok(script.sessions), |msg| {
                Err(Error::engine("List sessions", msg))
            })
    }

    async fn kill_session(&mut self, session: SessionId) -> Result<()> {
        self.engine.record(Call::KillSession(session));
        if self.script().kill_errors.contains(&session) {
            return Err(Error::engine(
                "Kill session",
                format!("Process ID {session} is not an active process ID"),
            ));
        }
        Ok(())
    }

    async fn detach_database(&mut self, name: &DatabaseName) -> Result<()> {
        self.engine.record(Call::Detach(name.as_str().to_string()));
        match self.script().detach_error {
            Some(msg) => Err(Error::engine("Detach", msg)),
            None => {
                self.set_attached(false);
                Ok(())
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.engine.record(Call::Close);
        if !self.closed {
            self.closed = true;
            let mut state = self.engine.state.lock().unwrap();
            state.open = state.open.saturating_sub(1);
        }
        Ok(())
    }
}
