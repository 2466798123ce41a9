//! SQL Server engine driver over TDS (`tiberius`).
//!
//! Every name and path travels as a statement parameter. Statements that
//! need an identifier (attach, kill) build their text on the server from
//! those parameters with `QUOTENAME`/`REPLACE`, so nothing supplied by the
//! caller is ever spliced into SQL here.

use std::time::Duration;

use async_trait::async_trait;
use dbupdater_core::{
    ConnectionScope, DatabaseFileSet, DatabaseName, Engine, EngineConnection, Error,
    ProcedureName, Result, SessionId,
};
use tiberius::{Client, Config as TdsConfig, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type TdsClient = Client<Compat<TcpStream>>;

/// Login handshake deadline, matching the usual client default.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

const SERVER_VERSION: &str = "SELECT CAST(SERVERPROPERTY('ProductVersion') AS nvarchar(128))";

const DATABASE_EXISTS: &str = "SELECT COUNT(*) FROM sys.databases WHERE name = @P1";

const ATTACH_DATABASE: &str = concat!(
    "DECLARE @sql nvarchar(max) = N'CREATE DATABASE ' + QUOTENAME(@P1)",
    " + N' ON (FILENAME = N''' + REPLACE(@P2, N'''', N'''''')",
    " + N'''), (FILENAME = N''' + REPLACE(@P3, N'''', N'''''')",
    " + N''') FOR ATTACH';",
    " EXEC sp_executesql @sql;",
);

/// `EXEC @variable` resolves the variable as a module name.
const EXECUTE_PROCEDURE: &str = "EXEC @P1;";

const LIST_SESSIONS: &str =
    "SELECT CAST(spid AS int) FROM sys.sysprocesses WHERE dbid = DB_ID(@P1) AND spid <> @@SPID";

const KILL_SESSION: &str =
    "DECLARE @kill nvarchar(32) = N'KILL ' + CAST(@P1 AS nvarchar(11)); EXEC (@kill);";

const DETACH_DATABASE: &str = "EXEC sp_detach_db @dbname = @P1, @skipchecks = 'true';";

/// Connection factory for one SQL Server instance.
#[derive(Debug, Clone)]
pub struct TdsEngine {
    config: TdsConfig,
}

impl TdsEngine {
    /// Parse an ADO-style connection string
    /// (`server=tcp:host\instance;IntegratedSecurity=true;...`).
    pub fn from_connection_string(connection: &str) -> Result<Self> {
        let config = TdsConfig::from_ado_string(connection)
            .map_err(|e| Error::InvalidConfig(format!("Invalid connection string: {e}")))?;
        Ok(Self { config })
    }

    async fn open(&self, scope: &ConnectionScope) -> std::result::Result<TdsClient, tiberius::error::Error> {
        let mut config = self.config.clone();
        match scope {
            ConnectionScope::Admin => config.database("master"),
            ConnectionScope::Target(name) => config.database(name.as_str()),
        }

        // Resolves named instances through SQL Browser.
        let tcp = TcpStream::connect_named(&config).await?;
        tcp.set_nodelay(true)?;

        match Client::connect(config.clone(), tcp.compat_write()).await {
            Err(tiberius::error::Error::Routing { host, port }) => {
                tracing::debug!("Redirected to {host}:{port}");
                config.host(&host);
                config.port(port);
                let tcp = TcpStream::connect(config.get_addr()).await?;
                tcp.set_nodelay(true)?;
                Client::connect(config, tcp.compat_write()).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl Engine for TdsEngine {
    async fn connect(&self, scope: &ConnectionScope) -> Result<Box<dyn EngineConnection>> {
        let client = tokio::time::timeout(CONNECT_TIMEOUT, self.open(scope))
            .await
            .map_err(|_| {
                Error::connection(
                    scope,
                    format!("no response within {}s", CONNECT_TIMEOUT.as_secs()),
                )
            })?
            .map_err(|e| Error::connection(scope, e.to_string()))?;

        tracing::debug!("Opened {scope} connection");
        Ok(Box::new(TdsConnection {
            client: Some(client),
        }))
    }
}

struct TdsConnection {
    client: Option<TdsClient>,
}

impl TdsConnection {
    fn client(&mut self, operation: &str) -> Result<&mut TdsClient> {
        self.client
            .as_mut()
            .ok_or_else(|| Error::engine(operation, "connection already closed"))
    }
}

fn rejected(operation: &'static str) -> impl Fn(tiberius::error::Error) -> Error {
    move |e| Error::engine(operation, e.to_string())
}

/// A column of an unexpected type is an engine error, never a panic.
fn column<T>(
    value: std::result::Result<Option<T>, tiberius::error::Error>,
    operation: &'static str,
) -> Result<Option<T>> {
    value.map_err(rejected(operation))
}

/// NULL session ids are skipped.
fn session_ids(
    values: impl IntoIterator<Item = std::result::Result<Option<i32>, tiberius::error::Error>>,
    operation: &'static str,
) -> Result<Vec<SessionId>> {
    values
        .into_iter()
        .filter_map(|value| column(value, operation).transpose())
        .map(|id| id.map(SessionId))
        .collect()
}

#[async_trait]
impl EngineConnection for TdsConnection {
    async fn server_version(&mut self) -> Result<String> {
        const OP: &str = "Server version";
        let row = self
            .client(OP)?
            .query(SERVER_VERSION, &[])
            .await
            .map_err(rejected(OP))?
            .into_row()
            .await
            .map_err(rejected(OP))?;

        let version = match &row {
            Some(row) => column(row.try_get::<&str, _>(0), OP)?.map(str::to_string),
            None => None,
        };
        Ok(version.unwrap_or_default())
    }

    async fn database_exists(&mut self, name: &DatabaseName) -> Result<bool> {
        const OP: &str = "Attachment check";
        let row = self
            .client(OP)?
            .query(DATABASE_EXISTS, &[&name.as_str()])
            .await
            .map_err(rejected(OP))?
            .into_row()
            .await
            .map_err(rejected(OP))?;

        let count = match &row {
            Some(row) => column(row.try_get::<i32, _>(0), OP)?,
            None => None,
        };
        Ok(count.unwrap_or(0) > 0)
    }

    async fn attach_database(
        &mut self,
        name: &DatabaseName,
        files: &DatabaseFileSet,
    ) -> Result<()> {
        const OP: &str = "Attach";
        let primary = files.primary().to_string_lossy().into_owned();
        let log = files.log().to_string_lossy().into_owned();

        self.client(OP)?
            .execute(ATTACH_DATABASE, &[&name.as_str(), &primary, &log])
            .await
            .map_err(rejected(OP))?;
        Ok(())
    }

    async fn execute_procedure(&mut self, procedure: &ProcedureName) -> Result<()> {
        const OP: &str = "Stored procedure";
        self.client(OP)?
            .execute(EXECUTE_PROCEDURE, &[&procedure.as_str()])
            .await
            .map_err(rejected(OP))?;
        Ok(())
    }

    async fn list_sessions(&mut self, name: &DatabaseName) -> Result<Vec<SessionId>> {
        const OP: &str = "List sessions";
        let rows = self
            .client(OP)?
            .query(LIST_SESSIONS, &[&name.as_str()])
            .await
            .map_err(rejected(OP))?
            .into_first_result()
            .await
            .map_err(rejected(OP))?;

        session_ids(rows.iter().map(|row| row.try_get::<i32, _>(0)), OP)
    }

    async fn kill_session(&mut self, session: SessionId) -> Result<()> {
        const OP: &str = "Kill session";
        self.client(OP)?
            .execute(KILL_SESSION, &[&session.0])
            .await
            .map_err(rejected(OP))?;
        Ok(())
    }

    async fn detach_database(&mut self, name: &DatabaseName) -> Result<()> {
        const OP: &str = "Detach";
        self.client(OP)?
            .execute(DETACH_DATABASE, &[&name.as_str()])
            .await
            .map_err(rejected(OP))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.client.take() {
            Some(client) => client.close().await.map_err(rejected("Close")),
            None => Ok(()),
        }
    }
}
