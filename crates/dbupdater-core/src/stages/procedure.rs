//! Run the upgrade routine inside the target database.

use crate::{
    engine::{release, ConnectionScope, Engine},
    types::{DatabaseName, ProcedureName},
    Result,
};

/// Invoke `procedure` once, on a connection scoped to database `name`.
///
/// The routine is called as a stored procedure, never as statement text.
pub async fn run_procedure<E>(engine: &E, name: &DatabaseName, procedure: &ProcedureName) -> Result<()>
where
    E: Engine + ?Sized,
{
    let mut conn = engine
        .connect(&ConnectionScope::Target(name.clone()))
        .await?;
    let result = conn.execute_procedure(procedure).await;
    release(conn).await;
    result
}
