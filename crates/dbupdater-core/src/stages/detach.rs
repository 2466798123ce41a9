//! Unregister the database from the engine.

use crate::{
    engine::{release, ConnectionScope, Engine},
    types::DatabaseName,
    Result,
};

/// Detach `name`. Must follow the reaper; open sessions make this fail.
pub async fn detach_database<E>(engine: &E, name: &DatabaseName) -> Result<()>
where
    E: Engine + ?Sized,
{
    let mut conn = engine.connect(&ConnectionScope::Admin).await?;
    let result = conn.detach_database(name).await;
    release(conn).await;
    result
}
