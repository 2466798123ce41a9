//! Register the physical files with the engine.

use crate::{
    engine::{release, ConnectionScope, Engine},
    types::{DatabaseFileSet, DatabaseName},
    Result,
};

/// Attach `files` as database `name`.
///
/// Only call this after the probe reported `NotAttached`; attaching a name
/// that is already registered is an engine error. No retry on failure.
pub async fn attach_database<E>(engine: &E, name: &DatabaseName, files: &DatabaseFileSet) -> Result<()>
where
    E: Engine + ?Sized,
{
    let mut conn = engine.connect(&ConnectionScope::Admin).await?;
    let result = conn.attach_database(name, files).await;
    release(conn).await;

    result.inspect(|()| {
        tracing::info!(
            "Attached '{name}' from {} and {}",
            files.primary().display(),
            files.log().display()
        );
    })
}
