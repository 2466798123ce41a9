//! Catalog lookup: is the target database registered?

use crate::{
    engine::{release, ConnectionScope, Engine},
    types::{AttachmentState, DatabaseName},
    Result,
};

/// Ask the administrative catalog whether `name` is attached.
///
/// Side-effect free; calling it repeatedly without an attach or detach in
/// between yields the same answer.
pub async fn probe_attachment<E>(engine: &E, name: &DatabaseName) -> Result<AttachmentState>
where
    E: Engine + ?Sized,
{
    let mut conn = engine.connect(&ConnectionScope::Admin).await?;
    let exists = conn.database_exists(name).await;
    release(conn).await;

    let state = if exists? {
        AttachmentState::Attached
    } else {
        AttachmentState::NotAttached
    };
    tracing::debug!("Database '{name}' attachment state: {state}");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::testing::{Call, Script, ScriptedEngine},
        Error,
    };

    fn db() -> DatabaseName {
        DatabaseName::new("Sample").unwrap()
    }

    #[tokio::test]
    async fn test_probe_not_attached() {
        let engine = ScriptedEngine::new(Script::default());
        let state = probe_attachment(&engine, &db()).await.unwrap();
        assert_eq!(state, AttachmentState::NotAttached);
        assert_eq!(
            engine.calls(),
            vec![
                Call::Connect(ConnectionScope::Admin),
                Call::DatabaseExists("Sample".to_string()),
                Call::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_is_idempotent() {
        let engine = ScriptedEngine::new(Script {
            attached: true,
            ..Script::default()
        });
        let first = probe_attachment(&engine, &db()).await.unwrap();
        let second = probe_attachment(&engine, &db()).await.unwrap();
        assert_eq!(first, AttachmentState::Attached);
        assert_eq!(first, second);
        assert_eq!(engine.connections_open(), 0);
    }

    #[tokio::test]
    async fn test_probe_unreachable_engine_is_hard_failure() {
        let engine = ScriptedEngine::new(Script {
            unreachable: true,
            ..Script::default()
        });
        let result = probe_attachment(&engine, &db()).await;
        assert!(matches!(result, Err(Error::Connection { .. })));
    }
}
