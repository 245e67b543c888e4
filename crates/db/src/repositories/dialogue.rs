use helply_core::chrono::Utc;

use helply_core::{ContextTag, DialogueStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

/// Durable dialogue context, one row per session. `set` is an upsert so the
/// invariant "at most one pending clarification per session" holds at the
/// schema level.
pub struct SqlDialogueRepository {
    pool: DbPool,
}

impl SqlDialogueRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DialogueStore for SqlDialogueRepository {
    async fn get(&self, session_id: &str) -> Result<Option<ContextTag>, StoreError> {
        let tag = sqlx::query_scalar::<_, Option<String>>(
            "SELECT context_tag FROM dialogue_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        Ok(tag.flatten().as_deref().and_then(ContextTag::parse))
    }

    async fn set(&self, session_id: &str, tag: Option<ContextTag>) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO dialogue_sessions (session_id, context_tag, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                 context_tag = excluded.context_tag,
                 updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(tag.map(|tag| tag.as_str()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        Ok(())
    }
}
