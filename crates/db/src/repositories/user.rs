use helply_core::chrono::Utc;
use uuid::Uuid;

use super::{RepositoryError, UserRecords};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRecords for SqlUserRepository {
    async fn upsert_by_subject(
        &self,
        subject_id: &str,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<String, RepositoryError> {
        let existing = sqlx::query_scalar::<_, String>(
            "SELECT id FROM users WHERE subject_id = ?",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        let now = Utc::now();
        if let Some(id) = existing {
            sqlx::query(
                "UPDATE users SET last_seen = ?, email = COALESCE(?, email) WHERE id = ?",
            )
            .bind(now)
            .bind(email)
            .bind(&id)
            .execute(&self.pool)
            .await?;
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, subject_id, email, display_name, created_at, last_seen)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(subject_id)
        .bind(email)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_id_by_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let id = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE subject_id = ?")
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}
