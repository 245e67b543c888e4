use helply_core::chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use helply_core::{StoreError, TurnRecord, TurnSink};

use super::RepositoryError;
use crate::DbPool;

/// One row of the persisted audit trail, as served by `/history`.
#[derive(Clone, Debug, Serialize)]
pub struct TurnLogEntry {
    pub id: String,
    pub session_id: String,
    pub transcript: String,
    pub intent: String,
    pub reply: String,
    pub sources: serde_json::Value,
    pub confidence: Option<f64>,
    pub model_ms: Option<i64>,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

pub struct SqlTurnLogRepository {
    pool: DbPool,
}

impl SqlTurnLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn recent_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TurnLogEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, session_id, transcript, intent, reply, sources_json, confidence,
                    model_ms, success, created_at
             FROM turns
             WHERE user_id = ?
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }
}

#[async_trait::async_trait]
impl TurnSink for SqlTurnLogRepository {
    async fn record(&self, record: &TurnRecord) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let sources_json = serde_json::to_string(&record.sources)
            .map_err(|error| StoreError(format!("encode sources: {error}")))?;

        sqlx::query(
            "INSERT INTO turns
                 (id, user_id, session_id, transcript, intent, reply, model_text,
                  sources_json, confidence, model_ms, success, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(record.user_id.as_deref())
        .bind(&record.session_id)
        .bind(&record.transcript)
        .bind(record.intent.as_str())
        .bind(&record.reply)
        .bind(record.model_text.as_deref())
        .bind(&sources_json)
        .bind(record.confidence.map(f64::from))
        .bind(record.model_ms.map(|ms| ms as i64))
        .bind(record.success)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        Ok(id)
    }
}

fn entry_from_row(row: SqliteRow) -> Result<TurnLogEntry, RepositoryError> {
    let sources_json: String = row.try_get("sources_json")?;
    let sources = serde_json::from_str(&sources_json)
        .map_err(|error| RepositoryError::Decode(format!("sources_json: {error}")))?;

    Ok(TurnLogEntry {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        transcript: row.try_get("transcript")?,
        intent: row.try_get("intent")?,
        reply: row.try_get("reply")?,
        sources,
        confidence: row.try_get("confidence")?,
        model_ms: row.try_get("model_ms")?,
        success: row.try_get("success")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}
