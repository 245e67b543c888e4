use async_trait::async_trait;
use thiserror::Error;

use helply_core::StoreError;

pub mod dialogue;
pub mod memory;
pub mod order;
pub mod turn_log;
pub mod user;

pub use dialogue::SqlDialogueRepository;
pub use memory::{InMemoryDialogueStore, InMemoryOrderStore, InMemoryTurnSink};
pub use order::SqlOrderRepository;
pub use turn_log::{SqlTurnLogRepository, TurnLogEntry};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        StoreError(value.to_string())
    }
}

/// Caller identity rows, upserted on sign-in and on each authenticated
/// query. Keyed by the verifier's stable subject id, not by email.
#[async_trait]
pub trait UserRecords: Send + Sync {
    async fn upsert_by_subject(
        &self,
        subject_id: &str,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<String, RepositoryError>;

    async fn find_id_by_subject(&self, subject_id: &str)
        -> Result<Option<String>, RepositoryError>;
}
