use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// One structured order row, read-only from the engine's point of view
/// except for `create_order` inserts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: i64,
    pub owner_email: String,
    pub item_name: String,
    pub status: String,
    pub delivery_date: String,
    pub created_at: DateTime<Utc>,
}

/// Order access keyed by the caller's verified email, never by session id.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Candidates in descending-recency order. The disambiguation resolver's
    /// first-match tie-break depends on this ordering.
    async fn recent_for_owner(&self, email: &str) -> Result<Vec<OrderRecord>, StoreError>;

    async fn insert(
        &self,
        email: &str,
        item_name: &str,
        status: &str,
        delivery_date: &str,
    ) -> Result<OrderRecord, StoreError>;

    async fn count_for_owner(&self, email: &str) -> Result<i64, StoreError>;
}
