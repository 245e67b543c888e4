use helply_core::chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use helply_core::{OrderRecord, OrderStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderStore for SqlOrderRepository {
    async fn recent_for_owner(&self, email: &str) -> Result<Vec<OrderRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_email, item_name, status, delivery_date, created_at
             FROM orders
             WHERE user_email = ?
             ORDER BY id DESC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        rows.into_iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, RepositoryError>>()
            .map_err(StoreError::from)
    }

    async fn insert(
        &self,
        email: &str,
        item_name: &str,
        status: &str,
        delivery_date: &str,
    ) -> Result<OrderRecord, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO orders (user_email, item_name, status, delivery_date, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(email)
        .bind(item_name)
        .bind(status)
        .bind(delivery_date)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        Ok(OrderRecord {
            id: result.last_insert_rowid(),
            owner_email: email.to_string(),
            item_name: item_name.to_string(),
            status: status.to_string(),
            delivery_date: delivery_date.to_string(),
            created_at,
        })
    }

    async fn count_for_owner(&self, email: &str) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE user_email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)
            .map_err(StoreError::from)
    }
}

fn order_from_row(row: SqliteRow) -> Result<OrderRecord, RepositoryError> {
    Ok(OrderRecord {
        id: row.try_get("id")?,
        owner_email: row.try_get("user_email")?,
        item_name: row.try_get("item_name")?,
        status: row.try_get("status")?,
        delivery_date: row.try_get("delivery_date")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use helply_core::OrderStore;

    use super::SqlOrderRepository;
    use crate::{connect_with_settings, migrations};

    async fn seeded_repo() -> SqlOrderRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlOrderRepository::new(pool)
    }

    #[tokio::test]
    async fn insert_then_read_back_in_descending_recency_order() {
        let repo = seeded_repo().await;

        repo.insert("ada@example.com", "Laptop", "Processing", "2026-05-01")
            .await
            .expect("insert laptop");
        repo.insert("ada@example.com", "Mouse", "Shipped", "2026-04-20")
            .await
            .expect("insert mouse");
        repo.insert("bob@example.com", "Desk", "Processing", "2026-05-09")
            .await
            .expect("insert desk");

        let orders = repo.recent_for_owner("ada@example.com").await.expect("list");
        let items: Vec<&str> = orders.iter().map(|order| order.item_name.as_str()).collect();
        assert_eq!(items, vec!["Mouse", "Laptop"]);
        assert!(orders.iter().all(|order| order.owner_email == "ada@example.com"));
    }

    #[tokio::test]
    async fn count_is_scoped_to_the_owner() {
        let repo = seeded_repo().await;

        repo.insert("ada@example.com", "Laptop", "Processing", "2026-05-01")
            .await
            .expect("insert");
        repo.insert("bob@example.com", "Desk", "Processing", "2026-05-09").await.expect("insert");

        assert_eq!(repo.count_for_owner("ada@example.com").await.expect("count"), 1);
        assert_eq!(repo.count_for_owner("carol@example.com").await.expect("count"), 0);
    }
}
