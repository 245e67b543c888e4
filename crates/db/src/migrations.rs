use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_TABLES: &[&str] = &["users", "dialogue_sessions", "orders", "turns"];

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(*table)
            .fetch_one(&pool)
            .await
            .expect("check table")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "expected `{table}` table after migrations");
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn migrations_are_idempotent_across_runs() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
        pool.close().await;
    }
}
