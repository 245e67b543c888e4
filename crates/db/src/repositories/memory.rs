use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::RwLock;

use helply_core::chrono::Utc;
use helply_core::{
    ContextTag, DialogueStore, OrderRecord, OrderStore, StoreError, TurnRecord, TurnSink,
};

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<OrderRecord>>,
    next_id: AtomicI64,
}

impl InMemoryOrderStore {
    pub fn with_orders(orders: Vec<OrderRecord>) -> Self {
        let next_id = orders.iter().map(|order| order.id).max().unwrap_or(0) + 1;
        Self { orders: RwLock::new(orders), next_id: AtomicI64::new(next_id) }
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn recent_for_owner(&self, email: &str) -> Result<Vec<OrderRecord>, StoreError> {
        let orders = self.orders.read().await;
        let mut owned: Vec<OrderRecord> =
            orders.iter().filter(|order| order.owner_email == email).cloned().collect();
        owned.sort_by_key(|order| std::cmp::Reverse(order.id));
        Ok(owned)
    }

    async fn insert(
        &self,
        email: &str,
        item_name: &str,
        status: &str,
        delivery_date: &str,
    ) -> Result<OrderRecord, StoreError> {
        let record = OrderRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            owner_email: email.to_string(),
            item_name: item_name.to_string(),
            status: status.to_string(),
            delivery_date: delivery_date.to_string(),
            created_at: Utc::now(),
        };
        self.orders.write().await.push(record.clone());
        Ok(record)
    }

    async fn count_for_owner(&self, email: &str) -> Result<i64, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders.iter().filter(|order| order.owner_email == email).count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryDialogueStore {
    tags: RwLock<HashMap<String, ContextTag>>,
}

#[async_trait::async_trait]
impl DialogueStore for InMemoryDialogueStore {
    async fn get(&self, session_id: &str) -> Result<Option<ContextTag>, StoreError> {
        Ok(self.tags.read().await.get(session_id).copied())
    }

    async fn set(&self, session_id: &str, tag: Option<ContextTag>) -> Result<(), StoreError> {
        let mut tags = self.tags.write().await;
        match tag {
            Some(tag) => {
                tags.insert(session_id.to_string(), tag);
            }
            None => {
                tags.remove(session_id);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTurnSink {
    records: RwLock<Vec<TurnRecord>>,
}

impl InMemoryTurnSink {
    pub async fn records(&self) -> Vec<TurnRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait::async_trait]
impl TurnSink for InMemoryTurnSink {
    async fn record(&self, record: &TurnRecord) -> Result<String, StoreError> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        Ok(format!("turn-{}", records.len()))
    }
}

#[cfg(test)]
mod tests {
    use helply_core::{ContextTag, DialogueStore, OrderStore};

    use super::{InMemoryDialogueStore, InMemoryOrderStore};

    #[tokio::test]
    async fn in_memory_orders_list_most_recent_first() {
        let store = InMemoryOrderStore::default();
        store
            .insert("ada@example.com", "Laptop", "Processing", "2026-05-01")
            .await
            .expect("insert");
        store.insert("ada@example.com", "Mouse", "Shipped", "2026-04-20").await.expect("insert");

        let orders = store.recent_for_owner("ada@example.com").await.expect("list");
        let items: Vec<&str> = orders.iter().map(|order| order.item_name.as_str()).collect();
        assert_eq!(items, vec!["Mouse", "Laptop"]);
        assert_eq!(store.count_for_owner("ada@example.com").await.expect("count"), 2);
    }

    #[tokio::test]
    async fn in_memory_dialogue_context_overwrites_and_clears() {
        let store = InMemoryDialogueStore::default();

        store.set("sess-1", Some(ContextTag::AwaitingClarification)).await.expect("set");
        assert_eq!(
            store.get("sess-1").await.expect("get"),
            Some(ContextTag::AwaitingClarification)
        );

        store.set("sess-1", None).await.expect("clear");
        assert_eq!(store.get("sess-1").await.expect("get"), None);
    }
}
