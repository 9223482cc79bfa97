use crate::domain::catalog::{Catalog, CatalogItem};
use crate::domain::order::{Order, OrderId, OrderRow};
use crate::domain::payment::{CorrelationId, PendingPayment};
use crate::domain::ports::{OrderStore, PendingPaymentStore};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::{RwLock, watch};

/// A thread-safe in-memory order ledger.
///
/// Stores one [`OrderRow`] per order line, like the persistent ledger, and
/// regroups them on read. Saving an order replaces any rows already held for
/// the same order id.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    rows: Arc<RwLock<Vec<OrderRow>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows (not orders).
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: Order) -> Result<(), StoreError> {
        // An order is its rows; with no lines there would be nothing to read back.
        if order.items.is_empty() {
            return Err(StoreError::EmptyOrder(order.id));
        }
        let mut rows = self.rows.write().await;
        rows.retain(|row| row.order_id != order.id);
        rows.extend(order.to_rows());
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<Order>, StoreError> {
        let rows = self.rows.read().await;
        Ok(Order::from_rows(rows.iter().cloned()))
    }

    async fn delete(&self, order_id: &OrderId) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        rows.retain(|row| &row.order_id != order_id);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.rows.write().await.clear();
        Ok(())
    }
}

/// A thread-safe in-memory pending-payment store keyed by correlation id.
#[derive(Default, Clone)]
pub struct InMemoryPendingPaymentStore {
    pending: Arc<RwLock<HashMap<CorrelationId, PendingPayment>>>,
}

impl InMemoryPendingPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingPaymentStore for InMemoryPendingPaymentStore {
    async fn put(&self, pending: PendingPayment) -> Result<(), StoreError> {
        let mut map = self.pending.write().await;
        map.insert(pending.correlation_id.clone(), pending);
        Ok(())
    }

    async fn get(&self, correlation_id: &CorrelationId) -> Result<Option<PendingPayment>, StoreError> {
        let map = self.pending.read().await;
        Ok(map.get(correlation_id).cloned())
    }

    async fn delete(&self, correlation_id: &CorrelationId) -> Result<(), StoreError> {
        self.pending.write().await.remove(correlation_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PendingPayment>, StoreError> {
        let map = self.pending.read().await;
        let mut all: Vec<PendingPayment> = map.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}

/// Menu held in memory. `replace` swaps the contents and notifies subscribers.
pub struct InMemoryCatalog {
    items: StdRwLock<Vec<CatalogItem>>,
    version: watch::Sender<u64>,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            items: StdRwLock::new(items),
            version,
        }
    }

    pub fn replace(&self, items: Vec<CatalogItem>) {
        match self.items.write() {
            Ok(mut guard) => *guard = items,
            Err(poisoned) => *poisoned.into_inner() = items,
        }
        self.version.send_modify(|v| *v += 1);
    }
}

impl Catalog for InMemoryCatalog {
    fn items(&self) -> Vec<CatalogItem> {
        match self.items.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn get(&self, id: &str) -> Option<CatalogItem> {
        self.items().into_iter().find(|item| item.id == id)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::domain::order::{OrderItem, Payment};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn order(id: &str) -> Order {
        Order {
            id: OrderId::from(id),
            items: vec![
                OrderItem {
                    id: "1".into(),
                    name: "Chai".into(),
                    price: Amount::new(dec!(50)).unwrap(),
                    quantity: 2,
                },
                OrderItem {
                    id: "2".into(),
                    name: "Mandazi".into(),
                    price: Amount::new(dec!(20)).unwrap(),
                    quantity: 1,
                },
            ],
            total: Amount::new(dec!(120)).unwrap(),
            payment: Payment::Mpesa {
                mpesa_number: Some("254712345678".into()),
                mpesa_receipt: None,
            },
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_order_store() {
        let store = InMemoryOrderStore::new();
        let order = order("ORDAAAAAA");

        store.save(order.clone()).await.unwrap();
        assert_eq!(store.row_count().await, 2);

        let all = store.fetch_all().await.unwrap();
        assert_eq!(all, vec![order]);
    }

    #[tokio::test]
    async fn test_save_is_an_upsert() {
        let store = InMemoryOrderStore::new();
        let order = order("ORDAAAAAA");

        store.save(order.clone()).await.unwrap();
        store.save(order.clone()).await.unwrap();

        assert_eq!(store.row_count().await, 2);
        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_order_without_lines_is_rejected() {
        let store = InMemoryOrderStore::new();
        let empty = Order {
            items: vec![],
            ..order("ORDEMPTY1")
        };

        let err = store.save(empty).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyOrder(id) if id.as_str() == "ORDEMPTY1"));
        assert_eq!(store.row_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = InMemoryOrderStore::new();
        store.save(order("ORDAAAAAA")).await.unwrap();
        store.save(order("ORDBBBBBB")).await.unwrap();

        store.delete(&OrderId::from("ORDAAAAAA")).await.unwrap();
        let all = store.fetch_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id.as_str(), "ORDBBBBBB");

        store.clear_all().await.unwrap();
        assert!(store.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_pending_store() {
        let store = InMemoryPendingPaymentStore::new();
        let now = Utc::now();
        let first = PendingPayment {
            correlation_id: CorrelationId::new("a"),
            order_draft: order("ORDAAAAAA"),
            created_at: now,
        };
        let second = PendingPayment {
            correlation_id: CorrelationId::new("b"),
            order_draft: order("ORDBBBBBB"),
            created_at: now - Duration::minutes(5),
        };

        store.put(first.clone()).await.unwrap();
        store.put(second.clone()).await.unwrap();
        assert_eq!(
            store.get(&CorrelationId::new("a")).await.unwrap(),
            Some(first.clone())
        );
        assert_eq!(store.list().await.unwrap(), vec![second, first]);

        store.delete(&CorrelationId::new("a")).await.unwrap();
        assert!(store.get(&CorrelationId::new("a")).await.unwrap().is_none());
        // deleting twice is harmless
        store.delete(&CorrelationId::new("a")).await.unwrap();
    }

    #[tokio::test]
    async fn test_catalog_notifies_on_replace() {
        let tea = CatalogItem::new("tea", "Tea", Amount::new(dec!(100)).unwrap());
        let catalog = InMemoryCatalog::new(vec![tea.clone()]);
        let mut updates = catalog.subscribe();

        assert_eq!(catalog.get("tea"), Some(tea));
        catalog.replace(vec![]);

        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow(), 1);
        assert!(catalog.get("tea").is_none());
    }
}
