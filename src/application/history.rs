use super::with_store_timeout;
use crate::domain::order::{Order, OrderId};
use crate::domain::ports::OrderStoreBox;
use crate::error::Result;
use std::time::Duration;

/// Orders as last seen, and whether they came from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryView {
    Live(Vec<Order>),
    /// The store could not be read; these are the orders known locally.
    Cached(Vec<Order>),
}

impl HistoryView {
    pub fn orders(&self) -> &[Order] {
        match self {
            HistoryView::Live(orders) | HistoryView::Cached(orders) => orders,
        }
    }

    pub fn into_orders(self) -> Vec<Order> {
        match self {
            HistoryView::Live(orders) | HistoryView::Cached(orders) => orders,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, HistoryView::Cached(_))
    }
}

/// Read side of the order ledger with a local fallback.
pub struct OrderHistory {
    store: OrderStoreBox,
    cache: Vec<Order>,
    store_timeout: Duration,
}

impl OrderHistory {
    pub fn new(store: OrderStoreBox, store_timeout: Duration) -> Self {
        Self {
            store,
            cache: Vec::new(),
            store_timeout,
        }
    }

    /// Remembers an order completed locally, replacing one with the same id.
    pub fn record(&mut self, order: Order) {
        self.cache.retain(|o| o.id != order.id);
        self.cache.push(order);
        self.cache.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    /// Fetches all orders, most recent first. Never fails: a store error is
    /// logged and the cached view returned instead.
    pub async fn load(&mut self) -> HistoryView {
        match with_store_timeout(self.store_timeout, self.store.fetch_all()).await {
            Ok(orders) => {
                self.cache = orders.clone();
                HistoryView::Live(orders)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch orders, showing cached history");
                HistoryView::Cached(self.cache.clone())
            }
        }
    }

    pub async fn delete(&mut self, order_id: &OrderId) -> Result<()> {
        with_store_timeout(self.store_timeout, self.store.delete(order_id)).await?;
        self.cache.retain(|o| &o.id != order_id);
        Ok(())
    }

    /// Clears the ledger. The local cache is only dropped once the store
    /// confirms.
    pub async fn clear(&mut self) -> Result<()> {
        with_store_timeout(self.store_timeout, self.store.clear_all()).await?;
        self.cache.clear();
        tracing::info!("order history cleared");
        Ok(())
    }
}
