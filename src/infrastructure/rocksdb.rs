use crate::domain::order::{Order, OrderId, OrderRow};
use crate::domain::payment::{CorrelationId, PendingPayment};
use crate::domain::ports::{OrderStore, PendingPaymentStore};
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding one entry per order line.
pub const CF_ORDERS: &str = "orders";
/// Column Family holding pending payments keyed by correlation id.
pub const CF_PENDING: &str = "pending_payments";

const KEY_SEPARATOR: u8 = 0;

/// A persistent store implementation using RocksDB.
///
/// Order rows are keyed `order_id \0 line_index` so all rows of one order are
/// contiguous and can be replaced atomically in a single write batch.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// the "orders" and "pending_payments" column families if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let cf_pending = ColumnFamilyDescriptor::new(CF_PENDING, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders, cf_pending])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db.cf_handle(name).ok_or_else(|| {
            StoreError::Unavailable(format!("column family '{name}' not found"))
        })
    }

    fn order_prefix(order_id: &OrderId) -> Vec<u8> {
        let mut prefix = order_id.as_str().as_bytes().to_vec();
        prefix.push(KEY_SEPARATOR);
        prefix
    }

    fn row_key(order_id: &OrderId, index: usize) -> Vec<u8> {
        let mut key = Self::order_prefix(order_id);
        key.extend_from_slice(&(index as u32).to_be_bytes());
        key
    }

    /// Queues deletion of every row belonging to `order_id`.
    fn delete_order_rows(
        &self,
        cf: &ColumnFamily,
        order_id: &OrderId,
        batch: &mut WriteBatch,
    ) -> Result<(), StoreError> {
        let prefix = Self::order_prefix(order_id);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_slice(), Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            batch.delete_cf(cf, key);
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn save(&self, order: Order) -> Result<(), StoreError> {
        if order.items.is_empty() {
            return Err(StoreError::EmptyOrder(order.id));
        }
        let cf = self.cf(CF_ORDERS)?;
        let mut batch = WriteBatch::default();
        self.delete_order_rows(cf, &order.id, &mut batch)?;

        for (index, row) in order.to_rows().iter().enumerate() {
            let value = serde_json::to_vec(row)?;
            batch.put_cf(cf, Self::row_key(&order.id, index), value);
        }

        self.db.write(batch)?;
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<Order>, StoreError> {
        let cf = self.cf(CF_ORDERS)?;

        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let row: OrderRow = serde_json::from_slice(&value)?;
            rows.push(row);
        }

        Ok(Order::from_rows(rows))
    }

    async fn delete(&self, order_id: &OrderId) -> Result<(), StoreError> {
        let cf = self.cf(CF_ORDERS)?;
        let mut batch = WriteBatch::default();
        self.delete_order_rows(cf, order_id, &mut batch)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let cf = self.cf(CF_ORDERS)?;
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(cf, key);
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl PendingPaymentStore for RocksDBStore {
    async fn put(&self, pending: PendingPayment) -> Result<(), StoreError> {
        let cf = self.cf(CF_PENDING)?;
        let value = serde_json::to_vec(&pending)?;
        self.db
            .put_cf(cf, pending.correlation_id.as_str().as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, correlation_id: &CorrelationId) -> Result<Option<PendingPayment>, StoreError> {
        let cf = self.cf(CF_PENDING)?;
        match self.db.get_cf(cf, correlation_id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, correlation_id: &CorrelationId) -> Result<(), StoreError> {
        let cf = self.cf(CF_PENDING)?;
        self.db.delete_cf(cf, correlation_id.as_str().as_bytes())?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PendingPayment>, StoreError> {
        let cf = self.cf(CF_PENDING)?;
        let mut all = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let pending: PendingPayment = serde_json::from_slice(&value)?;
            all.push(pending);
        }
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}
