use super::money::Amount;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A sellable menu entry. Cart lines are created from these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub price: Amount,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Amount) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
        }
    }
}

/// Read access to the menu, passed explicitly to whoever needs it.
///
/// `subscribe` hands out a receiver that is marked changed every time the
/// catalog contents are replaced.
pub trait Catalog: Send + Sync {
    fn items(&self) -> Vec<CatalogItem>;
    fn get(&self, id: &str) -> Option<CatalogItem>;
    fn subscribe(&self) -> watch::Receiver<u64>;
}
