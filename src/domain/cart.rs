use super::catalog::CatalogItem;
use super::money::Amount;
use super::order::OrderItem;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// One selected catalog item and how many of it the shopper wants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: String,
    pub name: String,
    pub unit_price: Amount,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Result<Amount, ValidationError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        OrderItem {
            id: line.id.clone(),
            name: line.name.clone(),
            price: line.unit_price,
            quantity: line.quantity,
        }
    }
}

/// Largest quantity a single cart line can hold.
pub const MAX_LINE_QUANTITY: u32 = 9_999;

/// The shopper's in-progress selection.
///
/// Lines are kept in insertion order and there is at most one line per
/// catalog id. Every line has a quantity between 1 and
/// [`MAX_LINE_QUANTITY`]. Totals are derived on each read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one unit of `item`, accumulating onto an existing line. A full
    /// line stays at [`MAX_LINE_QUANTITY`].
    pub fn add_item(&mut self, item: &CatalogItem) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.id == item.id) {
            line.quantity = line.quantity.saturating_add(1).min(MAX_LINE_QUANTITY);
        } else {
            self.lines.push(CartLine {
                id: item.id.clone(),
                name: item.name.clone(),
                unit_price: item.price,
                quantity: 1,
            });
        }
    }

    /// Sets the quantity of line `id`, capped at [`MAX_LINE_QUANTITY`]. Zero
    /// or less removes the line; an unknown id is ignored.
    pub fn update_quantity(&mut self, id: &str, new_quantity: i64) {
        if new_quantity <= 0 {
            self.lines.retain(|l| l.id != id);
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.id == id) {
            line.quantity = u32::try_from(new_quantity)
                .unwrap_or(u32::MAX)
                .min(MAX_LINE_QUANTITY);
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn items(&self) -> &[CartLine] {
        &self.lines
    }

    /// Sum of the line totals. Fails only if the amount exceeds what a
    /// `Decimal` can hold.
    pub fn total(&self) -> Result<Amount, ValidationError> {
        self.lines
            .iter()
            .try_fold(Amount::ZERO, |acc, line| acc.checked_add(line.line_total()?))
    }

    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Snapshot of the lines in the shape recorded on an order.
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.lines.iter().map(OrderItem::from).collect()
    }
}
