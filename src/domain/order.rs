use super::money::Amount;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const ORDER_ID_PREFIX: &str = "ORD";
/// Uppercase letters and digits without the look-alikes `I`, `O`, `0`, `1`.
pub const ORDER_ID_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ORDER_ID_SUFFIX_LEN: usize = 6;

/// Short human-readable order code such as `ORD7KQ2ZX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut id = String::with_capacity(ORDER_ID_PREFIX.len() + ORDER_ID_SUFFIX_LEN);
        id.push_str(ORDER_ID_PREFIX);
        for _ in 0..ORDER_ID_SUFFIX_LEN {
            let idx = rng.gen_range(0..ORDER_ID_ALPHABET.len());
            id.push(char::from(ORDER_ID_ALPHABET[idx]));
        }
        Self(id)
    }

    pub fn random() -> Self {
        Self::generate(&mut rand::thread_rng())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub price: Amount,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Mpesa,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Mpesa => "mpesa",
        }
    }
}

/// How an order was paid, with the method-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "paymentMethod", rename_all = "lowercase")]
pub enum Payment {
    #[serde(rename_all = "camelCase")]
    Cash { cash_received: Amount, change: Amount },
    /// `mpesa_number` is `None` when the number could not be recovered.
    #[serde(rename_all = "camelCase")]
    Mpesa {
        mpesa_number: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mpesa_receipt: Option<String>,
    },
}

impl Payment {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Payment::Cash { .. } => PaymentMethod::Cash,
            Payment::Mpesa { .. } => PaymentMethod::Mpesa,
        }
    }
}

/// Immutable record of a completed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub items: Vec<OrderItem>,
    pub total: Amount,
    #[serde(flatten)]
    pub payment: Payment,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn payment_method(&self) -> PaymentMethod {
        self.payment.method()
    }

    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Splits the order into one persisted row per line.
    pub fn to_rows(&self) -> Vec<OrderRow> {
        let (phone_number, cash_received, change_amount) = match &self.payment {
            Payment::Cash {
                cash_received,
                change,
            } => (None, Some(*cash_received), Some(*change)),
            Payment::Mpesa { mpesa_number, .. } => (mpesa_number.clone(), None, None),
        };
        let mpesa_receipt = match &self.payment {
            Payment::Mpesa { mpesa_receipt, .. } => mpesa_receipt.clone(),
            Payment::Cash { .. } => None,
        };

        self.items
            .iter()
            .map(|item| OrderRow {
                order_id: self.id.clone(),
                item_id: item.id.clone(),
                item_name: item.name.clone(),
                quantity: item.quantity,
                price: item.price,
                payment_method: self.payment_method(),
                phone_number: phone_number.clone(),
                mpesa_receipt: mpesa_receipt.clone(),
                total_amount: self.total,
                cash_received,
                change_amount,
                timestamp: self.timestamp,
            })
            .collect()
    }

    /// Regroups rows by `order_id`, most recent order first.
    pub fn from_rows(rows: impl IntoIterator<Item = OrderRow>) -> Vec<Order> {
        let mut grouped: HashMap<OrderId, Vec<OrderRow>> = HashMap::new();
        let mut first_seen: Vec<OrderId> = Vec::new();
        for row in rows {
            let entry = grouped.entry(row.order_id.clone()).or_default();
            if entry.is_empty() {
                first_seen.push(row.order_id.clone());
            }
            entry.push(row);
        }

        let mut orders: Vec<Order> = first_seen
            .into_iter()
            .filter_map(|id| grouped.remove(&id))
            .filter_map(|rows| {
                let first = rows.first()?.clone();
                let payment = match first.payment_method {
                    PaymentMethod::Cash => Payment::Cash {
                        cash_received: first.cash_received.unwrap_or_default(),
                        change: first.change_amount.unwrap_or_default(),
                    },
                    PaymentMethod::Mpesa => Payment::Mpesa {
                        mpesa_number: first.phone_number.clone(),
                        mpesa_receipt: first.mpesa_receipt.clone(),
                    },
                };
                Some(Order {
                    id: first.order_id,
                    items: rows
                        .into_iter()
                        .map(|row| OrderItem {
                            id: row.item_id,
                            name: row.item_name,
                            price: row.price,
                            quantity: row.quantity,
                        })
                        .collect(),
                    total: first.total_amount,
                    payment,
                    timestamp: first.timestamp,
                })
            })
            .collect();

        orders.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        orders
    }
}

/// Persisted ledger row: one per order line, sharing the order-level fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    pub order_id: OrderId,
    pub item_id: String,
    pub item_name: String,
    pub quantity: u32,
    pub price: Amount,
    pub payment_method: PaymentMethod,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub mpesa_receipt: Option<String>,
    pub total_amount: Amount,
    pub cash_received: Option<Amount>,
    pub change_amount: Option<Amount>,
    pub timestamp: DateTime<Utc>,
}
