use super::order::Order;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Gateway identifier linking an initiation call to its callback
/// (`MerchantRequestID` for M-Pesa STK push).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An order submitted to the gateway whose confirmation has not arrived yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPayment {
    pub correlation_id: CorrelationId,
    pub order_draft: Order,
    pub created_at: DateTime<Utc>,
}

/// Result code the gateway uses for a successful payment.
pub const RESULT_CODE_SUCCESS: i64 = 0;

/// Callback delivered by the notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentNotification {
    #[serde(rename = "MerchantRequestID")]
    pub correlation_id: CorrelationId,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_description: String,
    #[serde(rename = "CallbackMetadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CallbackMetadata>,
}

impl PaymentNotification {
    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_CODE_SUCCESS
    }

    pub fn receipt(&self) -> Option<ReceiptMetadata> {
        self.metadata.as_ref().map(CallbackMetadata::receipt)
    }
}

/// The gateway's `{ Item: [{ Name, Value }] }` metadata list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Value,
}

impl CallbackMetadata {
    fn lookup(&self, name: &str) -> Option<String> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| match &item.value {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
    }

    pub fn receipt(&self) -> ReceiptMetadata {
        ReceiptMetadata {
            receipt_number: self.lookup("MpesaReceiptNumber"),
            amount: self.lookup("Amount"),
            transaction_date: self.lookup("TransactionDate"),
        }
    }
}

/// Reference data attached to a confirmed payment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReceiptMetadata {
    pub receipt_number: Option<String>,
    pub amount: Option<String>,
    pub transaction_date: Option<String>,
}
