use super::money::Amount;
use super::order::{Order, OrderId};
use super::payment::{CorrelationId, PaymentNotification, PendingPayment};
use super::phone::CanonicalPhone;
use crate::error::{ChannelError, GatewayError, StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Durable order ledger. `save` is an upsert keyed by order id.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn save(&self, order: Order) -> Result<(), StoreError>;
    /// All orders, most recent first.
    async fn fetch_all(&self) -> Result<Vec<Order>, StoreError>;
    async fn delete(&self, order_id: &OrderId) -> Result<(), StoreError>;
    async fn clear_all(&self) -> Result<(), StoreError>;
}

/// Holding area for orders awaiting asynchronous payment confirmation.
#[async_trait]
pub trait PendingPaymentStore: Send + Sync {
    async fn put(&self, pending: PendingPayment) -> Result<(), StoreError>;
    async fn get(&self, correlation_id: &CorrelationId) -> Result<Option<PendingPayment>, StoreError>;
    async fn delete(&self, correlation_id: &CorrelationId) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<PendingPayment>, StoreError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Starts a payment and returns the id its callback will carry.
    async fn initiate(
        &self,
        amount: Amount,
        phone: &CanonicalPhone,
        order_draft: &Order,
    ) -> Result<CorrelationId, GatewayError>;
}

/// Push transport for gateway callbacks.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn subscribe(&self) -> Result<Subscription, ChannelError>;
}

pub type OrderStoreBox = Arc<dyn OrderStore>;
pub type PendingPaymentStoreBox = Arc<dyn PendingPaymentStore>;
pub type PaymentGatewayBox = Arc<dyn PaymentGateway>;
pub type NotificationChannelBox = Arc<dyn NotificationChannel>;

/// A live subscription to the notification channel. Dropping it (or calling
/// [`Subscription::cancel`]) disconnects.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<PaymentNotification>,
}

impl Subscription {
    pub fn new(receiver: broadcast::Receiver<PaymentNotification>) -> Self {
        Self { receiver }
    }

    /// Waits for the next notification. `None` once the channel is closed.
    pub async fn next(&mut self) -> Option<PaymentNotification> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn cancel(self) {
        drop(self.receiver);
    }
}
