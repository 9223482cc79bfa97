#![allow(dead_code)]

use async_trait::async_trait;
use pos_checkout::application::checkout::Checkout;
use pos_checkout::config::CheckoutConfig;
use pos_checkout::domain::catalog::CatalogItem;
use pos_checkout::domain::money::Amount;
use pos_checkout::domain::order::{Order, OrderId};
use pos_checkout::domain::payment::{
    CallbackItem, CallbackMetadata, CorrelationId, PaymentNotification, PendingPayment,
};
use pos_checkout::domain::phone::CanonicalPhone;
use pos_checkout::domain::ports::{
    OrderStore, OrderStoreBox, PaymentGateway, PaymentGatewayBox, PendingPaymentStore,
};
use pos_checkout::error::{GatewayError, StoreError};
use pos_checkout::infrastructure::gateway::{SimulatedGateway, SimulatedOutcome};
use pos_checkout::infrastructure::in_memory::{InMemoryOrderStore, InMemoryPendingPaymentStore};
use pos_checkout::infrastructure::notifications::BroadcastNotificationChannel;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn down() -> StoreError {
    StoreError::Unavailable("connection reset".to_string())
}

/// Order store whose calls can be switched to fail.
#[derive(Clone, Default)]
pub struct FlakyOrderStore {
    pub inner: InMemoryOrderStore,
    failing: Arc<AtomicBool>,
}

impl FlakyOrderStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(down())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OrderStore for FlakyOrderStore {
    async fn save(&self, order: Order) -> Result<(), StoreError> {
        self.check()?;
        self.inner.save(order).await
    }

    async fn fetch_all(&self) -> Result<Vec<Order>, StoreError> {
        self.check()?;
        self.inner.fetch_all().await
    }

    async fn delete(&self, order_id: &OrderId) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(order_id).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.check()?;
        self.inner.clear_all().await
    }
}

/// Pending-payment store with independently failing operations.
#[derive(Clone, Default)]
pub struct FlakyPendingStore {
    pub inner: InMemoryPendingPaymentStore,
    pub fail_put: Arc<AtomicBool>,
    pub fail_get: Arc<AtomicBool>,
    pub fail_delete: Arc<AtomicBool>,
}

#[async_trait]
impl PendingPaymentStore for FlakyPendingStore {
    async fn put(&self, pending: PendingPayment) -> Result<(), StoreError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.put(pending).await
    }

    async fn get(&self, correlation_id: &CorrelationId) -> Result<Option<PendingPayment>, StoreError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.get(correlation_id).await
    }

    async fn delete(&self, correlation_id: &CorrelationId) -> Result<(), StoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.delete(correlation_id).await
    }

    async fn list(&self) -> Result<Vec<PendingPayment>, StoreError> {
        self.inner.list().await
    }
}

/// Order store whose writes take `delay` to complete.
#[derive(Clone, Default)]
pub struct SlowOrderStore {
    pub inner: InMemoryOrderStore,
    pub delay: Duration,
}

#[async_trait]
impl OrderStore for SlowOrderStore {
    async fn save(&self, order: Order) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.save(order).await
    }

    async fn fetch_all(&self) -> Result<Vec<Order>, StoreError> {
        self.inner.fetch_all().await
    }

    async fn delete(&self, order_id: &OrderId) -> Result<(), StoreError> {
        self.inner.delete(order_id).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.inner.clear_all().await
    }
}

/// Gateway that takes `delay` to acknowledge and never calls back.
pub struct SlowGateway {
    pub delay: Duration,
}

#[async_trait]
impl PaymentGateway for SlowGateway {
    async fn initiate(
        &self,
        _amount: Amount,
        _phone: &CanonicalPhone,
        _order_draft: &Order,
    ) -> Result<CorrelationId, GatewayError> {
        tokio::time::sleep(self.delay).await;
        Ok(CorrelationId::new("ws_CO_slow"))
    }
}

/// Checkout over the given order store and gateway with an in-memory
/// pending store.
pub fn checkout_with(
    orders: OrderStoreBox,
    gateway: PaymentGatewayBox,
    channel: BroadcastNotificationChannel,
    config: CheckoutConfig,
) -> Checkout {
    Checkout::new(
        orders,
        Arc::new(InMemoryPendingPaymentStore::new()),
        gateway,
        Arc::new(channel),
        config,
    )
}

pub struct Session {
    pub checkout: Checkout,
    pub orders: FlakyOrderStore,
    pub pending: FlakyPendingStore,
    pub channel: BroadcastNotificationChannel,
}

pub fn session(outcome: SimulatedOutcome) -> Session {
    let orders = FlakyOrderStore::default();
    let pending = FlakyPendingStore::default();
    let channel = BroadcastNotificationChannel::new();
    let gateway = SimulatedGateway::new(channel.clone(), outcome);
    let config = CheckoutConfig {
        confirmation_timeout: Duration::from_millis(100),
        ..CheckoutConfig::default()
    };
    let checkout = Checkout::new(
        Arc::new(orders.clone()),
        Arc::new(pending.clone()),
        Arc::new(gateway),
        Arc::new(channel.clone()),
        config,
    );
    Session {
        checkout,
        orders,
        pending,
        channel,
    }
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

/// Fills the cart to a total of 500: two pilau at 200 and one soda at 100.
pub fn fill_cart(checkout: &mut Checkout) {
    let pilau = CatalogItem::new("pilau", "Pilau", amount(Decimal::from(200)));
    let soda = CatalogItem::new("soda", "Soda", amount(Decimal::from(100)));
    let cart = checkout.cart_mut();
    cart.add_item(&pilau);
    cart.add_item(&pilau);
    cart.add_item(&soda);
}

pub fn success(correlation_id: &CorrelationId, receipt: &str) -> PaymentNotification {
    PaymentNotification {
        correlation_id: correlation_id.clone(),
        result_code: 0,
        result_description: "The service request is processed successfully.".to_string(),
        metadata: Some(CallbackMetadata {
            items: vec![CallbackItem {
                name: "MpesaReceiptNumber".to_string(),
                value: serde_json::Value::String(receipt.to_string()),
            }],
        }),
    }
}

pub fn failure(correlation_id: &CorrelationId, description: &str) -> PaymentNotification {
    PaymentNotification {
        correlation_id: correlation_id.clone(),
        result_code: 1032,
        result_description: description.to_string(),
        metadata: None,
    }
}
