use super::with_store_timeout;
use crate::config::CheckoutConfig;
use crate::domain::cart::Cart;
use crate::domain::money::Amount;
use crate::domain::order::{Order, OrderId, Payment, PaymentMethod};
use crate::domain::payment::{CorrelationId, PaymentNotification, PendingPayment, ReceiptMetadata};
use crate::domain::phone::{self, CanonicalPhone};
use crate::domain::ports::{
    NotificationChannelBox, OrderStoreBox, PaymentGatewayBox, PendingPaymentStoreBox, Subscription,
};
use crate::error::{ChannelError, GatewayError, PosError, Result, ValidationError};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use tokio::time::Instant;

/// Where a payment attempt currently stands.
///
/// `Idle` is the only initial state; `Completed` and `Failed` end an attempt
/// and the next attempt starts again from `Idle`. Cash payments go straight
/// from `Idle` to `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentState {
    Idle,
    Initiated,
    AwaitingConfirmation { correlation_id: CorrelationId },
    Completed { order_id: OrderId },
    Failed { reason: String },
}

impl PaymentState {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            PaymentState::Initiated | PaymentState::AwaitingConfirmation { .. }
        )
    }
}

/// How the recorded order was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSource {
    /// Cash payment, written synchronously.
    Cash,
    /// Mobile-money confirmation matched to its pending-payment record.
    ReconciledFromStore,
    /// Mobile-money confirmation whose pending record could not be read; the
    /// order was rebuilt from what the session still held.
    ReconstructedFromSession,
}

/// A durably written order and how it came to be.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub order: Order,
    pub source: OrderSource,
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.order.item_count();
        let noun = if count == 1 { "item" } else { "items" };
        write!(f, "Order {} complete: KES {}", self.order.id, self.order.total)?;
        match &self.order.payment {
            Payment::Cash { change, .. } => {
                write!(f, " • Cash")?;
                if !change.is_zero() {
                    write!(f, " • Change: KES {change}")?;
                }
            }
            Payment::Mpesa { mpesa_receipt, .. } => {
                write!(f, " • M-Pesa")?;
                if let Some(receipt) = mpesa_receipt {
                    write!(f, " • Receipt: {receipt}")?;
                }
            }
        }
        write!(f, " • {count} {noun}")
    }
}

/// Result of feeding a notification to the checkout.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    Completed(Completion),
    /// The gateway reported failure. The pending record is kept.
    Failed {
        correlation_id: CorrelationId,
        description: String,
    },
    /// Already settled in this session; nothing was written.
    Duplicate {
        correlation_id: CorrelationId,
        order_id: OrderId,
    },
    /// No callback arrived in time. The pending record is kept.
    TimedOut { correlation_id: CorrelationId },
    /// Not the payment this session is waiting for.
    Ignored,
}

#[derive(Debug, Clone)]
struct MpesaAttempt {
    phone: CanonicalPhone,
    draft: Order,
}

/// Builds the final mobile-money order from its draft and callback metadata.
pub fn confirm_draft(draft: Order, receipt: Option<ReceiptMetadata>) -> Order {
    let mpesa_number = match draft.payment {
        Payment::Mpesa { mpesa_number, .. } => mpesa_number,
        Payment::Cash { .. } => None,
    };
    Order {
        payment: Payment::Mpesa {
            mpesa_number,
            mpesa_receipt: receipt.and_then(|r| r.receipt_number),
        },
        timestamp: Utc::now(),
        ..draft
    }
}

/// One shopper session: the cart and the payment state machine around it.
///
/// All mutation happens through `&mut self`, one user action or one inbound
/// notification at a time.
pub struct Checkout {
    cart: Cart,
    orders: OrderStoreBox,
    pending: PendingPaymentStoreBox,
    gateway: PaymentGatewayBox,
    channel: NotificationChannelBox,
    config: CheckoutConfig,
    state: PaymentState,
    attempt: Option<MpesaAttempt>,
    subscription: Option<Subscription>,
    settled: HashMap<CorrelationId, OrderId>,
}

impl Checkout {
    pub fn new(
        orders: OrderStoreBox,
        pending: PendingPaymentStoreBox,
        gateway: PaymentGatewayBox,
        channel: NotificationChannelBox,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            cart: Cart::new(),
            orders,
            pending,
            gateway,
            channel,
            config,
            state: PaymentState::Idle,
            attempt: None,
            subscription: None,
            settled: HashMap::new(),
        }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    pub fn state(&self) -> &PaymentState {
        &self.state
    }

    /// Whether the "complete payment" action should show as processing.
    pub fn is_processing(&self) -> bool {
        self.state.is_in_flight()
    }

    /// Moves a finished attempt back to `Idle`.
    fn start_attempt(&mut self) -> Result<()> {
        if self.state.is_in_flight() {
            return Err(PosError::InvalidState(
                "a mobile-money payment is already in progress".to_string(),
            ));
        }
        self.state = PaymentState::Idle;
        Ok(())
    }

    fn fail(&mut self, reason: impl Into<String>) {
        self.state = PaymentState::Failed {
            reason: reason.into(),
        };
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.attempt = None;
    }

    /// Completes a cash sale.
    ///
    /// Rejects insufficient cash before touching the store. If the write
    /// fails the cart is left as it was and the same call can be retried.
    pub async fn pay_cash(&mut self, cash_received: Amount) -> Result<Completion> {
        self.start_attempt()?;
        if self.cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }

        let total = self.cart.total()?;
        if cash_received < total {
            return Err(ValidationError::InsufficientCash {
                total,
                received: cash_received,
            }
            .into());
        }

        let order = Order {
            id: OrderId::random(),
            items: self.cart.order_items(),
            total,
            payment: Payment::Cash {
                cash_received,
                change: cash_received.saturating_sub(total),
            },
            timestamp: Utc::now(),
        };

        if let Err(e) =
            with_store_timeout(self.config.store_timeout, self.orders.save(order.clone())).await
        {
            tracing::error!(order_id = %order.id, error = %e, "failed to save cash order");
            return Err(e.into());
        }

        tracing::info!(order_id = %order.id, total = %order.total, "cash order recorded");
        self.cart.clear();
        self.state = PaymentState::Completed {
            order_id: order.id.clone(),
        };
        Ok(Completion {
            order,
            source: OrderSource::Cash,
        })
    }

    /// Validates the phone, starts an STK push and records the pending payment.
    ///
    /// Returns the correlation id to wait on. The notification subscription
    /// is opened before the gateway is called so a fast callback is not lost.
    pub async fn initiate_mpesa(&mut self, raw_phone: &str) -> Result<CorrelationId> {
        self.start_attempt()?;
        let phone = phone::validate(raw_phone)?;
        if self.cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }

        let total = self.cart.total()?;
        let draft = Order {
            id: OrderId::random(),
            items: self.cart.order_items(),
            total,
            payment: Payment::Mpesa {
                mpesa_number: Some(phone.to_string()),
                mpesa_receipt: None,
            },
            timestamp: Utc::now(),
        };

        self.state = PaymentState::Initiated;
        let subscription = match self.channel.subscribe().await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.fail(e.to_string());
                return Err(e.into());
            }
        };
        self.subscription = Some(subscription);

        let limit = self.config.gateway_timeout;
        let initiated = tokio::time::timeout(limit, self.gateway.initiate(total, &phone, &draft))
            .await
            .unwrap_or(Err(GatewayError::Timeout(limit)));
        let correlation_id = match initiated {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(order_id = %draft.id, error = %e, "M-Pesa initiation failed");
                self.fail(e.to_string());
                return Err(e.into());
            }
        };

        self.state = PaymentState::AwaitingConfirmation {
            correlation_id: correlation_id.clone(),
        };
        tracing::info!(%correlation_id, order_id = %draft.id, %total, "M-Pesa payment initiated");

        let pending = PendingPayment {
            correlation_id: correlation_id.clone(),
            order_draft: draft.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) =
            with_store_timeout(self.config.store_timeout, self.pending.put(pending)).await
        {
            tracing::warn!(%correlation_id, error = %e, "failed to save pending payment");
        }

        self.attempt = Some(MpesaAttempt { phone, draft });
        Ok(correlation_id)
    }

    /// Applies one gateway callback.
    ///
    /// Safe to call again with the same event: a correlation id settled in
    /// this session yields `Duplicate` without writing anything.
    pub async fn handle_notification(
        &mut self,
        event: PaymentNotification,
    ) -> Result<ConfirmationOutcome> {
        if let Some(order_id) = self.settled.get(&event.correlation_id) {
            tracing::debug!(correlation_id = %event.correlation_id, "duplicate confirmation");
            return Ok(ConfirmationOutcome::Duplicate {
                correlation_id: event.correlation_id,
                order_id: order_id.clone(),
            });
        }

        let awaited = matches!(
            &self.state,
            PaymentState::AwaitingConfirmation { correlation_id } if *correlation_id == event.correlation_id
        );
        if !awaited {
            tracing::debug!(correlation_id = %event.correlation_id, "ignoring unrelated notification");
            return Ok(ConfirmationOutcome::Ignored);
        }

        if !event.is_success() {
            let description = if event.result_description.is_empty() {
                "M-Pesa payment failed".to_string()
            } else {
                event.result_description.clone()
            };
            tracing::info!(
                correlation_id = %event.correlation_id,
                result_code = event.result_code,
                %description,
                "M-Pesa payment failed"
            );
            self.fail(description.clone());
            return Ok(ConfirmationOutcome::Failed {
                correlation_id: event.correlation_id,
                description,
            });
        }

        self.record_confirmed(event).await
    }

    async fn record_confirmed(&mut self, event: PaymentNotification) -> Result<ConfirmationOutcome> {
        let correlation_id = event.correlation_id.clone();
        let receipt = event.receipt();
        let limit = self.config.store_timeout;

        let (draft, source) =
            match with_store_timeout(limit, self.pending.get(&correlation_id)).await {
                Ok(Some(pending)) => (pending.order_draft, OrderSource::ReconciledFromStore),
                lookup => {
                    if let Err(e) = lookup {
                        tracing::warn!(%correlation_id, error = %e, "could not read pending payment, reconstructing order");
                    } else {
                        tracing::warn!(%correlation_id, "no pending payment found, reconstructing order");
                    }
                    match self.reconstruct_from_session() {
                        Ok(order) => (order, OrderSource::ReconstructedFromSession),
                        Err(e) => {
                            tracing::error!(%correlation_id, error = %e, "payment confirmed but the order could not be rebuilt");
                            self.fail("payment received but the order could not be rebuilt");
                            return Err(e.into());
                        }
                    }
                }
            };

        let order = confirm_draft(draft, receipt);
        if let Err(e) = with_store_timeout(limit, self.orders.save(order.clone())).await {
            tracing::error!(
                %correlation_id,
                order_id = %order.id,
                error = %e,
                "payment confirmed but order could not be recorded"
            );
            self.fail("payment received but the order could not be recorded");
            return Err(PosError::UnrecordedPayment {
                correlation_id,
                source: e,
            });
        }

        if let Err(e) = with_store_timeout(limit, self.pending.delete(&correlation_id)).await {
            tracing::warn!(%correlation_id, error = %e, "failed to delete pending payment");
        }

        tracing::info!(%correlation_id, order_id = %order.id, total = %order.total, ?source, "M-Pesa order recorded");
        self.settled.insert(correlation_id, order.id.clone());
        self.cart.clear();
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.attempt = None;
        self.state = PaymentState::Completed {
            order_id: order.id.clone(),
        };

        Ok(ConfirmationOutcome::Completed(Completion { order, source }))
    }

    /// Best-effort order from local state. Keeps the draft's id so a later
    /// write of the stored draft lands on the same order.
    fn reconstruct_from_session(&self) -> std::result::Result<Order, ValidationError> {
        Ok(match &self.attempt {
            Some(attempt) => Order {
                payment: Payment::Mpesa {
                    mpesa_number: Some(attempt.phone.to_string()),
                    mpesa_receipt: None,
                },
                ..attempt.draft.clone()
            },
            None => Order {
                id: OrderId::random(),
                items: self.cart.order_items(),
                total: self.cart.total()?,
                payment: Payment::Mpesa {
                    mpesa_number: None,
                    mpesa_receipt: None,
                },
                timestamp: Utc::now(),
            },
        })
    }

    /// Waits for the callback of the payment in flight.
    ///
    /// Unrelated and duplicate notifications are skipped. Gives up after the
    /// configured confirmation timeout, leaving the pending record in place.
    pub async fn await_confirmation(&mut self) -> Result<ConfirmationOutcome> {
        let correlation_id = match &self.state {
            PaymentState::AwaitingConfirmation { correlation_id } => correlation_id.clone(),
            other => {
                return Err(PosError::InvalidState(format!(
                    "no payment awaiting confirmation (state: {other:?})"
                )));
            }
        };
        let Some(mut subscription) = self.subscription.take() else {
            return Err(PosError::InvalidState(
                "notification subscription was cancelled".to_string(),
            ));
        };

        let limit = self.config.confirmation_timeout;
        let deadline = Instant::now() + limit;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, subscription.next()).await {
                Err(_) => {
                    tracing::warn!(%correlation_id, ?limit, "no M-Pesa confirmation received in time");
                    self.fail(format!("no confirmation received within {limit:?}"));
                    return Ok(ConfirmationOutcome::TimedOut { correlation_id });
                }
                Ok(None) => {
                    self.fail("notification channel closed");
                    return Err(ChannelError::Closed.into());
                }
                Ok(Some(event)) => match self.handle_notification(event).await? {
                    ConfirmationOutcome::Ignored | ConfirmationOutcome::Duplicate { .. } => continue,
                    outcome => return Ok(outcome),
                },
            }
        }
    }

    /// Walks away from the payment in flight, e.g. when the payment view is
    /// closed.
    ///
    /// Only the subscription is dropped. The gateway request and the pending
    /// record are left alone, since the customer may still pay; such a late
    /// confirmation is settled by the `Reconciler`.
    pub fn cancel(&mut self) -> Option<CorrelationId> {
        let abandoned = match &self.state {
            PaymentState::AwaitingConfirmation { correlation_id } => Some(correlation_id.clone()),
            _ => None,
        };
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(correlation_id) = &abandoned {
            tracing::info!(%correlation_id, "stopped waiting for M-Pesa confirmation");
        }
        self.attempt = None;
        self.state = PaymentState::Idle;
        abandoned
    }

    /// The payment methods the current state allows starting.
    pub fn available_methods(&self) -> &'static [PaymentMethod] {
        if self.state.is_in_flight() {
            &[]
        } else {
            &[PaymentMethod::Cash, PaymentMethod::Mpesa]
        }
    }
}
