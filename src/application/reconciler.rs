use super::checkout::{Completion, OrderSource, confirm_draft};
use super::with_store_timeout;
use crate::config::CheckoutConfig;
use crate::domain::payment::{CorrelationId, PaymentNotification, PendingPayment};
use crate::domain::ports::{OrderStoreBox, PendingPaymentStoreBox, Subscription};
use crate::error::{PosError, Result};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// A pending payment was confirmed and its order written.
    Recorded(Completion),
    /// No pending record: already settled by a session, or not ours.
    NothingPending { correlation_id: CorrelationId },
    /// The gateway reported failure; the record stays for manual follow-up.
    LeftPending {
        correlation_id: CorrelationId,
        description: String,
    },
}

/// Settles gateway callbacks that arrive when no session is waiting for them,
/// e.g. after the shopper closed the payment view.
///
/// Confirmed payments are always written; nothing is surfaced to a shopper.
/// Running alongside a live session is harmless: both sides write the same
/// order id and `OrderStore::save` is an upsert.
pub struct Reconciler {
    orders: OrderStoreBox,
    pending: PendingPaymentStoreBox,
    config: CheckoutConfig,
}

impl Reconciler {
    pub fn new(orders: OrderStoreBox, pending: PendingPaymentStoreBox, config: CheckoutConfig) -> Self {
        Self {
            orders,
            pending,
            config,
        }
    }

    pub async fn handle(&self, event: PaymentNotification) -> Result<ReconcileOutcome> {
        let correlation_id = event.correlation_id.clone();
        let limit = self.config.store_timeout;

        if !event.is_success() {
            tracing::info!(
                %correlation_id,
                result_code = event.result_code,
                description = %event.result_description,
                "payment failed, pending record kept"
            );
            return Ok(ReconcileOutcome::LeftPending {
                correlation_id,
                description: event.result_description,
            });
        }

        let pending = match with_store_timeout(limit, self.pending.get(&correlation_id)).await {
            Ok(Some(pending)) => pending,
            Ok(None) => {
                tracing::debug!(%correlation_id, "no pending payment to reconcile");
                return Ok(ReconcileOutcome::NothingPending { correlation_id });
            }
            // Nothing is deleted, so `stale_pending` keeps reporting the record.
            Err(e) => {
                tracing::warn!(
                    %correlation_id,
                    error = %e,
                    "confirmed payment left pending: record could not be read"
                );
                return Err(e.into());
            }
        };

        let order = confirm_draft(pending.order_draft, event.receipt());
        if let Err(e) = with_store_timeout(limit, self.orders.save(order.clone())).await {
            tracing::error!(
                %correlation_id,
                order_id = %order.id,
                error = %e,
                "payment confirmed but order could not be recorded"
            );
            return Err(PosError::UnrecordedPayment {
                correlation_id,
                source: e,
            });
        }

        if let Err(e) = with_store_timeout(limit, self.pending.delete(&correlation_id)).await {
            tracing::warn!(%correlation_id, error = %e, "failed to delete pending payment");
        }

        tracing::info!(%correlation_id, order_id = %order.id, "late M-Pesa confirmation recorded");
        Ok(ReconcileOutcome::Recorded(Completion {
            order,
            source: OrderSource::ReconciledFromStore,
        }))
    }

    /// Handles notifications until the channel closes. Per-event failures
    /// are logged and do not stop the loop. Returns how many orders were
    /// written.
    pub async fn run(&self, mut subscription: Subscription) -> usize {
        let mut recorded = 0;
        while let Some(event) = subscription.next().await {
            match self.handle(event).await {
                Ok(ReconcileOutcome::Recorded(_)) => recorded += 1,
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "failed to reconcile notification"),
            }
        }
        recorded
    }

    /// Pending payments older than `max_age` at `now`, oldest first.
    ///
    /// These are orphans: initiated but never confirmed or failed. They are
    /// only reported, never deleted, because the money may still have moved.
    pub async fn stale_pending(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Result<Vec<PendingPayment>> {
        let all = with_store_timeout(self.config.store_timeout, self.pending.list()).await?;
        let stale: Vec<PendingPayment> = all
            .into_iter()
            .filter(|p| now - p.created_at > max_age)
            .collect();
        for orphan in &stale {
            tracing::warn!(
                correlation_id = %orphan.correlation_id,
                order_id = %orphan.order_draft.id,
                created_at = %orphan.created_at,
                "orphaned pending payment"
            );
        }
        Ok(stale)
    }
}
