use super::notifications::BroadcastNotificationChannel;
use crate::domain::money::Amount;
use crate::domain::order::Order;
use crate::domain::payment::{
    CallbackItem, CallbackMetadata, CorrelationId, PaymentNotification, RESULT_CODE_SUCCESS,
};
use crate::domain::phone::CanonicalPhone;
use crate::domain::ports::PaymentGateway;
use crate::error::GatewayError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result code the gateway reports when the customer dismisses the prompt.
pub const RESULT_CODE_CANCELLED: i64 = 1032;

/// What the simulated customer does with the STK push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulatedOutcome {
    /// Pays; a success callback is published.
    #[default]
    Success,
    /// Cancels; a failure callback is published.
    Failure,
    /// Never answers; no callback is published.
    Silent,
    /// The initiation request itself is rejected.
    Reject,
}

impl FromStr for SimulatedOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failure" | "fail" => Ok(Self::Failure),
            "silent" => Ok(Self::Silent),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown outcome '{other}'")),
        }
    }
}

/// In-process stand-in for the M-Pesa STK push API.
///
/// Each initiation is issued a fresh `ws_CO_…` correlation id and the
/// configured callback is published on the notification channel right away,
/// so callers must subscribe before initiating.
pub struct SimulatedGateway {
    channel: BroadcastNotificationChannel,
    outcome: SimulatedOutcome,
    sequence: AtomicU64,
}

impl SimulatedGateway {
    pub fn new(channel: BroadcastNotificationChannel, outcome: SimulatedOutcome) -> Self {
        Self {
            channel,
            outcome,
            sequence: AtomicU64::new(1),
        }
    }

    /// Issues a fresh correlation id along with its sequence number.
    fn next_correlation_id(&self) -> (CorrelationId, u64) {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = CorrelationId::new(format!("ws_CO_{}_{n:06}", Utc::now().format("%d%m%Y%H%M%S")));
        (id, n)
    }

    fn success_callback(
        correlation_id: CorrelationId,
        amount: Amount,
        phone: &CanonicalPhone,
        sequence: u64,
    ) -> PaymentNotification {
        let item = |name: &str, value: Value| CallbackItem {
            name: name.to_string(),
            value,
        };
        PaymentNotification {
            correlation_id,
            result_code: RESULT_CODE_SUCCESS,
            result_description: "The service request is processed successfully.".to_string(),
            metadata: Some(CallbackMetadata {
                items: vec![
                    item("Amount", Value::String(amount.to_string())),
                    item("MpesaReceiptNumber", Value::String(format!("SIM{sequence:07}"))),
                    item(
                        "TransactionDate",
                        Value::String(Utc::now().format("%Y%m%d%H%M%S").to_string()),
                    ),
                    item("PhoneNumber", Value::String(phone.to_string())),
                ],
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn initiate(
        &self,
        amount: Amount,
        phone: &CanonicalPhone,
        order_draft: &Order,
    ) -> Result<CorrelationId, GatewayError> {
        if self.outcome == SimulatedOutcome::Reject {
            return Err(GatewayError::Rejected(
                "Failed to initiate M-Pesa payment".to_string(),
            ));
        }

        let (correlation_id, sequence) = self.next_correlation_id();
        tracing::debug!(
            %correlation_id,
            order_id = %order_draft.id,
            %amount,
            "simulated STK push"
        );

        match self.outcome {
            SimulatedOutcome::Success => {
                self.channel.publish(Self::success_callback(
                    correlation_id.clone(),
                    amount,
                    phone,
                    sequence,
                ));
            }
            SimulatedOutcome::Failure => {
                self.channel.publish(PaymentNotification {
                    correlation_id: correlation_id.clone(),
                    result_code: RESULT_CODE_CANCELLED,
                    result_description: "Request cancelled by user".to_string(),
                    metadata: None,
                });
            }
            SimulatedOutcome::Silent | SimulatedOutcome::Reject => {}
        }

        Ok(correlation_id)
    }
}
