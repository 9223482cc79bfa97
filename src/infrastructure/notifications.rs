use crate::domain::payment::PaymentNotification;
use crate::domain::ports::{NotificationChannel, Subscription};
use crate::error::ChannelError;
use async_trait::async_trait;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out of gateway callbacks.
///
/// Every subscriber sees every notification published after it subscribed;
/// filtering by correlation id is the subscriber's job. Publishing with no
/// subscriber is not an error, the event is simply not observed.
#[derive(Clone)]
pub struct BroadcastNotificationChannel {
    sender: broadcast::Sender<PaymentNotification>,
}

impl Default for BroadcastNotificationChannel {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl BroadcastNotificationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Delivers `event` to current subscribers, returning how many got it.
    pub fn publish(&self, event: PaymentNotification) -> usize {
        let correlation_id = event.correlation_id.clone();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!(%correlation_id, "notification published with no subscriber");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl NotificationChannel for BroadcastNotificationChannel {
    async fn subscribe(&self) -> Result<Subscription, ChannelError> {
        Ok(Subscription::new(self.sender.subscribe()))
    }
}
