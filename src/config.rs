use std::time::Duration;

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Bounds on every suspension point of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Limit on `PaymentGateway::initiate`.
    pub gateway_timeout: Duration,
    /// Limit on each order / pending-payment store call.
    pub store_timeout: Duration,
    /// How long to wait for the gateway callback before failing the attempt.
    pub confirmation_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }
}

impl CheckoutConfig {
    pub fn from_secs(gateway: u64, store: u64, confirmation: u64) -> Self {
        Self {
            gateway_timeout: Duration::from_secs(gateway),
            store_timeout: Duration::from_secs(store),
            confirmation_timeout: Duration::from_secs(confirmation),
        }
    }
}
