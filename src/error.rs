use crate::domain::money::Amount;
use crate::domain::order::OrderId;
use crate::domain::payment::CorrelationId;
use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

/// Local, recoverable input errors. These never reach a backing store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Phone number is too short: enter at least 9 digits")]
    TooFewDigits,
    #[error("Phone number must start with 254")]
    WrongCountryPrefix,
    #[error("Phone number must be exactly 12 digits long")]
    WrongLength,
    #[error("Insufficient cash: received {received}, total is {total}")]
    InsufficientCash { total: Amount, received: Amount },
    #[error("Amount must not be negative")]
    NegativeAmount,
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Amount is too large")]
    AmountOverflow,
}

/// Payment initiation failures reported by (or on the way to) the gateway.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("{0}")]
    Rejected(String),
    #[error("Payment gateway did not answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("Store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Order {0} has no items and cannot be stored")]
    EmptyOrder(OrderId),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Notification channel closed")]
    Closed,
}

#[derive(Error, Debug, Diagnostic)]
pub enum PosError {
    #[error(transparent)]
    #[diagnostic(code(pos::validation))]
    Validation(#[from] ValidationError),

    #[error("Payment initiation failed: {0}")]
    #[diagnostic(code(pos::gateway), help("Check the phone and try the payment again."))]
    Gateway(#[from] GatewayError),

    #[error("Store error: {0}")]
    #[diagnostic(code(pos::store))]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    #[diagnostic(code(pos::channel))]
    Channel(#[from] ChannelError),

    #[error("Payment {correlation_id} was confirmed but the order could not be recorded: {source}")]
    #[diagnostic(
        code(pos::unrecorded_payment),
        help("Failed to complete order. Please contact support.")
    )]
    UnrecordedPayment {
        correlation_id: CorrelationId,
        source: StoreError,
    },

    #[error("Payment failed: {0}")]
    #[diagnostic(code(pos::payment_failed))]
    PaymentFailed(String),

    #[error("Invalid checkout state: {0}")]
    #[diagnostic(code(pos::state))]
    InvalidState(String),

    #[error("Invalid command: {0}")]
    #[diagnostic(code(pos::command))]
    InvalidCommand(String),

    #[error("CSV error: {0}")]
    #[diagnostic(code(pos::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(pos::io))]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PosError>;
