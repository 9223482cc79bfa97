//! Application layer containing the checkout orchestration.
//!
//! `Checkout` drives one shopper session: cart mutation, cash payment and the
//! mobile-money state machine. `Reconciler` settles callbacks nobody is
//! listening for, and `OrderHistory` serves the ledger with a local fallback.

pub mod checkout;
pub mod history;
pub mod reconciler;

use crate::error::StoreError;
use std::future::Future;
use std::time::Duration;

/// Runs a store call, treating anything slower than `limit` as a failure.
pub(crate) async fn with_store_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(limit)))
}
