//! Checkout error types.

use common::OrderId;
use compliance::BlockedItem;
use thiserror::Error;

/// Errors that can end a checkout or an order operation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Jurisdiction rules refuse the cart. Nothing was charged and no
    /// order exists.
    #[error("checkout blocked by jurisdiction rules ({} item(s))", blocked.len())]
    HardBlock { blocked: Vec<BlockedItem> },

    /// Payment capture failed or timed out. No order exists.
    #[error("payment capture failed: {0}")]
    CaptureFailure(String),

    /// Payment was captured but the order could not be persisted even
    /// after a retry. The transaction id is preserved for the operator;
    /// nothing is refunded automatically.
    #[error("order persistence failed after capture (transaction {transaction_id}): {source}")]
    Persistence {
        transaction_id: String,
        source: store::StoreError,
    },

    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested hold override is not possible.
    #[error("invalid hold override: {0}")]
    InvalidOverride(String),

    #[error("invalid checkout request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error(transparent)]
    Compliance(#[from] compliance::ComplianceError),

    #[error(transparent)]
    Domain(#[from] domain::DomainError),
}
