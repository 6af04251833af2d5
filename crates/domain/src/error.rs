//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested status change is not allowed by the transition table.
    #[error("invalid order status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// An order must contain at least one item.
    #[error("order has no items")]
    EmptyOrder,

    /// Item quantities must be positive.
    #[error("item {sku} has zero quantity")]
    ZeroQuantity { sku: String },
}
