use common::OrderId;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("no active compliance config")]
    NoActiveConfig,

    #[error("domain error: {0}")]
    Domain(#[from] domain::DomainError),
}
