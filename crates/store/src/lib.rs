//! Persistence for orders, the compliance config and the audit log.
//!
//! Two interchangeable backends: [`MemoryStore`] for tests and
//! [`PgStore`] for production. Both also serve as the compliance crate's
//! [`ConfigSource`](compliance::ConfigSource) and
//! [`BuyerHistory`](compliance::BuyerHistory).
//!
//! Order insertion is the store's one subtle operation: when a
//! [`FirearmWindowGuard`] is supplied, the rolling-window firearm count is
//! recomputed inside the same atomic unit as the insert, so two checkouts
//! racing past the pre-payment check cannot both land below the limit.

pub mod audit;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use audit::{AuditKind, AuditRecord};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{AuditStore, ConfigStore, ConfigUpdate, FirearmWindowGuard, OrderStore};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
