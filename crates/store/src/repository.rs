//! Store traits shared by the memory and Postgres backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use compliance::ComplianceConfig;
use domain::Order;

use crate::Result;
use crate::audit::AuditRecord;

/// Parameters for the atomic count-and-insert check.
///
/// When present on an insert, the store recomputes the buyer's qualifying
/// firearm quantity inside the insert's atomic unit and upgrades a `Paid`
/// order to the multi-firearm hold if past plus incoming quantity reaches
/// `limit`. This closes the race where two concurrent checkouts both read
/// a count below the limit before either order exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirearmWindowGuard {
    /// Inclusive start of the rolling window.
    pub window_start: DateTime<Utc>,
    /// Firearm quantity at or above which the hold applies.
    pub limit: u32,
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order, applying the window guard if given.
    ///
    /// Idempotent on the order id: re-inserting an id that already exists
    /// returns the stored order unchanged, so a retried persistence
    /// attempt cannot create a duplicate.
    async fn insert_order(
        &self,
        order: Order,
        guard: Option<FirearmWindowGuard>,
    ) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Order>;

    /// Persists status and enrichment changes to an existing order.
    async fn update_order(&self, order: &Order) -> Result<()>;

    /// All orders for a buyer, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;
}

/// Settings for a compliance config replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub firearm_window_days: u32,
    pub firearm_limit_per_window: u32,
    pub multi_firearm_hold_enabled: bool,
    pub ffl_hold_enabled: bool,
}

/// Compliance config persistence.
///
/// Config rows are never mutated in place. An update atomically
/// deactivates the current row and inserts a new one with the next
/// version, so readers see either the old config or the new one, never a
/// half-applied mix. Callers must invalidate the config cache afterwards.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn active_config(&self) -> Result<ComplianceConfig>;

    /// Replaces the active config, returning the new row.
    async fn update_config(&self, update: ConfigUpdate) -> Result<ComplianceConfig>;
}

/// Append-only audit trail persistence.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, record: AuditRecord) -> Result<()>;

    /// Audit records for one order, oldest first.
    async fn audit_for_order(&self, order_id: OrderId) -> Result<Vec<AuditRecord>>;
}
