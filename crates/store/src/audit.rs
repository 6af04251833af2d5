//! Append-only compliance audit trail.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of event an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// Checkout refused by jurisdiction rules before payment.
    CheckoutBlocked,
    /// A compliance hold was applied to an order.
    HoldApplied,
    /// An operator released a hold.
    HoldOverridden,
    /// Distributor rejected or failed an order after payment capture.
    DistributorFailure,
    /// Order persistence failed after payment capture.
    PersistenceFailure,
    /// CRM sync failed (order itself unaffected).
    CrmFailure,
    /// The compliance config was replaced.
    ConfigUpdated,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::CheckoutBlocked => "checkout_blocked",
            AuditKind::HoldApplied => "hold_applied",
            AuditKind::HoldOverridden => "hold_overridden",
            AuditKind::DistributorFailure => "distributor_failure",
            AuditKind::PersistenceFailure => "persistence_failure",
            AuditKind::CrmFailure => "crm_failure",
            AuditKind::ConfigUpdated => "config_updated",
        }
    }
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable audit trail entry.
///
/// `payment_captured` and the transaction id are recorded explicitly so an
/// operator reading the trail can tell at a glance whether money moved,
/// even for failures that left no order behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub order_id: Option<OrderId>,
    pub kind: AuditKind,
    pub payment_captured: bool,
    pub payment_transaction_id: Option<String>,
    pub detail: String,
    pub operator_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Creates a record with no order, payment or operator attached.
    pub fn new(kind: AuditKind, detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: None,
            kind,
            payment_captured: false,
            payment_transaction_id: None,
            detail: detail.into(),
            operator_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Marks that payment was captured, with the gateway transaction id.
    pub fn with_payment(mut self, transaction_id: impl Into<String>) -> Self {
        self.payment_captured = true;
        self.payment_transaction_id = Some(transaction_id.into());
        self
    }

    pub fn by_operator(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = Some(operator_id.into());
        self
    }
}
