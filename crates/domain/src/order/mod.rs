//! Order aggregate.

mod status;

pub use status::OrderStatus;

use chrono::{DateTime, NaiveDate, Utc};
use common::{FflId, OrderId, StateCode, UserId};
use serde::{Deserialize, Serialize};

use crate::cart::cart_total;
use crate::error::DomainError;
use crate::fulfillment::FulfillmentGroup;
use crate::money::Money;

/// Human-facing order number shown to buyers and operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Derives the order number from the order id so retried persistence
    /// of the same checkout produces the same number.
    pub fn for_order(id: OrderId) -> Self {
        let simple = id.as_uuid().simple().to_string();
        Self(format!("RG-{}", simple.get(..8).unwrap_or("00000000").to_uppercase()))
    }

    /// Returns the order number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of the FFL chosen at checkout time.
///
/// Copied onto the order during persistence so later directory changes do
/// not alter what was agreed at purchase. `is_stale` records that the
/// directory served cached data; such orders are flagged for verification
/// but the checkout still succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FflSnapshot {
    pub ffl_id: FflId,
    pub license_number: String,
    pub business_name: String,
    pub premise_state: StateCode,
    pub atf_active: bool,
    pub is_stale: bool,
    pub fetched_at: DateTime<Utc>,
}

/// Outcome of the distributor submission step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DistributorSubmission {
    /// Submission was not attempted (held orders, or in-house only).
    #[default]
    NotAttempted,

    /// Distributor accepted the order.
    Submitted {
        distributor_order_number: String,
        estimated_ship_date: Option<NaiveDate>,
    },

    /// Distributor submission failed after payment capture.
    Failed { error: String },
}

/// The order aggregate root.
///
/// Created exactly once per successful payment capture; afterwards only the
/// status (through the guarded transition table), the distributor
/// submission record and the CRM deal id change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    order_number: OrderNumber,
    status: OrderStatus,
    hold_reason: Option<String>,
    total_amount: Money,
    destination_state: StateCode,
    fulfillment_groups: Vec<FulfillmentGroup>,
    payment_transaction_id: Option<String>,
    distributor_submission: DistributorSubmission,
    crm_deal_id: Option<String>,
    ffl_snapshot: Option<FflSnapshot>,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order from checkout results.
    ///
    /// `status` must be one of the three entry statuses (`Paid`,
    /// `PendingFfl`, `MultiFirearmHold`); holds carry a reason.
    pub fn create(
        id: OrderId,
        user_id: UserId,
        destination_state: StateCode,
        status: OrderStatus,
        hold_reason: Option<String>,
        fulfillment_groups: Vec<FulfillmentGroup>,
        payment_transaction_id: String,
    ) -> Result<Self, DomainError> {
        if fulfillment_groups.iter().all(|g| g.items.is_empty()) {
            return Err(DomainError::EmptyOrder);
        }
        for item in fulfillment_groups.iter().flat_map(|g| g.items.iter()) {
            if item.quantity == 0 {
                return Err(DomainError::ZeroQuantity {
                    sku: item.sku.clone(),
                });
            }
        }

        let total_amount = fulfillment_groups
            .iter()
            .map(|g| cart_total(&g.items))
            .sum();

        Ok(Self {
            id,
            user_id,
            order_number: OrderNumber::for_order(id),
            status,
            hold_reason,
            total_amount,
            destination_state,
            fulfillment_groups,
            payment_transaction_id: Some(payment_transaction_id),
            distributor_submission: DistributorSubmission::NotAttempted,
            crm_deal_id: None,
            ffl_snapshot: None,
            created_at: Utc::now(),
        })
    }

    /// Moves the order to `next`, rejecting transitions the table forbids.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if !next.is_hold() {
            self.hold_reason = None;
        }
        Ok(())
    }

    /// Upgrades a freshly captured order to the multi-firearm hold.
    ///
    /// Used by the store when the atomic window recount at insert time
    /// finds the limit reached. Only valid from `Paid`; once an order has
    /// been visible in any other status the hold can no longer be applied.
    pub fn apply_multi_firearm_hold(
        &mut self,
        reason: impl Into<String>,
    ) -> Result<(), DomainError> {
        if self.status != OrderStatus::Paid {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: OrderStatus::MultiFirearmHold,
            });
        }
        self.status = OrderStatus::MultiFirearmHold;
        self.hold_reason = Some(reason.into());
        Ok(())
    }

    /// Records the distributor submission outcome.
    pub fn record_distributor_submission(&mut self, submission: DistributorSubmission) {
        self.distributor_submission = submission;
    }

    /// Attaches the FFL snapshot chosen during persistence.
    pub fn attach_ffl_snapshot(&mut self, snapshot: FflSnapshot) {
        let ffl_id = snapshot.ffl_id;
        for group in &mut self.fulfillment_groups {
            if group.ffl_required {
                group.ffl_id = Some(ffl_id);
            }
        }
        self.ffl_snapshot = Some(snapshot);
    }

    /// Records the CRM deal id after a successful sync.
    pub fn record_crm_deal(&mut self, deal_id: impl Into<String>) {
        self.crm_deal_id = Some(deal_id.into());
    }

    /// Total firearm quantity on this order.
    pub fn firearm_quantity(&self) -> u32 {
        self.fulfillment_groups
            .iter()
            .flat_map(|g| g.items.iter())
            .map(|i| i.firearm_quantity())
            .sum()
    }

    // Accessors

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn hold_reason(&self) -> Option<&str> {
        self.hold_reason.as_deref()
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn destination_state(&self) -> StateCode {
        self.destination_state
    }

    pub fn fulfillment_groups(&self) -> &[FulfillmentGroup] {
        &self.fulfillment_groups
    }

    pub fn payment_transaction_id(&self) -> Option<&str> {
        self.payment_transaction_id.as_deref()
    }

    pub fn distributor_submission(&self) -> &DistributorSubmission {
        &self.distributor_submission
    }

    pub fn crm_deal_id(&self) -> Option<&str> {
        self.crm_deal_id.as_deref()
    }

    pub fn ffl_snapshot(&self) -> Option<&FflSnapshot> {
        self.ffl_snapshot.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Test-only backdoor to set the creation instant when building
    /// historical fixtures.
    #[doc(hidden)]
    pub fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
}
