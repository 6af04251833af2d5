//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of a persisted order.
///
/// The serde names are the user-facing labels, so the stored form, the
/// checkout response and the order endpoints all spell a status the
/// same way.
///
/// Transitions move forward only; the admin override of a hold
/// (`PendingFfl` / `MultiFirearmHold` -> `ReadyToFulfill`) is itself a
/// forward transition. There is no status for a hard-blocked checkout:
/// blocked checkouts never create an order.
///
/// ```text
///                      ┌──► PendingFfl ───────────┐
/// (checkout) ──────────┼──► MultiFirearmHold ─────┼──► ReadyToFulfill ──► Shipped
///                      └──► Paid ──► Processing ──┘
///                              │         ▲
///                              ▼         │
///                    ManualProcessing(Required|Critical)
///
/// every non-terminal status ──► Canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Payment captured, no hold, not yet submitted downstream.
    Paid,

    /// Payment captured; fulfillment gated on a verified FFL.
    #[serde(rename = "Pending FFL")]
    PendingFfl,

    /// Payment captured; fulfillment gated on the rolling-window firearm
    /// limit review.
    #[serde(rename = "Hold - Multi-Firearm")]
    MultiFirearmHold,

    /// Accepted by the distributor, being fulfilled.
    Processing,

    /// Distributor rejected the order after payment capture; operator
    /// action required.
    #[serde(rename = "Manual Processing Required")]
    ManualProcessingRequired,

    /// Distributor submission failed technically (timeout, transport)
    /// after payment capture; operator action required, higher urgency.
    #[serde(rename = "Manual Processing Required - Critical")]
    ManualProcessingCritical,

    /// Cleared for fulfillment (hold released or fulfillment prepared).
    #[serde(rename = "Ready to Fulfill")]
    ReadyToFulfill,

    /// Order has shipped (terminal).
    Shipped,

    /// Order was canceled (terminal).
    Canceled,
}

impl OrderStatus {
    /// Returns true if this status gates fulfillment pending manual or
    /// policy clearance.
    pub fn is_hold(&self) -> bool {
        matches!(self, OrderStatus::PendingFfl | OrderStatus::MultiFirearmHold)
    }

    /// Returns true if an operator must intervene before fulfillment.
    pub fn needs_manual_processing(&self) -> bool {
        matches!(
            self,
            OrderStatus::ManualProcessingRequired | OrderStatus::ManualProcessingCritical
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Canceled)
    }

    /// Returns true if orders in this status count toward the rolling
    /// firearm purchase window. Canceled orders never count.
    pub fn counts_toward_firearm_window(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid
                | OrderStatus::PendingFfl
                | OrderStatus::ReadyToFulfill
                | OrderStatus::Shipped
        )
    }

    /// Returns true if the transition to `next` is allowed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Paid, Processing)
            | (Paid, ManualProcessingRequired)
            | (Paid, ManualProcessingCritical)
            | (Paid, ReadyToFulfill)
            | (PendingFfl, ReadyToFulfill)
            | (MultiFirearmHold, ReadyToFulfill)
            | (Processing, ReadyToFulfill)
            | (Processing, Shipped)
            | (ManualProcessingRequired, Processing)
            | (ManualProcessingRequired, ReadyToFulfill)
            | (ManualProcessingCritical, Processing)
            | (ManualProcessingCritical, ReadyToFulfill)
            | (ReadyToFulfill, Shipped) => true,
            (from, Canceled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Returns the user-facing status label.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Paid => "Paid",
            OrderStatus::PendingFfl => "Pending FFL",
            OrderStatus::MultiFirearmHold => "Hold - Multi-Firearm",
            OrderStatus::Processing => "Processing",
            OrderStatus::ManualProcessingRequired => "Manual Processing Required",
            OrderStatus::ManualProcessingCritical => "Manual Processing Required - Critical",
            OrderStatus::ReadyToFulfill => "Ready to Fulfill",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
