//! Compliance verdict types.

use common::StateCode;
use serde::{Deserialize, Serialize};

/// Why an item was hard-blocked for a jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    CategoryBlocked,
    FirearmBlocked,
    AmmunitionBlocked,
    MagazineCapacity,
    CustomRule,
}

/// One hard-blocked cart item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedItem {
    pub sku: String,
    pub state: StateCode,
    pub reason: BlockReason,
    /// User-facing explanation naming the item and jurisdiction.
    pub detail: String,
}

/// The kind of soft stop applied to an otherwise legal checkout.
///
/// At most one hold applies per order; the FFL hold takes precedence over
/// the multi-firearm hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldType {
    /// Buyer has no verified, ATF-active preferred FFL on file.
    Ffl,
    /// Rolling-window firearm purchase limit reached.
    MultiFirearm,
}

impl HoldType {
    /// Returns the hold name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldType::Ffl => "ffl",
            HoldType::MultiFirearm => "multi_firearm",
        }
    }
}

impl std::fmt::Display for HoldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of compliance evaluation for one checkout attempt.
///
/// A non-empty `blocked_items` list is a hard stop: the checkout is
/// refused before any payment attempt. A hold is a soft stop: payment is
/// still captured, only fulfillment is gated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub has_firearms: bool,
    pub hold: Option<HoldType>,
    pub blocked_items: Vec<BlockedItem>,
    /// Firearm quantity in the current cart.
    pub current_firearm_count: u32,
    /// Qualifying firearm quantity purchased inside the rolling window.
    pub past_firearm_count: u32,
    /// Machine-readable-ish summary of the decisive check.
    pub reason: Option<String>,
}

impl ComplianceVerdict {
    /// Creates a clean verdict for the given counts.
    pub fn clean(has_firearms: bool, current: u32, past: u32) -> Self {
        Self {
            has_firearms,
            hold: None,
            blocked_items: Vec::new(),
            current_firearm_count: current,
            past_firearm_count: past,
            reason: None,
        }
    }

    /// True when the checkout must be refused outright.
    pub fn is_blocked(&self) -> bool {
        !self.blocked_items.is_empty()
    }

    /// True when fulfillment must be gated.
    pub fn requires_hold(&self) -> bool {
        self.hold.is_some()
    }

    /// True when neither a block nor a hold applies.
    pub fn is_clean(&self) -> bool {
        !self.is_blocked() && !self.requires_hold()
    }
}
