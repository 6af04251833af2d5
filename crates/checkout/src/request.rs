//! Checkout request and outcome types.

use common::{FflId, OrderId, StateCode, UserId};
use compliance::HoldType;
use domain::{CartItem, Money, OrderNumber, OrderStatus, cart_total};
use serde::{Deserialize, Serialize};

/// Buyer contact details, passed through to the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// One checkout attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    /// Destination state used for jurisdiction rules.
    pub shipping_state: StateCode,
    /// Opaque gateway payment method token.
    pub payment_method: String,
    pub customer: CustomerInfo,
    /// Dealer the buyer picked for this order, overriding the one on file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffl_recipient_id: Option<FflId>,
}

impl CheckoutRequest {
    /// Total cart amount.
    pub fn total(&self) -> Money {
        cart_total(&self.items)
    }
}

/// A hold reported back to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldNotice {
    pub hold_type: HoldType,
    pub reason: String,
}

/// What a successful checkout produced.
///
/// "Successful" includes held orders: payment was captured and an order
/// exists, fulfillment is just gated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOutcome {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold: Option<HoldNotice>,
    pub payment_transaction_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_total_sums_line_totals() {
        let request = CheckoutRequest {
            user_id: UserId::new(),
            items: vec![
                CartItem::new("SLING-1", 2, Money::from_cents(1999)),
                CartItem::firearm("RIFLE-1", 1, Money::from_cents(79900)),
            ],
            shipping_state: StateCode::parse("TX").unwrap(),
            payment_method: "tok_visa".to_string(),
            customer: CustomerInfo {
                email: "buyer@example.com".to_string(),
                first_name: "Jordan".to_string(),
                last_name: "Reyes".to_string(),
                phone: None,
            },
            ffl_recipient_id: None,
        };
        assert_eq!(request.total().cents(), 2 * 1999 + 79900);
    }
}
