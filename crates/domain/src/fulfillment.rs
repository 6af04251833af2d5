//! Fulfillment routing.
//!
//! Splits a cart into shipment groups. Routing is a pure function of the
//! items and the routing policy, so re-running it on the same input always
//! yields the same groups in the same order.

use std::collections::{HashMap, HashSet};

use common::FflId;
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;

/// Where an item ships from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentSource {
    InHouse,
    Distributor,
}

/// How a shipment group reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    /// Shipped from our warehouse to the buyer's FFL.
    InHouseToFfl,
    /// Drop-shipped by the distributor to the buyer's FFL.
    DropShipToFfl,
    /// Drop-shipped directly to the customer.
    DropShipToCustomer,
}

impl FulfillmentType {
    /// True if shipments of this type must go to an FFL.
    pub fn requires_ffl(&self) -> bool {
        matches!(
            self,
            FulfillmentType::InHouseToFfl | FulfillmentType::DropShipToFfl
        )
    }

    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentType::InHouseToFfl => "in_house_to_ffl",
            FulfillmentType::DropShipToFfl => "drop_ship_to_ffl",
            FulfillmentType::DropShipToCustomer => "drop_ship_to_customer",
        }
    }
}

impl std::fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One shipment group of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentGroup {
    /// 1-based position in the deterministic group order, used for
    /// downstream shipment numbering.
    pub group_number: u32,
    pub fulfillment_type: FulfillmentType,
    pub items: Vec<CartItem>,
    pub ffl_required: bool,
    /// Set during persistence once the recipient FFL is snapshotted.
    pub ffl_id: Option<FflId>,
}

/// Per-product routing configuration.
///
/// Source resolution order for FFL-bound items: explicit per-SKU override,
/// then the in-house stock allow-list, then `Distributor`.
#[derive(Debug, Clone, Default)]
pub struct RoutingPolicy {
    in_house_skus: HashSet<String>,
    source_overrides: HashMap<String, FulfillmentSource>,
}

impl RoutingPolicy {
    /// Creates an empty policy (everything drop-ships from the distributor).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a SKU to the in-house stock allow-list.
    pub fn with_in_house_sku(mut self, sku: impl Into<String>) -> Self {
        self.in_house_skus.insert(sku.into());
        self
    }

    /// Adds an explicit per-SKU source override.
    pub fn with_override(mut self, sku: impl Into<String>, source: FulfillmentSource) -> Self {
        self.source_overrides.insert(sku.into(), source);
        self
    }

    /// Resolves the fulfillment source for one item.
    pub fn resolve_source(&self, item: &CartItem) -> FulfillmentSource {
        if let Some(source) = self.source_overrides.get(&item.sku) {
            return *source;
        }
        if self.in_house_skus.contains(&item.sku) {
            return FulfillmentSource::InHouse;
        }
        FulfillmentSource::Distributor
    }
}

/// Groups cart items into 0-3 fulfillment groups.
///
/// FFL-bound items never co-mingle with direct-to-customer items; group
/// order is fixed (InHouseToFfl, DropShipToFfl, DropShipToCustomer).
pub fn route(items: &[CartItem], policy: &RoutingPolicy) -> Vec<FulfillmentGroup> {
    let mut in_house_ffl: Vec<CartItem> = Vec::new();
    let mut drop_ship_ffl: Vec<CartItem> = Vec::new();
    let mut direct: Vec<CartItem> = Vec::new();

    for item in items {
        if item.needs_ffl() {
            match policy.resolve_source(item) {
                FulfillmentSource::InHouse => in_house_ffl.push(item.clone()),
                FulfillmentSource::Distributor => drop_ship_ffl.push(item.clone()),
            }
        } else {
            direct.push(item.clone());
        }
    }

    let buckets = [
        (FulfillmentType::InHouseToFfl, in_house_ffl),
        (FulfillmentType::DropShipToFfl, drop_ship_ffl),
        (FulfillmentType::DropShipToCustomer, direct),
    ];

    let mut groups = Vec::new();
    for (fulfillment_type, items) in buckets {
        if items.is_empty() {
            continue;
        }
        groups.push(FulfillmentGroup {
            group_number: groups.len() as u32 + 1,
            fulfillment_type,
            items,
            ffl_required: fulfillment_type.requires_ffl(),
            ffl_id: None,
        });
    }
    groups
}
