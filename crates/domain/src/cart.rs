//! Cart item input types.
//!
//! A `CartItem` is an immutable input to a checkout attempt; it is never
//! persisted on its own, only inside the fulfillment groups of an order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

/// Product category used by jurisdiction rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Handgun,
    Rifle,
    Shotgun,
    Receiver,
    Ammunition,
    Magazine,
    Optic,
    Accessory,
}

impl ProductCategory {
    /// Returns the category name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Handgun => "handgun",
            ProductCategory::Rifle => "rifle",
            ProductCategory::Shotgun => "shotgun",
            ProductCategory::Receiver => "receiver",
            ProductCategory::Ammunition => "ammunition",
            ProductCategory::Magazine => "magazine",
            ProductCategory::Optic => "optic",
            ProductCategory::Accessory => "accessory",
        }
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single line of a submitted cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Catalog product identifier.
    pub product_id: Uuid,

    /// Stock-keeping unit, also the key for routing overrides.
    pub sku: String,

    /// Quantity ordered, always positive.
    pub quantity: u32,

    /// Price per unit.
    pub unit_price: Money,

    /// True for serialized firearms.
    pub is_firearm: bool,

    /// True for items that must ship to an FFL even if not firearms
    /// themselves (e.g. receivers).
    pub requires_ffl: bool,

    /// Manufacturer name, used by custom jurisdiction predicates.
    pub manufacturer: String,

    /// Round capacity, set only for magazines.
    pub magazine_capacity: Option<u32>,

    /// Category, when the catalog provides one.
    pub category: Option<ProductCategory>,
}

impl CartItem {
    /// Creates a plain (non-firearm, non-FFL) item.
    pub fn new(sku: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: Uuid::new_v4(),
            sku: sku.into(),
            quantity,
            unit_price,
            is_firearm: false,
            requires_ffl: false,
            manufacturer: String::new(),
            magazine_capacity: None,
            category: None,
        }
    }

    /// Creates a firearm item (FFL-required by definition).
    pub fn firearm(sku: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        let mut item = Self::new(sku, quantity, unit_price);
        item.is_firearm = true;
        item.requires_ffl = true;
        item
    }

    /// Sets the product category.
    pub fn with_category(mut self, category: ProductCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Sets the magazine capacity and marks the item as a magazine.
    pub fn with_magazine_capacity(mut self, capacity: u32) -> Self {
        self.magazine_capacity = Some(capacity);
        self.category = Some(ProductCategory::Magazine);
        self
    }

    /// Sets the manufacturer.
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    /// Marks the item as FFL-required without being a firearm.
    pub fn with_requires_ffl(mut self) -> Self {
        self.requires_ffl = true;
        self
    }

    /// Total price for this line (quantity * unit price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// True if the item must ship to an FFL.
    pub fn needs_ffl(&self) -> bool {
        self.is_firearm || self.requires_ffl
    }

    /// Quantity counted against the rolling firearm purchase window.
    pub fn firearm_quantity(&self) -> u32 {
        if self.is_firearm { self.quantity } else { 0 }
    }
}

/// Sums the line totals of a cart.
pub fn cart_total(items: &[CartItem]) -> Money {
    items.iter().map(CartItem::line_total).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firearm_constructor_sets_ffl_flags() {
        let item = CartItem::firearm("RIFLE-1", 1, Money::from_cents(79900));
        assert!(item.is_firearm);
        assert!(item.requires_ffl);
        assert!(item.needs_ffl());
        assert_eq!(item.firearm_quantity(), 1);
    }

    #[test]
    fn accessory_does_not_need_ffl() {
        let item = CartItem::new("SLING-1", 2, Money::from_cents(1999));
        assert!(!item.needs_ffl());
        assert_eq!(item.firearm_quantity(), 0);
    }

    #[test]
    fn receiver_needs_ffl_without_being_firearm() {
        let item = CartItem::new("LOWER-1", 1, Money::from_cents(14900))
            .with_category(ProductCategory::Receiver)
            .with_requires_ffl();
        assert!(!item.is_firearm);
        assert!(item.needs_ffl());
        assert_eq!(item.firearm_quantity(), 0);
    }

    #[test]
    fn magazine_builder_sets_category() {
        let item = CartItem::new("MAG-30", 3, Money::from_cents(1500)).with_magazine_capacity(30);
        assert_eq!(item.category, Some(ProductCategory::Magazine));
        assert_eq!(item.magazine_capacity, Some(30));
    }

    #[test]
    fn line_total_and_cart_total() {
        let items = vec![
            CartItem::new("A", 2, Money::from_cents(1000)),
            CartItem::new("B", 1, Money::from_cents(500)),
        ];
        assert_eq!(items[0].line_total().cents(), 2000);
        assert_eq!(cart_total(&items).cents(), 2500);
    }

    #[test]
    fn cart_item_serialization_roundtrip() {
        let item = CartItem::firearm("PISTOL-9", 1, Money::from_cents(49900))
            .with_category(ProductCategory::Handgun)
            .with_manufacturer("Example Arms");
        let json = serde_json::to_string(&item).unwrap();
        let back: CartItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, back);
    }
}
