//! Per-jurisdiction rule catalog.
//!
//! Pure data and predicate functions; no I/O. Rules are looked up by the
//! normalized two-letter state code; a missing entry means "no
//! restriction".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::StateCode;
use domain::{CartItem, ProductCategory};

use crate::verdict::{BlockReason, BlockedItem};

/// Normalized product view handed to jurisdiction predicates.
#[derive(Debug, Clone)]
pub struct ProductComplianceInfo {
    pub sku: String,
    pub manufacturer: String,
    pub category: Option<ProductCategory>,
    pub is_firearm: bool,
    pub is_ammunition: bool,
    pub magazine_capacity: Option<u32>,
}

impl From<&CartItem> for ProductComplianceInfo {
    fn from(item: &CartItem) -> Self {
        Self {
            sku: item.sku.clone(),
            manufacturer: item.manufacturer.clone(),
            category: item.category,
            is_firearm: item.is_firearm,
            is_ammunition: item.category == Some(ProductCategory::Ammunition),
            magazine_capacity: item.magazine_capacity,
        }
    }
}

/// Custom predicate over a product; returns a block reason when the
/// product may not ship to the state.
pub type CustomPredicate = Arc<dyn Fn(&ProductComplianceInfo) -> Option<String> + Send + Sync>;

/// Predicate set for one jurisdiction.
#[derive(Clone, Default)]
pub struct StateRule {
    blocked_categories: HashSet<ProductCategory>,
    block_all_firearms: bool,
    block_ammunition: bool,
    magazine_capacity_limit: Option<u32>,
    custom: Option<CustomPredicate>,
}

impl std::fmt::Debug for StateRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRule")
            .field("blocked_categories", &self.blocked_categories)
            .field("block_all_firearms", &self.block_all_firearms)
            .field("block_ammunition", &self.block_ammunition)
            .field("magazine_capacity_limit", &self.magazine_capacity_limit)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl StateRule {
    /// Creates an empty rule (no restrictions).
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks a product category outright.
    pub fn block_category(mut self, category: ProductCategory) -> Self {
        self.blocked_categories.insert(category);
        self
    }

    /// Blocks all firearm sales.
    pub fn block_all_firearms(mut self) -> Self {
        self.block_all_firearms = true;
        self
    }

    /// Blocks all ammunition sales.
    pub fn block_ammunition(mut self) -> Self {
        self.block_ammunition = true;
        self
    }

    /// Sets the magazine round-capacity ceiling.
    pub fn magazine_capacity_limit(mut self, limit: u32) -> Self {
        self.magazine_capacity_limit = Some(limit);
        self
    }

    /// Installs a custom predicate.
    pub fn with_custom(mut self, predicate: CustomPredicate) -> Self {
        self.custom = Some(predicate);
        self
    }

    /// Evaluates one item against this rule, returning the block if any.
    pub fn check(&self, item: &CartItem, state: StateCode) -> Option<BlockedItem> {
        let info = ProductComplianceInfo::from(item);

        if let Some(category) = info.category
            && self.blocked_categories.contains(&category)
        {
            return Some(BlockedItem {
                sku: info.sku,
                state,
                reason: BlockReason::CategoryBlocked,
                detail: format!("{category} sales are not permitted in {state}"),
            });
        }

        if self.block_all_firearms && info.is_firearm {
            return Some(BlockedItem {
                sku: info.sku,
                state,
                reason: BlockReason::FirearmBlocked,
                detail: format!("firearm sales are not permitted in {state}"),
            });
        }

        if self.block_ammunition && info.is_ammunition {
            return Some(BlockedItem {
                sku: info.sku,
                state,
                reason: BlockReason::AmmunitionBlocked,
                detail: format!("ammunition sales are not permitted in {state}"),
            });
        }

        if let (Some(limit), Some(capacity)) = (self.magazine_capacity_limit, info.magazine_capacity)
            && info.category == Some(ProductCategory::Magazine)
            && capacity > limit
        {
            return Some(BlockedItem {
                sku: info.sku,
                state,
                reason: BlockReason::MagazineCapacity,
                detail: format!("{capacity}-round magazines exceed the {limit}-round limit in {state}"),
            });
        }

        if let Some(custom) = &self.custom
            && let Some(detail) = custom(&info)
        {
            return Some(BlockedItem {
                sku: info.sku,
                state,
                reason: BlockReason::CustomRule,
                detail,
            });
        }

        None
    }
}

/// The full per-jurisdiction rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: HashMap<StateCode, StateRule>,
}

impl RuleCatalog {
    /// Creates an empty catalog (no jurisdiction restrictions anywhere).
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the rule for a state.
    pub fn with_rule(mut self, state: StateCode, rule: StateRule) -> Self {
        self.rules.insert(state, rule);
        self
    }

    /// Looks up the rule for a state; `None` means no restriction.
    pub fn lookup(&self, state: StateCode) -> Option<&StateRule> {
        self.rules.get(&state)
    }

    /// The shipping rule set: roster-state handgun blocks and
    /// magazine-capacity ceilings currently enforced at checkout.
    pub fn standard() -> Self {
        let ca = StateCode::parse("CA").unwrap_or_else(|_| unreachable!());
        let ny = StateCode::parse("NY").unwrap_or_else(|_| unreachable!());
        let nj = StateCode::parse("NJ").unwrap_or_else(|_| unreachable!());
        let co = StateCode::parse("CO").unwrap_or_else(|_| unreachable!());

        Self::new()
            .with_rule(
                ca,
                StateRule::new()
                    .block_category(ProductCategory::Handgun)
                    .magazine_capacity_limit(10),
            )
            .with_rule(ny, StateRule::new().magazine_capacity_limit(10))
            .with_rule(nj, StateRule::new().magazine_capacity_limit(10))
            .with_rule(co, StateRule::new().magazine_capacity_limit(15))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;

    fn state(code: &str) -> StateCode {
        StateCode::parse(code).unwrap()
    }

    #[test]
    fn missing_state_means_no_restriction() {
        let catalog = RuleCatalog::standard();
        assert!(catalog.lookup(state("TX")).is_none());
    }

    #[test]
    fn blocked_category_is_flagged() {
        let catalog = RuleCatalog::standard();
        let handgun = CartItem::firearm("PISTOL-9", 1, Money::from_cents(49900))
            .with_category(ProductCategory::Handgun);

        let blocked = catalog
            .lookup(state("CA"))
            .unwrap()
            .check(&handgun, state("CA"))
            .unwrap();
        assert_eq!(blocked.reason, BlockReason::CategoryBlocked);
        assert_eq!(blocked.sku, "PISTOL-9");
    }

    #[test]
    fn rifle_passes_handgun_block() {
        let catalog = RuleCatalog::standard();
        let rifle = CartItem::firearm("RIFLE-1", 1, Money::from_cents(79900))
            .with_category(ProductCategory::Rifle);

        assert!(catalog
            .lookup(state("CA"))
            .unwrap()
            .check(&rifle, state("CA"))
            .is_none());
    }

    #[test]
    fn magazine_over_capacity_is_blocked() {
        let catalog = RuleCatalog::standard();
        let mag30 = CartItem::new("MAG-30", 1, Money::from_cents(1500)).with_magazine_capacity(30);
        let mag10 = CartItem::new("MAG-10", 1, Money::from_cents(1500)).with_magazine_capacity(10);

        let rule = catalog.lookup(state("NY")).unwrap();
        assert_eq!(
            rule.check(&mag30, state("NY")).unwrap().reason,
            BlockReason::MagazineCapacity
        );
        // Exactly at the ceiling is legal.
        assert!(rule.check(&mag10, state("NY")).is_none());
    }

    #[test]
    fn capacity_ceiling_ignores_non_magazines() {
        let rule = StateRule::new().magazine_capacity_limit(10);
        // A firearm that ships with a listed capacity is not a magazine.
        let rifle = CartItem::firearm("RIFLE-1", 1, Money::from_cents(79900))
            .with_category(ProductCategory::Rifle);
        assert!(rule.check(&rifle, state("NY")).is_none());
    }

    #[test]
    fn custom_predicate_blocks_with_detail() {
        let rule = StateRule::new().with_custom(Arc::new(|info| {
            (info.manufacturer == "Banned Arms Co").then(|| "manufacturer not on roster".to_string())
        }));
        let item = CartItem::firearm("PISTOL-2", 1, Money::from_cents(39900))
            .with_manufacturer("Banned Arms Co");

        let blocked = rule.check(&item, state("MA")).unwrap();
        assert_eq!(blocked.reason, BlockReason::CustomRule);
        assert_eq!(blocked.detail, "manufacturer not on roster");
    }

    #[test]
    fn block_all_firearms_rule() {
        let rule = StateRule::new().block_all_firearms();
        let rifle = CartItem::firearm("RIFLE-1", 1, Money::from_cents(79900));
        let sling = CartItem::new("SLING-1", 1, Money::from_cents(1999));

        assert_eq!(
            rule.check(&rifle, state("HI")).unwrap().reason,
            BlockReason::FirearmBlocked
        );
        assert!(rule.check(&sling, state("HI")).is_none());
    }
}
