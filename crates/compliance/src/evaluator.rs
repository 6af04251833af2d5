//! The compliance evaluator.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{FflId, StateCode, UserId};
use domain::CartItem;
use tokio::sync::RwLock;

use crate::config::ComplianceConfig;
use crate::error::ComplianceError;
use crate::rules::RuleCatalog;
use crate::verdict::{ComplianceVerdict, HoldType};

/// Buyer facts the evaluator needs (implemented by the store).
#[async_trait]
pub trait BuyerHistory: Send + Sync {
    /// Total firearm quantity across the buyer's qualifying orders created
    /// at or after `since`. Canceled orders never qualify.
    async fn firearm_quantity_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, ComplianceError>;

    /// The buyer's verified, ATF-active preferred FFL, if one is on file.
    async fn verified_preferred_ffl(
        &self,
        user_id: UserId,
    ) -> Result<Option<FflId>, ComplianceError>;
}

/// Applies the rule catalog and active policy to one checkout attempt.
///
/// Checks run in a fixed order and short-circuit on the first hard block:
/// jurisdiction blocks (including magazine capacity), then the FFL-on-file
/// requirement, then the rolling-window firearm limit. The FFL hold takes
/// precedence; at most one hold is reported.
pub struct ComplianceEvaluator<H: BuyerHistory> {
    catalog: RuleCatalog,
    history: H,
}

impl<H: BuyerHistory> ComplianceEvaluator<H> {
    /// Creates an evaluator over the given catalog and history source.
    pub fn new(catalog: RuleCatalog, history: H) -> Self {
        Self { catalog, history }
    }

    /// Evaluates a cart for a destination at the current instant.
    #[tracing::instrument(skip(self, items, config), fields(destination = %destination))]
    pub async fn evaluate(
        &self,
        user_id: UserId,
        items: &[CartItem],
        destination: StateCode,
        config: &ComplianceConfig,
    ) -> ComplianceVerdict {
        self.evaluate_at(user_id, items, destination, config, Utc::now())
            .await
    }

    /// Evaluates with an explicit `now`, so the window boundary is
    /// deterministic under test.
    pub async fn evaluate_at(
        &self,
        user_id: UserId,
        items: &[CartItem],
        destination: StateCode,
        config: &ComplianceConfig,
        now: DateTime<Utc>,
    ) -> ComplianceVerdict {
        let has_firearms = items.iter().any(|i| i.is_firearm);
        let needs_ffl = items.iter().any(CartItem::needs_ffl);
        let current_firearm_count: u32 = items.iter().map(CartItem::firearm_quantity).sum();

        // 1 + 2. Jurisdiction hard blocks (category, firearm/ammo flag,
        // magazine capacity, custom). Any block refuses the checkout
        // entirely; no hold or payment logic runs.
        if let Some(rule) = self.catalog.lookup(destination) {
            let blocked_items: Vec<_> = items
                .iter()
                .filter_map(|item| rule.check(item, destination))
                .collect();
            if !blocked_items.is_empty() {
                tracing::info!(
                    %destination,
                    blocked = blocked_items.len(),
                    "checkout hard-blocked by jurisdiction rules"
                );
                return ComplianceVerdict {
                    has_firearms,
                    hold: None,
                    blocked_items,
                    current_firearm_count,
                    past_firearm_count: 0,
                    reason: Some(format!("blocked by {destination} jurisdiction rules")),
                };
            }
        }

        let mut hold = None;
        let mut reason = None;

        // 3. FFL requirement. A lookup failure fails closed: the buyer is
        // treated as having no FFL on file.
        if config.ffl_hold_enabled && needs_ffl {
            let on_file = match self.history.verified_preferred_ffl(user_id).await {
                Ok(ffl) => ffl.is_some(),
                Err(e) => {
                    tracing::warn!(error = %e, %user_id, "FFL lookup failed, failing closed");
                    false
                }
            };
            if !on_file {
                hold = Some(HoldType::Ffl);
                reason = Some("no verified FFL on file".to_string());
            }
        }

        // 4. Rolling-window multi-firearm limit. Quantities, not order
        // counts; the boundary instant is inside the window; a tie with
        // the limit triggers the hold. A history failure fails closed by
        // treating the limit as already reached.
        let mut past_firearm_count = 0;
        if config.multi_firearm_hold_enabled && current_firearm_count > 0 {
            let since = config.window_start(now);
            past_firearm_count = match self.history.firearm_quantity_since(user_id, since).await {
                Ok(quantity) => quantity,
                Err(e) => {
                    tracing::warn!(error = %e, %user_id, "buyer history failed, failing closed");
                    config.firearm_limit_per_window
                }
            };

            if hold.is_none()
                && past_firearm_count + current_firearm_count >= config.firearm_limit_per_window
            {
                hold = Some(HoldType::MultiFirearm);
                reason = Some(format!(
                    "{} firearms within {} days meets the limit of {}",
                    past_firearm_count + current_firearm_count,
                    config.firearm_window_days,
                    config.firearm_limit_per_window
                ));
            }
        }

        ComplianceVerdict {
            has_firearms,
            hold,
            blocked_items: Vec::new(),
            current_firearm_count,
            past_firearm_count,
            reason,
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryBuyerState {
    past_firearm_quantity: u32,
    preferred_ffl: Option<FflId>,
    fail_history: bool,
    fail_ffl_lookup: bool,
}

/// In-memory buyer history for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBuyerHistory {
    state: Arc<RwLock<InMemoryBuyerState>>,
}

impl InMemoryBuyerHistory {
    /// Creates a buyer with no history and no FFL on file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the qualifying firearm quantity inside the window.
    pub async fn set_past_firearm_quantity(&self, quantity: u32) {
        self.state.write().await.past_firearm_quantity = quantity;
    }

    /// Puts a verified preferred FFL on file.
    pub async fn set_preferred_ffl(&self, ffl: FflId) {
        self.state.write().await.preferred_ffl = Some(ffl);
    }

    /// Makes history queries fail.
    pub async fn set_fail_history(&self, fail: bool) {
        self.state.write().await.fail_history = fail;
    }

    /// Makes FFL lookups fail.
    pub async fn set_fail_ffl_lookup(&self, fail: bool) {
        self.state.write().await.fail_ffl_lookup = fail;
    }
}

#[async_trait]
impl BuyerHistory for InMemoryBuyerHistory {
    async fn firearm_quantity_since(
        &self,
        _user_id: UserId,
        _since: DateTime<Utc>,
    ) -> Result<u32, ComplianceError> {
        let state = self.state.read().await;
        if state.fail_history {
            return Err(ComplianceError::HistoryUnavailable(
                "history query failed".to_string(),
            ));
        }
        Ok(state.past_firearm_quantity)
    }

    async fn verified_preferred_ffl(
        &self,
        _user_id: UserId,
    ) -> Result<Option<FflId>, ComplianceError> {
        let state = self.state.read().await;
        if state.fail_ffl_lookup {
            return Err(ComplianceError::HistoryUnavailable(
                "ffl lookup failed".to_string(),
            ));
        }
        Ok(state.preferred_ffl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Money, ProductCategory};

    fn state(code: &str) -> StateCode {
        StateCode::parse(code).unwrap()
    }

    fn setup() -> (ComplianceEvaluator<InMemoryBuyerHistory>, InMemoryBuyerHistory) {
        let history = InMemoryBuyerHistory::new();
        let evaluator = ComplianceEvaluator::new(RuleCatalog::standard(), history.clone());
        (evaluator, history)
    }

    fn rifle() -> CartItem {
        CartItem::firearm("RIFLE-1", 1, Money::from_cents(79900))
            .with_category(ProductCategory::Rifle)
    }

    fn handgun() -> CartItem {
        CartItem::firearm("PISTOL-9", 1, Money::from_cents(49900))
            .with_category(ProductCategory::Handgun)
    }

    #[tokio::test]
    async fn handgun_to_california_is_hard_blocked() {
        let (evaluator, _) = setup();
        let config = ComplianceConfig::default_policy();

        let verdict = evaluator
            .evaluate(UserId::new(), &[handgun()], state("CA"), &config)
            .await;

        assert!(verdict.is_blocked());
        assert_eq!(verdict.blocked_items.len(), 1);
        assert_eq!(verdict.blocked_items[0].sku, "PISTOL-9");
        // A hard block is not a hold.
        assert!(!verdict.requires_hold());
    }

    #[tokio::test]
    async fn rifle_without_ffl_on_file_gets_ffl_hold() {
        let (evaluator, _) = setup();
        let config = ComplianceConfig::default_policy();

        let verdict = evaluator
            .evaluate(UserId::new(), &[rifle()], state("TX"), &config)
            .await;

        assert_eq!(verdict.hold, Some(HoldType::Ffl));
        assert!(!verdict.is_blocked());
    }

    #[tokio::test]
    async fn rifle_with_ffl_on_file_is_clean() {
        let (evaluator, history) = setup();
        history.set_preferred_ffl(FflId::new()).await;
        let config = ComplianceConfig::default_policy();

        let verdict = evaluator
            .evaluate(UserId::new(), &[rifle()], state("TX"), &config)
            .await;

        assert!(verdict.is_clean());
        assert!(verdict.has_firearms);
    }

    #[tokio::test]
    async fn ffl_hold_disabled_by_config() {
        let (evaluator, _) = setup();
        let mut config = ComplianceConfig::default_policy();
        config.ffl_hold_enabled = false;
        config.multi_firearm_hold_enabled = false;

        let verdict = evaluator
            .evaluate(UserId::new(), &[rifle()], state("TX"), &config)
            .await;

        assert!(verdict.is_clean());
    }

    #[tokio::test]
    async fn accessory_cart_never_holds() {
        let (evaluator, history) = setup();
        // Even with maxed-out history and no FFL.
        history.set_past_firearm_quantity(100).await;
        let config = ComplianceConfig::default_policy();

        let items = vec![CartItem::new("SLING-1", 3, Money::from_cents(1999))];
        let verdict = evaluator
            .evaluate(UserId::new(), &items, state("TX"), &config)
            .await;

        assert!(verdict.is_clean());
        assert!(!verdict.has_firearms);
        assert_eq!(verdict.current_firearm_count, 0);
    }

    #[tokio::test]
    async fn window_limit_tie_triggers_multi_firearm_hold() {
        let (evaluator, history) = setup();
        history.set_preferred_ffl(FflId::new()).await;
        history.set_past_firearm_quantity(4).await;
        let config = ComplianceConfig::default_policy(); // limit 5 / 30 days

        let two_rifles = vec![
            CartItem::firearm("RIFLE-1", 1, Money::from_cents(79900)),
            CartItem::firearm("RIFLE-2", 1, Money::from_cents(89900)),
        ];
        let verdict = evaluator
            .evaluate(UserId::new(), &two_rifles, state("TX"), &config)
            .await;

        // 4 + 2 = 6 >= 5
        assert_eq!(verdict.hold, Some(HoldType::MultiFirearm));
        assert_eq!(verdict.past_firearm_count, 4);
        assert_eq!(verdict.current_firearm_count, 2);
    }

    #[tokio::test]
    async fn exactly_at_limit_holds() {
        let (evaluator, history) = setup();
        history.set_preferred_ffl(FflId::new()).await;
        history.set_past_firearm_quantity(4).await;
        let config = ComplianceConfig::default_policy();

        let verdict = evaluator
            .evaluate(UserId::new(), &[rifle()], state("TX"), &config)
            .await;

        // 4 + 1 == 5, ties trigger the hold.
        assert_eq!(verdict.hold, Some(HoldType::MultiFirearm));
    }

    #[tokio::test]
    async fn under_limit_is_clean() {
        let (evaluator, history) = setup();
        history.set_preferred_ffl(FflId::new()).await;
        history.set_past_firearm_quantity(3).await;
        let config = ComplianceConfig::default_policy();

        let verdict = evaluator
            .evaluate(UserId::new(), &[rifle()], state("TX"), &config)
            .await;

        assert!(verdict.is_clean());
        assert_eq!(verdict.past_firearm_count, 3);
    }

    #[tokio::test]
    async fn ffl_hold_takes_precedence_over_multi_firearm() {
        let (evaluator, history) = setup();
        history.set_past_firearm_quantity(10).await;
        let config = ComplianceConfig::default_policy();

        let verdict = evaluator
            .evaluate(UserId::new(), &[rifle()], state("TX"), &config)
            .await;

        // Both conditions met; only the FFL hold is reported.
        assert_eq!(verdict.hold, Some(HoldType::Ffl));
    }

    #[tokio::test]
    async fn history_failure_fails_closed() {
        let (evaluator, history) = setup();
        history.set_preferred_ffl(FflId::new()).await;
        history.set_fail_history(true).await;
        let config = ComplianceConfig::default_policy();

        let verdict = evaluator
            .evaluate(UserId::new(), &[rifle()], state("TX"), &config)
            .await;

        // Unknown history is treated as limit already reached.
        assert_eq!(verdict.hold, Some(HoldType::MultiFirearm));
        assert_eq!(verdict.past_firearm_count, 5);
    }

    #[tokio::test]
    async fn ffl_lookup_failure_fails_closed() {
        let (evaluator, history) = setup();
        history.set_fail_ffl_lookup(true).await;
        let config = ComplianceConfig::default_policy();

        let verdict = evaluator
            .evaluate(UserId::new(), &[rifle()], state("TX"), &config)
            .await;

        assert_eq!(verdict.hold, Some(HoldType::Ffl));
    }

    #[tokio::test]
    async fn oversized_magazine_blocks_but_accessory_passes() {
        let (evaluator, _) = setup();
        let config = ComplianceConfig::default_policy();

        // Scenario D: non-magazine accessory in a capacity-limited state.
        let accessory = vec![CartItem::new("SLING-1", 1, Money::from_cents(1999))];
        let verdict = evaluator
            .evaluate(UserId::new(), &accessory, state("NY"), &config)
            .await;
        assert!(verdict.is_clean());

        let mag = vec![CartItem::new("MAG-30", 1, Money::from_cents(1500)).with_magazine_capacity(30)];
        let verdict = evaluator
            .evaluate(UserId::new(), &mag, state("NY"), &config)
            .await;
        assert!(verdict.is_blocked());
    }
}
