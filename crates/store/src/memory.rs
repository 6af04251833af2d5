//! In-memory store for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{FflId, OrderId, UserId};
use compliance::{BuyerHistory, ComplianceConfig, ComplianceError, ConfigSource};
use domain::Order;
use tokio::sync::RwLock;

use crate::audit::AuditRecord;
use crate::error::StoreError;
use crate::repository::{AuditStore, ConfigStore, ConfigUpdate, FirearmWindowGuard, OrderStore};
use crate::Result;

#[derive(Debug, Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    configs: Vec<ComplianceConfig>,
    audit: Vec<AuditRecord>,
    preferred_ffls: HashMap<UserId, FflId>,
    fail_next_inserts: u32,
    fail_audit_appends: bool,
}

impl Inner {
    fn window_firearm_quantity(&self, user_id: UserId, since: DateTime<Utc>) -> u32 {
        self.orders
            .values()
            .filter(|o| {
                o.user_id() == user_id
                    && o.status().counts_toward_firearm_window()
                    && o.created_at() >= since
            })
            .map(Order::firearm_quantity)
            .sum()
    }
}

/// In-memory store implementation for testing.
///
/// A single `RwLock` over all state makes the count-and-insert guard
/// trivially atomic: the recount and the insert happen under one write
/// lock, matching the transactional guarantee of the Postgres backend.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Creates an empty store with the default compliance policy active.
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner.configs.push(ComplianceConfig::default_policy());
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Puts a verified preferred FFL on file for a buyer.
    pub async fn set_preferred_ffl(&self, user_id: UserId, ffl_id: FflId) {
        self.inner.write().await.preferred_ffls.insert(user_id, ffl_id);
    }

    /// Makes the next `count` order inserts fail.
    pub async fn fail_next_inserts(&self, count: u32) {
        self.inner.write().await.fail_next_inserts = count;
    }

    /// Makes audit appends fail.
    pub async fn set_fail_audit_appends(&self, fail: bool) {
        self.inner.write().await.fail_audit_appends = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    /// Returns all audit records, oldest first.
    pub async fn all_audit_records(&self) -> Vec<AuditRecord> {
        self.inner.read().await.audit.clone()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(
        &self,
        mut order: Order,
        guard: Option<FirearmWindowGuard>,
    ) -> Result<Order> {
        let mut inner = self.inner.write().await;

        if inner.fail_next_inserts > 0 {
            inner.fail_next_inserts -= 1;
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }

        if let Some(existing) = inner.orders.get(&order.id()) {
            return Ok(existing.clone());
        }

        if let Some(guard) = guard {
            let incoming = order.firearm_quantity();
            let past = inner.window_firearm_quantity(order.user_id(), guard.window_start);
            if incoming > 0 && past + incoming >= guard.limit {
                order.apply_multi_firearm_hold(format!(
                    "{} firearms within the rolling window meets the limit of {}",
                    past + incoming,
                    guard.limit
                ))?;
                tracing::info!(
                    order_id = %order.id(),
                    past,
                    incoming,
                    limit = guard.limit,
                    "order upgraded to multi-firearm hold at insert"
                );
            }
        }

        inner.orders.insert(order.id(), order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.inner
            .read()
            .await
            .orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(id))
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.orders.contains_key(&order.id()) {
            return Err(StoreError::OrderNotFound(order.id()));
        }
        inner.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<_> = inner
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(orders)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn active_config(&self) -> Result<ComplianceConfig> {
        self.inner
            .read()
            .await
            .configs
            .iter()
            .find(|c| c.active)
            .cloned()
            .ok_or(StoreError::NoActiveConfig)
    }

    async fn update_config(&self, update: ConfigUpdate) -> Result<ComplianceConfig> {
        let mut inner = self.inner.write().await;
        let next_version = inner.configs.iter().map(|c| c.version).max().unwrap_or(0) + 1;
        for config in &mut inner.configs {
            config.active = false;
        }
        let config = ComplianceConfig {
            version: next_version,
            firearm_window_days: update.firearm_window_days,
            firearm_limit_per_window: update.firearm_limit_per_window,
            multi_firearm_hold_enabled: update.multi_firearm_hold_enabled,
            ffl_hold_enabled: update.ffl_hold_enabled,
            active: true,
            created_at: Utc::now(),
        };
        inner.configs.push(config.clone());
        Ok(config)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, record: AuditRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.fail_audit_appends {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        inner.audit.push(record);
        Ok(())
    }

    async fn audit_for_order(&self, order_id: OrderId) -> Result<Vec<AuditRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .audit
            .iter()
            .filter(|r| r.order_id == Some(order_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ConfigSource for MemoryStore {
    async fn active_config(&self) -> std::result::Result<ComplianceConfig, ComplianceError> {
        ConfigStore::active_config(self)
            .await
            .map_err(|e| ComplianceError::ConfigUnavailable(e.to_string()))
    }
}

#[async_trait]
impl BuyerHistory for MemoryStore {
    async fn firearm_quantity_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> std::result::Result<u32, ComplianceError> {
        Ok(self.inner.read().await.window_firearm_quantity(user_id, since))
    }

    async fn verified_preferred_ffl(
        &self,
        user_id: UserId,
    ) -> std::result::Result<Option<FflId>, ComplianceError> {
        Ok(self.inner.read().await.preferred_ffls.get(&user_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::StateCode;
    use domain::{CartItem, Money, OrderStatus, RoutingPolicy, route};

    fn firearm_order(user_id: UserId, quantity: u32, status: OrderStatus) -> Order {
        let items = vec![CartItem::firearm(
            "RIFLE-1",
            quantity,
            Money::from_cents(79900),
        )];
        let groups = route(&items, &RoutingPolicy::new());
        Order::create(
            OrderId::new(),
            user_id,
            StateCode::parse("TX").unwrap(),
            status,
            status.is_hold().then(|| "hold".to_string()),
            groups,
            "TXN-1".to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_id() {
        let store = MemoryStore::new();
        let order = firearm_order(UserId::new(), 1, OrderStatus::Paid);

        let first = store.insert_order(order.clone(), None).await.unwrap();
        let second = store.insert_order(order, None).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn window_guard_upgrades_at_limit() {
        let store = MemoryStore::new();
        let user_id = UserId::new();

        // 4 firearms already inside the window.
        store
            .insert_order(firearm_order(user_id, 4, OrderStatus::Paid), None)
            .await
            .unwrap();

        let guard = FirearmWindowGuard {
            window_start: Utc::now() - Duration::days(30),
            limit: 5,
        };
        let stored = store
            .insert_order(firearm_order(user_id, 1, OrderStatus::Paid), Some(guard))
            .await
            .unwrap();

        assert_eq!(stored.status(), OrderStatus::MultiFirearmHold);
        assert!(stored.hold_reason().is_some());
    }

    #[tokio::test]
    async fn window_guard_leaves_under_limit_orders_paid() {
        let store = MemoryStore::new();
        let user_id = UserId::new();

        let guard = FirearmWindowGuard {
            window_start: Utc::now() - Duration::days(30),
            limit: 5,
        };
        let stored = store
            .insert_order(firearm_order(user_id, 2, OrderStatus::Paid), Some(guard))
            .await
            .unwrap();

        assert_eq!(stored.status(), OrderStatus::Paid);
    }

    #[tokio::test]
    async fn window_guard_ignores_canceled_orders() {
        let store = MemoryStore::new();
        let user_id = UserId::new();

        let mut canceled = firearm_order(user_id, 4, OrderStatus::Paid);
        canceled.transition_to(OrderStatus::Canceled).unwrap();
        store.insert_order(canceled, None).await.unwrap();

        let guard = FirearmWindowGuard {
            window_start: Utc::now() - Duration::days(30),
            limit: 5,
        };
        let stored = store
            .insert_order(firearm_order(user_id, 1, OrderStatus::Paid), Some(guard))
            .await
            .unwrap();

        assert_eq!(stored.status(), OrderStatus::Paid);
    }

    #[tokio::test]
    async fn concurrent_inserts_cannot_both_pass_the_guard() {
        let store = MemoryStore::new();
        let user_id = UserId::new();
        let guard = FirearmWindowGuard {
            window_start: Utc::now() - Duration::days(30),
            limit: 5,
        };

        // Two 3-firearm orders race; each alone is below the limit of 5,
        // together they reach it. Exactly one must be held.
        let a = tokio::spawn({
            let store = store.clone();
            let order = firearm_order(user_id, 3, OrderStatus::Paid);
            async move { store.insert_order(order, Some(guard)).await }
        });
        let b = tokio::spawn({
            let store = store.clone();
            let order = firearm_order(user_id, 3, OrderStatus::Paid);
            async move { store.insert_order(order, Some(guard)).await }
        });

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        let held = [a.status(), b.status()]
            .iter()
            .filter(|s| **s == OrderStatus::MultiFirearmHold)
            .count();
        assert_eq!(held, 1, "exactly one racing order must be held");
    }

    #[tokio::test]
    async fn config_update_bumps_version_and_stays_single_active() {
        let store = MemoryStore::new();
        assert_eq!(ConfigStore::active_config(&store).await.unwrap().version, 1);

        let updated = store
            .update_config(ConfigUpdate {
                firearm_window_days: 14,
                firearm_limit_per_window: 3,
                multi_firearm_hold_enabled: true,
                ffl_hold_enabled: false,
            })
            .await
            .unwrap();

        assert_eq!(updated.version, 2);
        let active = ConfigStore::active_config(&store).await.unwrap();
        assert_eq!(active.version, 2);
        assert_eq!(active.firearm_window_days, 14);
        assert!(!active.ffl_hold_enabled);
    }

    #[tokio::test]
    async fn buyer_history_counts_only_qualifying_orders() {
        let store = MemoryStore::new();
        let user_id = UserId::new();
        let since = Utc::now() - Duration::days(30);

        store
            .insert_order(firearm_order(user_id, 2, OrderStatus::Paid), None)
            .await
            .unwrap();

        let mut old = firearm_order(user_id, 3, OrderStatus::Paid);
        old.set_created_at(Utc::now() - Duration::days(45));
        store.insert_order(old, None).await.unwrap();

        // Another buyer's orders never count.
        store
            .insert_order(firearm_order(UserId::new(), 5, OrderStatus::Paid), None)
            .await
            .unwrap();

        assert_eq!(store.firearm_quantity_since(user_id, since).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn buyer_history_includes_the_window_boundary_instant() {
        let store = MemoryStore::new();
        let user_id = UserId::new();
        let since = Utc::now() - Duration::days(30);

        // Created exactly at the window start: inside the window.
        let mut at_boundary = firearm_order(user_id, 2, OrderStatus::Paid);
        at_boundary.set_created_at(since);
        store.insert_order(at_boundary, None).await.unwrap();

        // One second earlier: outside.
        let mut just_outside = firearm_order(user_id, 3, OrderStatus::Paid);
        just_outside.set_created_at(since - Duration::seconds(1));
        store.insert_order(just_outside, None).await.unwrap();

        assert_eq!(store.firearm_quantity_since(user_id, since).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn audit_records_filter_by_order() {
        use crate::audit::{AuditKind, AuditRecord};

        let store = MemoryStore::new();
        let order_id = OrderId::new();
        store
            .append_audit(AuditRecord::new(AuditKind::HoldApplied, "ffl").for_order(order_id))
            .await
            .unwrap();
        store
            .append_audit(AuditRecord::new(AuditKind::CheckoutBlocked, "blocked"))
            .await
            .unwrap();

        let records = store.audit_for_order(order_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, AuditKind::HoldApplied);
    }

    #[tokio::test]
    async fn fail_next_inserts_recovers() {
        let store = MemoryStore::new();
        let order = firearm_order(UserId::new(), 1, OrderStatus::Paid);

        store.fail_next_inserts(1).await;
        assert!(store.insert_order(order.clone(), None).await.is_err());
        assert!(store.insert_order(order, None).await.is_ok());
    }
}
