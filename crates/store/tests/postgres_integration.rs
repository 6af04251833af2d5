//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, DurationRound, Utc};
use common::{FflId, OrderId, StateCode, UserId};
use compliance::BuyerHistory;
use domain::{CartItem, Money, Order, OrderStatus, RoutingPolicy, route};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    AuditKind, AuditRecord, AuditStore, ConfigStore, ConfigUpdate, FirearmWindowGuard, OrderStore,
    PgStore,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PgStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PgStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation; re-seed the default config.
    sqlx::query("TRUNCATE TABLE orders, audit_log, user_ffls")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM compliance_config WHERE version > 1")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE compliance_config SET active = TRUE WHERE version = 1")
        .execute(&pool)
        .await
        .unwrap();

    PgStore::new(pool)
}

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
#[serial]
#[ignore = "requires Docker"]
async fn insert_and_get_roundtrip() {
    let store = get_test_store().await;
    let order = firearm_order(UserId::new(), 2, OrderStatus::Paid);

    let stored = store.insert_order(order.clone(), None).await.unwrap();
    let fetched = store.get_order(order.id()).await.unwrap();

    assert_eq!(fetched.id(), stored.id());
    assert_eq!(fetched.status(), OrderStatus::Paid);
    assert_eq!(fetched.firearm_quantity(), 2);
    assert_eq!(fetched.order_number(), order.order_number());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn insert_is_idempotent_on_id() {
    let store = get_test_store().await;
    let order = firearm_order(UserId::new(), 1, OrderStatus::Paid);

    store.insert_order(order.clone(), None).await.unwrap();
    let second = store.insert_order(order.clone(), None).await.unwrap();

    assert_eq!(second.id(), order.id());
    let orders = store.orders_for_user(order.user_id()).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn window_guard_upgrades_at_limit() {
    let store = get_test_store().await;
    let user_id = UserId::new();

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

    // The upgrade is durable, not just in the returned value.
    let fetched = store.get_order(stored.id()).await.unwrap();
    assert_eq!(fetched.status(), OrderStatus::MultiFirearmHold);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn concurrent_inserts_cannot_both_pass_the_guard() {
    let store = get_test_store().await;
    let user_id = UserId::new();
    let guard = FirearmWindowGuard {
        window_start: Utc::now() - Duration::days(30),
        limit: 5,
    };

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
#[serial]
#[ignore = "requires Docker"]
async fn update_order_persists_transition() {
    let store = get_test_store().await;
    let mut order = store
        .insert_order(firearm_order(UserId::new(), 1, OrderStatus::Paid), None)
        .await
        .unwrap();

    order.transition_to(OrderStatus::Processing).unwrap();
    store.update_order(&order).await.unwrap();

    let fetched = store.get_order(order.id()).await.unwrap();
    assert_eq!(fetched.status(), OrderStatus::Processing);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn buyer_history_excludes_canceled_and_old_orders() {
    let store = get_test_store().await;
    let user_id = UserId::new();
    let since = Utc::now() - Duration::days(30);

    store
        .insert_order(firearm_order(user_id, 2, OrderStatus::Paid), None)
        .await
        .unwrap();

    let mut canceled = firearm_order(user_id, 3, OrderStatus::Paid);
    canceled.transition_to(OrderStatus::Canceled).unwrap();
    store.insert_order(canceled, None).await.unwrap();

    let mut old = firearm_order(user_id, 4, OrderStatus::Paid);
    old.set_created_at(Utc::now() - Duration::days(45));
    store.insert_order(old, None).await.unwrap();

    assert_eq!(store.firearm_quantity_since(user_id, since).await.unwrap(), 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn buyer_history_includes_the_window_boundary_instant() {
    let store = get_test_store().await;
    let user_id = UserId::new();
    // timestamptz keeps microseconds; a whole-second boundary survives
    // the round trip exactly.
    let since = (Utc::now() - Duration::days(30))
        .duration_trunc(Duration::seconds(1))
        .unwrap();

    let mut at_boundary = firearm_order(user_id, 2, OrderStatus::Paid);
    at_boundary.set_created_at(since);
    store.insert_order(at_boundary, None).await.unwrap();

    let mut just_outside = firearm_order(user_id, 3, OrderStatus::Paid);
    just_outside.set_created_at(since - Duration::seconds(1));
    store.insert_order(just_outside, None).await.unwrap();

    assert_eq!(store.firearm_quantity_since(user_id, since).await.unwrap(), 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn preferred_ffl_roundtrip() {
    let store = get_test_store().await;
    let user_id = UserId::new();
    let ffl_id = FflId::new();

    assert_eq!(store.verified_preferred_ffl(user_id).await.unwrap(), None);

    store.set_preferred_ffl(user_id, ffl_id).await.unwrap();
    assert_eq!(
        store.verified_preferred_ffl(user_id).await.unwrap(),
        Some(ffl_id)
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn config_update_replaces_active_row() {
    let store = get_test_store().await;

    let initial = ConfigStore::active_config(&store).await.unwrap();
    assert_eq!(initial.version, 1);

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
    assert_eq!(active.firearm_limit_per_window, 3);
    assert!(!active.ffl_hold_enabled);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn audit_trail_roundtrip() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    store
        .append_audit(
            AuditRecord::new(AuditKind::DistributorFailure, "distributor timeout")
                .for_order(order_id)
                .with_payment("TXN-9"),
        )
        .await
        .unwrap();
    store
        .append_audit(AuditRecord::new(AuditKind::CheckoutBlocked, "blocked cart"))
        .await
        .unwrap();

    let records = store.audit_for_order(order_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, AuditKind::DistributorFailure);
    assert!(records[0].payment_captured);
    assert_eq!(records[0].payment_transaction_id.as_deref(), Some("TXN-9"));
}
