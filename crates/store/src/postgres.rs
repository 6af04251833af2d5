//! PostgreSQL-backed store.
//!
//! Orders are stored as a JSONB body plus the scalar columns the store
//! queries on (buyer, status, firearm quantity, creation time). The
//! count-and-insert guard runs inside one transaction under a per-buyer
//! advisory lock, so concurrent checkouts for the same buyer serialize
//! at the insert and the recount always sees the other order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{FflId, OrderId, UserId};
use compliance::{BuyerHistory, ComplianceConfig, ComplianceError, ConfigSource};
use domain::{Order, OrderStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::audit::{AuditKind, AuditRecord};
use crate::error::StoreError;
use crate::repository::{AuditStore, ConfigStore, ConfigUpdate, FirearmWindowGuard, OrderStore};
use crate::Result;

/// Advisory lock namespace for config replacements.
const CONFIG_LOCK_KEY: i64 = 0x434f4e464947;

/// PostgreSQL store implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Puts a verified preferred FFL on file for a buyer.
    pub async fn set_preferred_ffl(&self, user_id: UserId, ffl_id: FflId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_ffls (user_id, ffl_id, verified, updated_at)
            VALUES ($1, $2, TRUE, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET ffl_id = EXCLUDED.ffl_id, verified = TRUE, updated_at = NOW()
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(ffl_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Per-buyer advisory lock key, derived from the user id.
    fn buyer_lock_key(user_id: UserId) -> i64 {
        let uuid = user_id.as_uuid();
        let bytes = uuid.as_bytes();
        let mut key = [0u8; 8];
        key.copy_from_slice(&bytes[..8]);
        i64::from_be_bytes(key)
    }

    /// Status labels that count toward the rolling firearm window.
    fn counting_status_labels() -> Vec<&'static str> {
        [
            OrderStatus::Paid,
            OrderStatus::PendingFfl,
            OrderStatus::ReadyToFulfill,
            OrderStatus::Shipped,
        ]
        .iter()
        .map(OrderStatus::as_str)
        .collect()
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let body: serde_json::Value = row.try_get("body")?;
        Ok(serde_json::from_value(body)?)
    }

    fn row_to_config(row: PgRow) -> Result<ComplianceConfig> {
        Ok(ComplianceConfig {
            version: row.try_get("version")?,
            firearm_window_days: row.try_get::<i32, _>("firearm_window_days")? as u32,
            firearm_limit_per_window: row.try_get::<i32, _>("firearm_limit_per_window")? as u32,
            multi_firearm_hold_enabled: row.try_get("multi_firearm_hold_enabled")?,
            ffl_hold_enabled: row.try_get("ffl_hold_enabled")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_audit(row: PgRow) -> Result<AuditRecord> {
        let kind: serde_json::Value = serde_json::Value::String(row.try_get("kind")?);
        let kind: AuditKind = serde_json::from_value(kind)?;
        Ok(AuditRecord {
            id: row.try_get("id")?,
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            kind,
            payment_captured: row.try_get("payment_captured")?,
            payment_transaction_id: row.try_get("payment_transaction_id")?,
            detail: row.try_get("detail")?,
            operator_id: row.try_get("operator_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PgStore {
    #[tracing::instrument(skip(self, order, guard), fields(order_id = %order.id()))]
    async fn insert_order(
        &self,
        mut order: Order,
        guard: Option<FirearmWindowGuard>,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        if let Some(guard) = guard {
            let incoming = order.firearm_quantity();
            if incoming > 0 {
                // Serialize concurrent checkouts for this buyer so the
                // recount below cannot miss a racing insert.
                sqlx::query("SELECT pg_advisory_xact_lock($1)")
                    .bind(Self::buyer_lock_key(order.user_id()))
                    .execute(&mut *tx)
                    .await?;

                let past: i64 = sqlx::query_scalar(
                    r#"
                    SELECT COALESCE(SUM(firearm_quantity), 0)
                    FROM orders
                    WHERE user_id = $1 AND created_at >= $2 AND status = ANY($3)
                    "#,
                )
                .bind(order.user_id().as_uuid())
                .bind(guard.window_start)
                .bind(Self::counting_status_labels())
                .fetch_one(&mut *tx)
                .await?;

                let past = u32::try_from(past).unwrap_or(u32::MAX);
                if past + incoming >= guard.limit && order.status() == OrderStatus::Paid {
                    order.apply_multi_firearm_hold(format!(
                        "{} firearms within the rolling window meets the limit of {}",
                        past + incoming,
                        guard.limit
                    ))?;
                    metrics::counter!("store_multi_firearm_holds_applied_total").increment(1);
                    tracing::info!(
                        past,
                        incoming,
                        limit = guard.limit,
                        "order upgraded to multi-firearm hold at insert"
                    );
                }
            }
        }

        let body = serde_json::to_value(&order)?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, order_number, status, firearm_quantity, created_at, body)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(order.order_number().as_str())
        .bind(order.status().as_str())
        .bind(order.firearm_quantity() as i32)
        .bind(order.created_at())
        .bind(&body)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // Retried persistence of an id that already landed; the stored
            // row wins.
            tx.rollback().await?;
            return self.get_order(order.id()).await;
        }

        tx.commit().await?;
        metrics::counter!("store_orders_inserted_total").increment(1);
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        let row = sqlx::query("SELECT body FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::OrderNotFound(id))?;
        Self::row_to_order(row)
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let body = serde_json::to_value(order)?;
        let result = sqlx::query(
            "UPDATE orders SET status = $2, body = $3 WHERE id = $1",
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(&body)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order.id()));
        }
        Ok(())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT body FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn active_config(&self) -> Result<ComplianceConfig> {
        let row = sqlx::query("SELECT * FROM compliance_config WHERE active LIMIT 1")
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NoActiveConfig)?;
        Self::row_to_config(row)
    }

    async fn update_config(&self, update: ConfigUpdate) -> Result<ComplianceConfig> {
        let mut tx = self.pool.begin().await?;

        // One config replacement at a time.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CONFIG_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let current_max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM compliance_config")
                .fetch_one(&mut *tx)
                .await?;
        let next_version = current_max.unwrap_or(0) + 1;

        sqlx::query("UPDATE compliance_config SET active = FALSE WHERE active")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO compliance_config
                (version, firearm_window_days, firearm_limit_per_window,
                 multi_firearm_hold_enabled, ffl_hold_enabled, active, created_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
            RETURNING *
            "#,
        )
        .bind(next_version)
        .bind(update.firearm_window_days as i32)
        .bind(update.firearm_limit_per_window as i32)
        .bind(update.multi_firearm_hold_enabled)
        .bind(update.ffl_hold_enabled)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = next_version, "compliance config replaced");
        Self::row_to_config(row)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append_audit(&self, record: AuditRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, order_id, kind, payment_captured, payment_transaction_id,
                 detail, operator_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.order_id.map(|id| id.as_uuid()))
        .bind(record.kind.as_str())
        .bind(record.payment_captured)
        .bind(&record.payment_transaction_id)
        .bind(&record.detail)
        .bind(&record.operator_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn audit_for_order(&self, order_id: OrderId) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM audit_log WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_audit).collect()
    }
}

#[async_trait]
impl ConfigSource for PgStore {
    async fn active_config(&self) -> std::result::Result<ComplianceConfig, ComplianceError> {
        ConfigStore::active_config(self)
            .await
            .map_err(|e| ComplianceError::ConfigUnavailable(e.to_string()))
    }
}

#[async_trait]
impl BuyerHistory for PgStore {
    async fn firearm_quantity_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> std::result::Result<u32, ComplianceError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(firearm_quantity), 0)
            FROM orders
            WHERE user_id = $1 AND created_at >= $2 AND status = ANY($3)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(since)
        .bind(Self::counting_status_labels())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ComplianceError::HistoryUnavailable(e.to_string()))?;

        Ok(u32::try_from(total).unwrap_or(u32::MAX))
    }

    async fn verified_preferred_ffl(
        &self,
        user_id: UserId,
    ) -> std::result::Result<Option<FflId>, ComplianceError> {
        let ffl: Option<Uuid> = sqlx::query_scalar(
            "SELECT ffl_id FROM user_ffls WHERE user_id = $1 AND verified",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ComplianceError::HistoryUnavailable(e.to_string()))?;

        Ok(ffl.map(FflId::from_uuid))
    }
}
