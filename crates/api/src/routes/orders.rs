//! Order lookup, audit trail and hold override endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{OrderId, UserId};
use domain::{DistributorSubmission, Order};
use serde::{Deserialize, Serialize};
use store::AuditRecord;

use crate::CheckoutStore;
use crate::error::ApiError;
use crate::routes::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct OverrideRequest {
    pub operator_id: String,
    pub note: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    pub status: String,
    pub hold_reason: Option<String>,
    pub total_cents: i64,
    pub destination_state: String,
    pub firearm_quantity: u32,
    pub groups: Vec<GroupResponse>,
    pub payment_transaction_id: Option<String>,
    pub distributor_order_number: Option<String>,
    pub crm_deal_id: Option<String>,
    pub ffl_business_name: Option<String>,
    pub ffl_snapshot_stale: bool,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct GroupResponse {
    pub group_number: u32,
    pub fulfillment_type: String,
    pub ffl_required: bool,
    pub items: Vec<ItemResponse>,
}

#[derive(Serialize)]
pub struct ItemResponse {
    pub sku: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub is_firearm: bool,
}

#[derive(Serialize)]
pub struct AuditResponse {
    pub id: String,
    pub kind: String,
    pub detail: String,
    pub payment_captured: bool,
    pub payment_transaction_id: Option<String>,
    pub operator_id: Option<String>,
    pub created_at: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let groups = order
            .fulfillment_groups()
            .iter()
            .map(|g| GroupResponse {
                group_number: g.group_number,
                fulfillment_type: g.fulfillment_type.to_string(),
                ffl_required: g.ffl_required,
                items: g
                    .items
                    .iter()
                    .map(|i| ItemResponse {
                        sku: i.sku.clone(),
                        quantity: i.quantity,
                        unit_price_cents: i.unit_price.cents(),
                        is_firearm: i.is_firearm,
                    })
                    .collect(),
            })
            .collect();

        let distributor_order_number = match order.distributor_submission() {
            DistributorSubmission::Submitted {
                distributor_order_number,
                ..
            } => Some(distributor_order_number.clone()),
            _ => None,
        };

        OrderResponse {
            id: order.id().to_string(),
            order_number: order.order_number().to_string(),
            user_id: order.user_id().to_string(),
            status: order.status().to_string(),
            hold_reason: order.hold_reason().map(String::from),
            total_cents: order.total_amount().cents(),
            destination_state: order.destination_state().to_string(),
            firearm_quantity: order.firearm_quantity(),
            groups,
            payment_transaction_id: order.payment_transaction_id().map(String::from),
            distributor_order_number,
            crm_deal_id: order.crm_deal_id().map(String::from),
            ffl_business_name: order.ffl_snapshot().map(|s| s.business_name.clone()),
            ffl_snapshot_stale: order.ffl_snapshot().is_some_and(|s| s.is_stale),
            created_at: order.created_at().to_rfc3339(),
        }
    }
}

impl From<AuditRecord> for AuditResponse {
    fn from(record: AuditRecord) -> Self {
        AuditResponse {
            id: record.id.to_string(),
            kind: record.kind.to_string(),
            detail: record.detail,
            payment_captured: record.payment_captured,
            payment_transaction_id: record.payment_transaction_id,
            operator_id: record.operator_id,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// GET /orders/:id — load one order.
#[tracing::instrument(skip(state))]
pub async fn get<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orchestrator.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/:id/audit — the order's audit trail, oldest first.
#[tracing::instrument(skip(state))]
pub async fn audit<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditResponse>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    // 404 for an unknown order rather than an empty trail.
    state.orchestrator.get_order(order_id).await?;

    let records = state.store.audit_for_order(order_id).await?;
    Ok(Json(records.into_iter().map(AuditResponse::from).collect()))
}

/// POST /orders/:id/override — release a hold after operator review.
#[tracing::instrument(skip(state, req))]
pub async fn override_hold<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    if req.operator_id.trim().is_empty() {
        return Err(ApiError::BadRequest("operator_id is required".to_string()));
    }

    let order = state
        .orchestrator
        .override_hold(order_id, &req.operator_id, req.note.as_deref())
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /users/:id/orders — a buyer's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_user<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("invalid user id: {e}")))?;
    let orders = state.store.orders_for_user(UserId::from_uuid(uuid)).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
