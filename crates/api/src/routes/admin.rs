//! Compliance policy administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use compliance::ComplianceConfig;
use serde::{Deserialize, Serialize};
use store::{AuditKind, AuditRecord, ConfigStore, ConfigUpdate};

use crate::CheckoutStore;
use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Deserialize)]
pub struct UpdateConfigRequest {
    pub firearm_window_days: u32,
    pub firearm_limit_per_window: u32,
    pub multi_firearm_hold_enabled: bool,
    pub ffl_hold_enabled: bool,
    pub operator_id: Option<String>,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub version: i64,
    pub firearm_window_days: u32,
    pub firearm_limit_per_window: u32,
    pub multi_firearm_hold_enabled: bool,
    pub ffl_hold_enabled: bool,
    pub created_at: String,
}

impl From<ComplianceConfig> for ConfigResponse {
    fn from(config: ComplianceConfig) -> Self {
        ConfigResponse {
            version: config.version,
            firearm_window_days: config.firearm_window_days,
            firearm_limit_per_window: config.firearm_limit_per_window,
            multi_firearm_hold_enabled: config.multi_firearm_hold_enabled,
            ffl_hold_enabled: config.ffl_hold_enabled,
            created_at: config.created_at.to_rfc3339(),
        }
    }
}

/// GET /admin/config — the currently-active compliance policy.
#[tracing::instrument(skip(state))]
pub async fn get_config<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let config = ConfigStore::active_config(&state.store).await?;
    Ok(Json(ConfigResponse::from(config)))
}

/// PUT /admin/config — replace the active compliance policy.
///
/// Inserts a new config version and invalidates the read-through cache, so
/// the next checkout runs under the new policy.
#[tracing::instrument(skip(state, req))]
pub async fn update_config<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<UpdateConfigRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
    if req.firearm_window_days == 0 {
        return Err(ApiError::BadRequest(
            "firearm_window_days must be positive".to_string(),
        ));
    }
    if req.firearm_limit_per_window == 0 {
        return Err(ApiError::BadRequest(
            "firearm_limit_per_window must be positive".to_string(),
        ));
    }

    let config = state
        .store
        .update_config(ConfigUpdate {
            firearm_window_days: req.firearm_window_days,
            firearm_limit_per_window: req.firearm_limit_per_window,
            multi_firearm_hold_enabled: req.multi_firearm_hold_enabled,
            ffl_hold_enabled: req.ffl_hold_enabled,
        })
        .await?;
    state.config_cache.invalidate().await;

    let mut record = AuditRecord::new(
        AuditKind::ConfigUpdated,
        format!(
            "compliance config v{}: {} firearms per {} days, multi_firearm={}, ffl={}",
            config.version,
            config.firearm_limit_per_window,
            config.firearm_window_days,
            config.multi_firearm_hold_enabled,
            config.ffl_hold_enabled,
        ),
    );
    if let Some(operator_id) = &req.operator_id {
        record = record.by_operator(operator_id);
    }
    state.store.append_audit(record).await?;

    tracing::info!(version = config.version, "compliance config updated");
    Ok(Json(ConfigResponse::from(config)))
}
