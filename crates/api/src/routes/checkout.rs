//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::{CheckoutOutcome, CheckoutRequest};

use crate::CheckoutStore;
use crate::error::ApiError;
use crate::routes::AppState;

/// POST /checkout — run one checkout attempt.
///
/// A held order is still a created order (201); only hard blocks, capture
/// failures and invalid requests are errors.
#[tracing::instrument(skip(state, request), fields(user_id = %request.user_id))]
pub async fn create<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutOutcome>), ApiError> {
    let outcome = state.orchestrator.execute_checkout(request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
