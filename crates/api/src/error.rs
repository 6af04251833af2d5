//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use compliance::BlockedItem;
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Jurisdiction rules refused the cart; carries the blocked items so
    /// the buyer can see exactly what cannot ship.
    Blocked(Vec<BlockedItem>),
    /// Payment capture failed; nothing was charged.
    PaymentRequired(String),
    /// The requested operation conflicts with the order's current state.
    Conflict(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Blocked(items) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({
                    "error": "checkout blocked by jurisdiction rules",
                    "blocked_items": items,
                }),
            ),
            ApiError::PaymentRequired(msg) => (
                StatusCode::PAYMENT_REQUIRED,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": msg }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::HardBlock { blocked } => ApiError::Blocked(blocked),
            CheckoutError::CaptureFailure(msg) => ApiError::PaymentRequired(msg),
            CheckoutError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            CheckoutError::OrderNotFound(id) => {
                ApiError::NotFound(format!("order {id} not found"))
            }
            CheckoutError::InvalidOverride(msg) => ApiError::Conflict(msg),
            CheckoutError::Domain(DomainError::InvalidStatusTransition { .. }) => {
                ApiError::Conflict(err.to_string())
            }
            // Persistence after capture, store and compliance failures are
            // all server-side trouble as far as the client is concerned.
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(id) => {
                ApiError::NotFound(format!("order {id} not found"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    #[test]
    fn checkout_errors_map_to_expected_statuses() {
        let cases = [
            (
                ApiError::from(CheckoutError::HardBlock { blocked: vec![] }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::from(CheckoutError::CaptureFailure("declined".into())),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                ApiError::from(CheckoutError::InvalidRequest("empty".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(CheckoutError::OrderNotFound(OrderId::new())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(CheckoutError::InvalidOverride("not held".into())),
                StatusCode::CONFLICT,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
