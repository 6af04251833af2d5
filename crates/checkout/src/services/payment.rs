//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::UserId;
use domain::Money;
use thiserror::Error;

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway rejected the charge (declined card, AVS failure).
    #[error("payment declined: {0}")]
    Declined(String),

    /// The gateway could not be reached or returned garbage.
    #[error("payment gateway error: {0}")]
    Gateway(String),
}

/// Result of a successful payment capture.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// The transaction ID assigned by the gateway.
    pub transaction_id: String,
}

/// Trait for payment capture operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures the full order amount against the buyer's payment method.
    async fn capture(
        &self,
        user_id: UserId,
        amount: Money,
        payment_method: &str,
    ) -> Result<CaptureOutcome, PaymentError>;

    /// Voids a previously captured transaction.
    async fn void(&self, transaction_id: &str) -> Result<(), PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    captures: HashMap<String, (UserId, Money)>,
    voided: Vec<String>,
    next_id: u32,
    fail_on_capture: bool,
    capture_delay: Option<Duration>,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline captures.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    /// Delays captures by `delay`, for timeout tests.
    pub fn set_capture_delay(&self, delay: Duration) {
        self.state.write().unwrap().capture_delay = Some(delay);
    }

    /// Returns the number of captured transactions.
    pub fn capture_count(&self) -> usize {
        self.state.read().unwrap().captures.len()
    }

    /// Returns true if the transaction was voided.
    pub fn is_voided(&self, transaction_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .voided
            .iter()
            .any(|t| t == transaction_id)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn capture(
        &self,
        user_id: UserId,
        amount: Money,
        _payment_method: &str,
    ) -> Result<CaptureOutcome, PaymentError> {
        let delay = self.state.read().unwrap().capture_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        if state.fail_on_capture {
            return Err(PaymentError::Declined("card declined".to_string()));
        }

        state.next_id += 1;
        let transaction_id = format!("TXN-{:04}", state.next_id);
        state.captures.insert(transaction_id.clone(), (user_id, amount));

        Ok(CaptureOutcome { transaction_id })
    }

    async fn void(&self, transaction_id: &str) -> Result<(), PaymentError> {
        let mut state = self.state.write().unwrap();
        if !state.captures.contains_key(transaction_id) {
            return Err(PaymentError::Gateway(format!(
                "unknown transaction {transaction_id}"
            )));
        }
        state.voided.push(transaction_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_assigns_sequential_transaction_ids() {
        let gateway = InMemoryPaymentGateway::new();
        let user_id = UserId::new();

        let first = gateway
            .capture(user_id, Money::from_cents(5000), "tok_visa")
            .await
            .unwrap();
        let second = gateway
            .capture(user_id, Money::from_cents(2500), "tok_visa")
            .await
            .unwrap();

        assert_eq!(first.transaction_id, "TXN-0001");
        assert_eq!(second.transaction_id, "TXN-0002");
        assert_eq!(gateway.capture_count(), 2);
    }

    #[tokio::test]
    async fn declined_capture_leaves_nothing_behind() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_capture(true);

        let result = gateway
            .capture(UserId::new(), Money::from_cents(5000), "tok_visa")
            .await;
        assert!(matches!(result, Err(PaymentError::Declined(_))));
        assert_eq!(gateway.capture_count(), 0);
    }

    #[tokio::test]
    async fn void_requires_known_transaction() {
        let gateway = InMemoryPaymentGateway::new();
        assert!(gateway.void("TXN-9999").await.is_err());

        let capture = gateway
            .capture(UserId::new(), Money::from_cents(100), "tok_visa")
            .await
            .unwrap();
        gateway.void(&capture.transaction_id).await.unwrap();
        assert!(gateway.is_voided(&capture.transaction_id));
    }
}
