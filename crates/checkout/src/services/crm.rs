//! CRM sync trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::Order;
use thiserror::Error;

use crate::request::CustomerInfo;

/// Error from the CRM.
#[derive(Debug, Error)]
#[error("crm sync failed: {0}")]
pub struct CrmError(pub String);

/// Trait for CRM deal synchronization.
///
/// Sync runs after the order is committed and is best effort: a CRM
/// failure never changes the checkout outcome.
#[async_trait]
pub trait CrmSync: Send + Sync {
    /// Creates or updates the CRM deal for an order, returning the deal id.
    async fn upsert_deal(&self, order: &Order, customer: &CustomerInfo)
    -> Result<String, CrmError>;
}

#[derive(Debug, Default)]
struct InMemoryCrmState {
    deals: Vec<String>,
    next_id: u32,
    fail_on_upsert: bool,
    attempts: u32,
}

/// In-memory CRM for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCrm {
    state: Arc<RwLock<InMemoryCrmState>>,
}

impl InMemoryCrm {
    /// Creates a new in-memory CRM.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the CRM to fail upserts.
    pub fn set_fail_on_upsert(&self, fail: bool) {
        self.state.write().unwrap().fail_on_upsert = fail;
    }

    /// Returns the number of synced deals.
    pub fn deal_count(&self) -> usize {
        self.state.read().unwrap().deals.len()
    }

    /// Returns the number of upsert attempts, including failures.
    pub fn attempt_count(&self) -> u32 {
        self.state.read().unwrap().attempts
    }
}

#[async_trait]
impl CrmSync for InMemoryCrm {
    async fn upsert_deal(
        &self,
        order: &Order,
        _customer: &CustomerInfo,
    ) -> Result<String, CrmError> {
        let mut state = self.state.write().unwrap();
        state.attempts += 1;
        if state.fail_on_upsert {
            return Err(CrmError("crm unavailable".to_string()));
        }

        state.next_id += 1;
        let deal_id = format!("DEAL-{:04}", state.next_id);
        state.deals.push(order.order_number().to_string());
        Ok(deal_id)
    }
}
