//! Distributor submission trait and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use domain::Order;
use thiserror::Error;

/// Errors from distributor submission.
///
/// The split between business and technical failures decides which manual
/// processing status a paid order lands in.
#[derive(Debug, Clone, Error)]
pub enum DistributorError {
    /// The distributor understood the order and said no (item not
    /// stocked, account issue, ship-to restriction).
    #[error("distributor rejected order: {0}")]
    Rejected(String),

    /// The submission did not complete in time; the distributor may or
    /// may not have received it.
    #[error("distributor submission timed out")]
    Timeout,

    /// The distributor could not be reached or answered with garbage.
    #[error("distributor transport error: {0}")]
    Transport(String),
}

impl DistributorError {
    /// True for failures where the order's fate at the distributor is
    /// unknown.
    pub fn is_technical(&self) -> bool {
        matches!(self, DistributorError::Timeout | DistributorError::Transport(_))
    }
}

/// Result of a successful distributor submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub distributor_order_number: String,
    pub estimated_ship_date: Option<NaiveDate>,
}

/// Trait for distributor order submission.
#[async_trait]
pub trait DistributorService: Send + Sync {
    /// Submits the drop-ship portion of an order to the distributor.
    async fn submit(&self, order: &Order) -> Result<SubmissionOutcome, DistributorError>;
}

#[derive(Debug, Default)]
struct InMemoryDistributorState {
    submissions: Vec<String>,
    next_id: u32,
    reject_with: Option<String>,
    fail_transport: bool,
    submit_delay: Option<Duration>,
}

/// In-memory distributor service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDistributorService {
    state: Arc<RwLock<InMemoryDistributorState>>,
}

impl InMemoryDistributorService {
    /// Creates a new in-memory distributor service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes submissions fail as business rejections with the reason.
    pub fn set_reject_with(&self, reason: impl Into<String>) {
        self.state.write().unwrap().reject_with = Some(reason.into());
    }

    /// Makes submissions fail as transport errors.
    pub fn set_fail_transport(&self, fail: bool) {
        self.state.write().unwrap().fail_transport = fail;
    }

    /// Delays submissions by `delay`, for timeout tests.
    pub fn set_submit_delay(&self, delay: Duration) {
        self.state.write().unwrap().submit_delay = Some(delay);
    }

    /// Returns the number of accepted submissions.
    pub fn submission_count(&self) -> usize {
        self.state.read().unwrap().submissions.len()
    }
}

#[async_trait]
impl DistributorService for InMemoryDistributorService {
    async fn submit(&self, order: &Order) -> Result<SubmissionOutcome, DistributorError> {
        let delay = self.state.read().unwrap().submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        if let Some(reason) = &state.reject_with {
            return Err(DistributorError::Rejected(reason.clone()));
        }
        if state.fail_transport {
            return Err(DistributorError::Transport("connection refused".to_string()));
        }

        state.next_id += 1;
        let distributor_order_number = format!("DIST-{:05}", state.next_id);
        state.submissions.push(order.order_number().to_string());

        Ok(SubmissionOutcome {
            distributor_order_number,
            estimated_ship_date: None,
        })
    }
}
