//! FFL directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use common::{FflId, StateCode};
use domain::FflSnapshot;
use thiserror::Error;

/// Error from the FFL directory.
#[derive(Debug, Error)]
#[error("ffl directory unavailable: {0}")]
pub struct FflDirectoryError(pub String);

/// Trait for FFL dealer lookups.
///
/// The directory may serve cached data when its upstream source is down;
/// such snapshots come back with `is_stale` set and the order is flagged
/// for verification rather than refused. An unknown id is `Ok(None)`,
/// not an error.
#[async_trait]
pub trait FflDirectory: Send + Sync {
    async fn lookup(&self, ffl_id: FflId) -> Result<Option<FflSnapshot>, FflDirectoryError>;
}

/// A dealer record held by the in-memory directory.
#[derive(Debug, Clone)]
pub struct FflRecord {
    pub license_number: String,
    pub business_name: String,
    pub premise_state: StateCode,
    pub atf_active: bool,
}

#[derive(Debug, Default)]
struct InMemoryFflState {
    records: HashMap<FflId, FflRecord>,
    serve_stale: bool,
    fail_on_lookup: bool,
}

/// In-memory FFL directory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFflDirectory {
    state: Arc<RwLock<InMemoryFflState>>,
}

impl InMemoryFflDirectory {
    /// Creates a new in-memory directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dealer, returning its id.
    pub fn add_dealer(&self, record: FflRecord) -> FflId {
        let ffl_id = FflId::new();
        self.state.write().unwrap().records.insert(ffl_id, record);
        ffl_id
    }

    /// Serves all lookups as stale cached data.
    pub fn set_serve_stale(&self, stale: bool) {
        self.state.write().unwrap().serve_stale = stale;
    }

    /// Makes lookups fail entirely.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().unwrap().fail_on_lookup = fail;
    }

    /// Registers an active Texas dealer, a common test fixture.
    pub fn add_active_dealer(&self, business_name: &str) -> FflId {
        let tx = StateCode::parse("TX").unwrap_or_else(|_| unreachable!());
        self.add_dealer(FflRecord {
            license_number: "1-57-012-34-5A-67890".to_string(),
            business_name: business_name.to_string(),
            premise_state: tx,
            atf_active: true,
        })
    }
}

#[async_trait]
impl FflDirectory for InMemoryFflDirectory {
    async fn lookup(&self, ffl_id: FflId) -> Result<Option<FflSnapshot>, FflDirectoryError> {
        let state = self.state.read().unwrap();
        if state.fail_on_lookup {
            return Err(FflDirectoryError("directory unreachable".to_string()));
        }

        Ok(state.records.get(&ffl_id).map(|record| FflSnapshot {
            ffl_id,
            license_number: record.license_number.clone(),
            business_name: record.business_name.clone(),
            premise_state: record.premise_state,
            atf_active: record.atf_active,
            is_stale: state.serve_stale,
            fetched_at: Utc::now(),
        }))
    }
}
