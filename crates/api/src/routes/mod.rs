//! HTTP route handlers.

pub mod admin;
pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;

use std::sync::Arc;

use ::checkout::CheckoutOrchestrator;
use ::checkout::services::{
    InMemoryCrm, InMemoryDistributorService, InMemoryFflDirectory, InMemoryPaymentGateway,
};
use compliance::ConfigCache;

use crate::CheckoutStore;

/// Shared application state accessible from all handlers.
///
/// Generic over the store so tests run against `MemoryStore` and the
/// deployed binary against `PgStore`; the outbound services are the
/// in-memory implementations until real gateway integrations land.
pub struct AppState<S: CheckoutStore> {
    pub orchestrator: CheckoutOrchestrator<
        S,
        InMemoryPaymentGateway,
        InMemoryDistributorService,
        InMemoryCrm,
        InMemoryFflDirectory,
    >,
    pub store: S,
    pub config_cache: Arc<ConfigCache>,
}
