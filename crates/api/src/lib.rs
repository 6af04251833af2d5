//! HTTP API for the compliance checkout service.
//!
//! Exposes checkout, order lookup, hold override and compliance policy
//! administration over REST, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::CheckoutOrchestrator;
use checkout::services::{
    InMemoryCrm, InMemoryDistributorService, InMemoryFflDirectory, InMemoryPaymentGateway,
};
use compliance::{BuyerHistory, ConfigCache, ConfigSource, RuleCatalog};
use domain::RoutingPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{AuditStore, ConfigStore, MemoryStore, OrderStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Everything the API needs from a storage backend.
///
/// `MemoryStore` and `PgStore` both satisfy this; handlers and the
/// orchestrator are written against it rather than a concrete store.
pub trait CheckoutStore:
    OrderStore + AuditStore + ConfigStore + ConfigSource + BuyerHistory + Clone + Send + Sync + 'static
{
}

impl<T> CheckoutStore for T where
    T: OrderStore
        + AuditStore
        + ConfigStore
        + ConfigSource
        + BuyerHistory
        + Clone
        + Send
        + Sync
        + 'static
{
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CheckoutStore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/audit", get(routes::orders::audit::<S>))
        .route(
            "/orders/{id}/override",
            post(routes::orders::override_hold::<S>),
        )
        .route("/users/{id}/orders", get(routes::orders::list_for_user::<S>))
        .route("/admin/config", get(routes::admin::get_config::<S>))
        .route("/admin/config", put(routes::admin::update_config::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Handles on the in-memory outbound services, for tests that need to
/// steer payment, distributor, CRM or directory behavior.
#[derive(Clone)]
pub struct Services {
    pub payment: InMemoryPaymentGateway,
    pub distributor: InMemoryDistributorService,
    pub crm: InMemoryCrm,
    pub ffl_directory: InMemoryFflDirectory,
}

/// Creates the default application state over an in-memory store, with
/// the standard jurisdiction rule catalog.
pub fn create_default_state() -> (Arc<AppState<MemoryStore>>, Services) {
    let store = MemoryStore::new();
    let services = Services {
        payment: InMemoryPaymentGateway::new(),
        distributor: InMemoryDistributorService::new(),
        crm: InMemoryCrm::new(),
        ffl_directory: InMemoryFflDirectory::new(),
    };
    let config_cache = Arc::new(ConfigCache::new());

    let orchestrator = CheckoutOrchestrator::new(
        store.clone(),
        services.payment.clone(),
        services.distributor.clone(),
        services.crm.clone(),
        services.ffl_directory.clone(),
        RuleCatalog::standard(),
        RoutingPolicy::new(),
        config_cache.clone(),
    );

    let state = Arc::new(AppState {
        orchestrator,
        store,
        config_cache,
    });

    (state, services)
}
