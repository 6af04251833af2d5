//! Checkout orchestrator.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::OrderId;
use compliance::{
    BuyerHistory, ComplianceEvaluator, ConfigCache, ConfigSource, HoldType, RuleCatalog,
};
use domain::{
    DistributorSubmission, FflSnapshot, FulfillmentType, Order, OrderStatus, RoutingPolicy, route,
};
use store::{AuditKind, AuditRecord, AuditStore, FirearmWindowGuard, OrderStore, StoreError};

use crate::error::CheckoutError;
use crate::partial_failure;
use crate::request::{CheckoutOutcome, CheckoutRequest, HoldNotice};
use crate::services::crm::CrmSync;
use crate::services::distributor::{DistributorError, DistributorService};
use crate::services::ffl::FflDirectory;
use crate::services::payment::PaymentGateway;

/// Outbound call deadlines.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub payment: Duration,
    pub distributor: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            payment: Duration::from_secs(10),
            distributor: Duration::from_secs(15),
        }
    }
}

/// Drives a checkout from compliance evaluation through CRM sync.
///
/// The pipeline is strictly ordered: hard blocks are decided before any
/// money moves, holds are decided before capture, and everything after a
/// successful capture degrades instead of unwinding. There is no
/// compensation step that refunds a captured payment; failures after
/// capture park the order for an operator.
pub struct CheckoutOrchestrator<S, P, D, C, F>
where
    S: OrderStore + AuditStore + ConfigSource + BuyerHistory + Clone + Send + Sync + 'static,
    P: PaymentGateway,
    D: DistributorService,
    C: CrmSync + Clone + Send + Sync + 'static,
    F: FflDirectory,
{
    store: S,
    payment: P,
    distributor: D,
    crm: C,
    ffl_directory: F,
    evaluator: ComplianceEvaluator<S>,
    config_cache: Arc<ConfigCache>,
    routing: RoutingPolicy,
    timeouts: Timeouts,
}

impl<S, P, D, C, F> CheckoutOrchestrator<S, P, D, C, F>
where
    S: OrderStore + AuditStore + ConfigSource + BuyerHistory + Clone + Send + Sync + 'static,
    P: PaymentGateway,
    D: DistributorService,
    C: CrmSync + Clone + Send + Sync + 'static,
    F: FflDirectory,
{
    /// Creates a new orchestrator with default timeouts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: S,
        payment: P,
        distributor: D,
        crm: C,
        ffl_directory: F,
        catalog: RuleCatalog,
        routing: RoutingPolicy,
        config_cache: Arc<ConfigCache>,
    ) -> Self {
        let evaluator = ComplianceEvaluator::new(catalog, store.clone());
        Self {
            store,
            payment,
            distributor,
            crm,
            ffl_directory,
            evaluator,
            config_cache,
            routing,
            timeouts: Timeouts::default(),
        }
    }

    /// Overrides the outbound call deadlines.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Executes one checkout attempt.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, destination = %request.shipping_state))]
    pub async fn execute_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = std::time::Instant::now();

        if request.items.is_empty() {
            return Err(CheckoutError::InvalidRequest("cart is empty".to_string()));
        }
        if let Some(item) = request.items.iter().find(|i| i.quantity == 0) {
            return Err(CheckoutError::InvalidRequest(format!(
                "zero quantity for sku {}",
                item.sku
            )));
        }

        let config = self.config_cache.get(&self.store).await?;

        // 1. Compliance. A hard block ends the checkout before any money
        // moves; no order is created for it.
        let verdict = self
            .evaluator
            .evaluate(
                request.user_id,
                &request.items,
                request.shipping_state,
                &config,
            )
            .await;

        if verdict.is_blocked() {
            let skus: Vec<&str> = verdict.blocked_items.iter().map(|b| b.sku.as_str()).collect();
            self.append_audit_best_effort(AuditRecord::new(
                AuditKind::CheckoutBlocked,
                format!(
                    "checkout blocked for {}: {}",
                    request.shipping_state,
                    skus.join(", ")
                ),
            ))
            .await;
            metrics::counter!("checkout_blocked_total").increment(1);
            return Err(CheckoutError::HardBlock {
                blocked: verdict.blocked_items,
            });
        }

        let mut hold = verdict.hold;
        let mut hold_reason = verdict.reason.clone();

        // 2. Resolve the receiving dealer for FFL-bound items. A dealer
        // picked on the request wins over the one on file. Directory
        // trouble degrades to no snapshot; it never blocks the checkout.
        let snapshot = self.resolve_ffl_snapshot(&request).await;
        if hold == Some(HoldType::Ffl) && snapshot.as_ref().is_some_and(|s| s.atf_active) {
            // The buyer named a working dealer for this order, so the
            // on-file requirement is satisfied. The window limit is still
            // enforced by the insert-time guard below.
            hold = None;
            hold_reason = None;
        }

        let entry_status = match hold {
            None => OrderStatus::Paid,
            Some(HoldType::Ffl) => OrderStatus::PendingFfl,
            Some(HoldType::MultiFirearm) => OrderStatus::MultiFirearmHold,
        };

        // 3. Capture payment. A timeout is ambiguous at the gateway, but
        // without a transaction id there is nothing to build an order on;
        // treat it as a failed capture.
        let capture = match tokio::time::timeout(
            self.timeouts.payment,
            self.payment
                .capture(request.user_id, request.total(), &request.payment_method),
        )
        .await
        {
            Ok(Ok(capture)) => capture,
            Ok(Err(e)) => {
                metrics::counter!("checkout_capture_failures_total").increment(1);
                return Err(CheckoutError::CaptureFailure(e.to_string()));
            }
            Err(_) => {
                metrics::counter!("checkout_capture_failures_total").increment(1);
                tracing::warn!("payment capture timed out");
                return Err(CheckoutError::CaptureFailure(
                    "payment gateway timed out".to_string(),
                ));
            }
        };

        // 4. Build and persist the order. The window guard re-runs the
        // rolling-window count atomically with the insert, closing the
        // race between the pre-payment check and the order landing.
        let groups = route(&request.items, &self.routing);
        let mut order = Order::create(
            OrderId::new(),
            request.user_id,
            request.shipping_state,
            entry_status,
            hold_reason,
            groups,
            capture.transaction_id.clone(),
        )?;
        if let Some(snapshot) = snapshot {
            order.attach_ffl_snapshot(snapshot);
        }

        let guard = (entry_status == OrderStatus::Paid
            && config.multi_firearm_hold_enabled
            && order.firearm_quantity() > 0)
            .then(|| FirearmWindowGuard {
                window_start: config.window_start(Utc::now()),
                limit: config.firearm_limit_per_window,
            });

        let mut order = self
            .persist_with_retry(order, guard, &capture.transaction_id)
            .await?;

        if order.status().is_hold() {
            let hold_label = match order.status() {
                OrderStatus::PendingFfl => "ffl",
                _ => "multi_firearm",
            };
            metrics::counter!("checkout_holds_total", "hold" => hold_label).increment(1);
            let mut record = AuditRecord::new(
                AuditKind::HoldApplied,
                order.hold_reason().unwrap_or("hold applied").to_string(),
            )
            .for_order(order.id())
            .with_payment(&capture.transaction_id);
            record.detail = format!("{} ({})", record.detail, order.status());
            self.append_audit_best_effort(record).await;
            tracing::info!(order_id = %order.id(), status = %order.status(), "order held");
        }

        // 5. Downstream submission, only for orders that cleared every
        // hold. Held orders wait for release before anything ships.
        if order.status() == OrderStatus::Paid {
            self.submit_downstream(&mut order).await?;
        }

        // 6. CRM sync is fire-and-forget after the order is committed.
        self.spawn_crm_sync(order.clone(), request.customer.clone());

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        metrics::counter!("checkout_completed_total").increment(1);
        tracing::info!(
            order_id = %order.id(),
            order_number = %order.order_number(),
            status = %order.status(),
            "checkout completed"
        );

        let hold_notice = order.status().is_hold().then(|| HoldNotice {
            hold_type: if order.status() == OrderStatus::PendingFfl {
                HoldType::Ffl
            } else {
                HoldType::MultiFirearm
            },
            reason: order.hold_reason().unwrap_or("").to_string(),
        });

        Ok(CheckoutOutcome {
            order_id: order.id(),
            order_number: order.order_number().clone(),
            status: order.status(),
            hold: hold_notice,
            payment_transaction_id: capture.transaction_id,
        })
    }

    /// Releases a hold after operator review.
    ///
    /// Refuses orders that are not on hold and orders without a captured
    /// payment on record; the override must never ship an unpaid order.
    #[tracing::instrument(skip(self, note))]
    pub async fn override_hold(
        &self,
        order_id: OrderId,
        operator_id: &str,
        note: Option<&str>,
    ) -> Result<Order, CheckoutError> {
        let mut order = self.get_order(order_id).await?;

        if !order.status().is_hold() {
            return Err(CheckoutError::InvalidOverride(format!(
                "order is {}, not on hold",
                order.status()
            )));
        }
        let transaction_id = order
            .payment_transaction_id()
            .ok_or_else(|| {
                CheckoutError::InvalidOverride("order has no captured payment".to_string())
            })?
            .to_string();

        let released_from = order.status();
        order.transition_to(OrderStatus::ReadyToFulfill)?;
        self.store.update_order(&order).await?;

        self.append_audit_best_effort(
            AuditRecord::new(
                AuditKind::HoldOverridden,
                note.map(str::to_string)
                    .unwrap_or_else(|| format!("{released_from} released")),
            )
            .for_order(order_id)
            .with_payment(transaction_id)
            .by_operator(operator_id),
        )
        .await;

        metrics::counter!("checkout_hold_overrides_total").increment(1);
        tracing::info!(%order_id, operator_id, from = %released_from, "hold overridden");
        Ok(order)
    }

    /// Loads an order, mapping the store's not-found to the checkout one.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        self.store.get_order(order_id).await.map_err(|e| match e {
            StoreError::OrderNotFound(id) => CheckoutError::OrderNotFound(id),
            other => CheckoutError::Store(other),
        })
    }

    async fn resolve_ffl_snapshot(&self, request: &CheckoutRequest) -> Option<FflSnapshot> {
        if !request.items.iter().any(domain::CartItem::needs_ffl) {
            return None;
        }

        let dealer = match request.ffl_recipient_id {
            Some(id) => Some(id),
            None => self
                .store
                .verified_preferred_ffl(request.user_id)
                .await
                .unwrap_or_default(),
        };
        let ffl_id = dealer?;

        match self.ffl_directory.lookup(ffl_id).await {
            Ok(Some(snapshot)) => {
                if snapshot.is_stale {
                    tracing::warn!(%ffl_id, "ffl directory served stale data, order flagged");
                }
                Some(snapshot)
            }
            Ok(None) => {
                tracing::warn!(%ffl_id, "ffl not found in directory");
                None
            }
            Err(e) => {
                tracing::warn!(%ffl_id, error = %e, "ffl directory lookup failed");
                None
            }
        }
    }

    async fn persist_with_retry(
        &self,
        order: Order,
        guard: Option<FirearmWindowGuard>,
        transaction_id: &str,
    ) -> Result<Order, CheckoutError> {
        let first = match self.store.insert_order(order.clone(), guard).await {
            Ok(stored) => return Ok(stored),
            Err(e) => e,
        };
        tracing::warn!(
            order_id = %order.id(),
            error = %first,
            "order persistence failed after capture, retrying once"
        );

        match self.store.insert_order(order.clone(), guard).await {
            Ok(stored) => Ok(stored),
            Err(second) => {
                self.append_audit_best_effort(
                    AuditRecord::new(
                        AuditKind::PersistenceFailure,
                        format!("order persistence failed twice after capture: {second}"),
                    )
                    .for_order(order.id())
                    .with_payment(transaction_id),
                )
                .await;
                metrics::counter!("checkout_persistence_failures_total").increment(1);
                tracing::error!(
                    order_id = %order.id(),
                    transaction_id,
                    error = %second,
                    "order lost after payment capture, operator attention required"
                );
                Err(CheckoutError::Persistence {
                    transaction_id: transaction_id.to_string(),
                    source: second,
                })
            }
        }
    }

    async fn submit_downstream(&self, order: &mut Order) -> Result<(), CheckoutError> {
        let needs_distributor = order.fulfillment_groups().iter().any(|g| {
            matches!(
                g.fulfillment_type,
                FulfillmentType::DropShipToFfl | FulfillmentType::DropShipToCustomer
            )
        });

        if !needs_distributor {
            order.transition_to(OrderStatus::ReadyToFulfill)?;
            self.store.update_order(order).await?;
            return Ok(());
        }

        let result = match tokio::time::timeout(
            self.timeouts.distributor,
            self.distributor.submit(order),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DistributorError::Timeout),
        };

        match result {
            Ok(outcome) => {
                order.record_distributor_submission(DistributorSubmission::Submitted {
                    distributor_order_number: outcome.distributor_order_number,
                    estimated_ship_date: outcome.estimated_ship_date,
                });
                order.transition_to(OrderStatus::Processing)?;
                self.store.update_order(order).await?;
                metrics::counter!("checkout_distributor_submissions_total").increment(1);
            }
            Err(e) => {
                partial_failure::park_order(&self.store, order, &e).await?;
            }
        }
        Ok(())
    }

    fn spawn_crm_sync(&self, order: Order, customer: crate::request::CustomerInfo) {
        let crm = self.crm.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            let order_id = order.id();
            match crm.upsert_deal(&order, &customer).await {
                Ok(deal_id) => {
                    // Re-read so a status change since checkout is not
                    // clobbered by this late write.
                    match store.get_order(order_id).await {
                        Ok(mut latest) => {
                            latest.record_crm_deal(deal_id);
                            if let Err(e) = store.update_order(&latest).await {
                                tracing::warn!(%order_id, error = %e, "failed to record crm deal id");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(%order_id, error = %e, "crm sync could not reload order");
                        }
                    }
                }
                Err(e) => {
                    metrics::counter!("checkout_crm_failures_total").increment(1);
                    tracing::warn!(%order_id, error = %e, "crm sync failed");
                    let record = AuditRecord::new(AuditKind::CrmFailure, e.to_string())
                        .for_order(order_id);
                    if let Err(e) = store.append_audit(record).await {
                        tracing::warn!(%order_id, error = %e, "failed to record crm failure");
                    }
                }
            }
        });
    }

    async fn append_audit_best_effort(&self, record: AuditRecord) {
        if let Err(e) = self.store.append_audit(record).await {
            tracing::error!(error = %e, "failed to append audit record");
        }
    }
}
