//! Handling for distributor failures after payment capture.
//!
//! Money has moved by the time the distributor answers, so a failed
//! submission can never unwind the checkout. The order is parked in a
//! manual processing status for an operator instead, and the captured
//! payment is left alone. Refunds are an explicit operator action.

use domain::{DistributorSubmission, Order, OrderStatus};
use store::{AuditKind, AuditRecord, AuditStore, OrderStore};

use crate::error::CheckoutError;
use crate::services::DistributorError;

/// The manual processing status a distributor failure maps to.
///
/// Business rejections mean the distributor saw the order and refused it;
/// an operator can fix and resubmit. Technical failures mean the order's
/// fate at the distributor is unknown, which needs a human before anything
/// else happens, hence the critical status.
pub fn status_for_failure(error: &DistributorError) -> OrderStatus {
    if error.is_technical() {
        OrderStatus::ManualProcessingCritical
    } else {
        OrderStatus::ManualProcessingRequired
    }
}

/// Parks a paid order after a distributor failure and records the audit
/// trail entry.
pub async fn park_order<S>(
    store: &S,
    order: &mut Order,
    error: &DistributorError,
) -> Result<(), CheckoutError>
where
    S: OrderStore + AuditStore,
{
    let next = status_for_failure(error);
    order.record_distributor_submission(DistributorSubmission::Failed {
        error: error.to_string(),
    });
    order.transition_to(next)?;
    store.update_order(order).await?;

    let mut record = AuditRecord::new(
        AuditKind::DistributorFailure,
        format!("distributor submission failed, parked as {next}: {error}"),
    )
    .for_order(order.id());
    if let Some(transaction_id) = order.payment_transaction_id() {
        record = record.with_payment(transaction_id);
    }
    // The order is already parked and visible to operators; a failed
    // audit write must not surface as a checkout error on top of it.
    if let Err(e) = store.append_audit(record).await {
        tracing::error!(order_id = %order.id(), error = %e, "failed to append audit record");
    }

    let kind = if error.is_technical() { "technical" } else { "business" };
    metrics::counter!("checkout_distributor_failures_total", "kind" => kind).increment(1);
    tracing::error!(
        order_id = %order.id(),
        status = %next,
        error = %error,
        "distributor submission failed after payment capture"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderId, StateCode, UserId};
    use domain::{CartItem, Money, RoutingPolicy, route};
    use store::MemoryStore;

    fn paid_order() -> Order {
        let items = vec![CartItem::firearm("RIFLE-1", 1, Money::from_cents(79900))];
        let groups = route(&items, &RoutingPolicy::new());
        Order::create(
            OrderId::new(),
            UserId::new(),
            StateCode::parse("TX").unwrap(),
            OrderStatus::Paid,
            None,
            groups,
            "TXN-1".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn rejection_maps_to_required_and_outage_to_critical() {
        assert_eq!(
            status_for_failure(&DistributorError::Rejected("no stock".to_string())),
            OrderStatus::ManualProcessingRequired
        );
        assert_eq!(
            status_for_failure(&DistributorError::Timeout),
            OrderStatus::ManualProcessingCritical
        );
        assert_eq!(
            status_for_failure(&DistributorError::Transport("refused".to_string())),
            OrderStatus::ManualProcessingCritical
        );
    }

    #[tokio::test]
    async fn park_order_records_submission_failure_and_audit() {
        let store = MemoryStore::new();
        let mut order = store.insert_order(paid_order(), None).await.unwrap();

        park_order(&store, &mut order, &DistributorError::Timeout)
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::ManualProcessingCritical);
        assert!(matches!(
            order.distributor_submission(),
            DistributorSubmission::Failed { .. }
        ));

        let stored = store.get_order(order.id()).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::ManualProcessingCritical);

        let audit = store.audit_for_order(order.id()).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].kind, AuditKind::DistributorFailure);
        assert!(audit[0].payment_captured);
        assert_eq!(audit[0].payment_transaction_id.as_deref(), Some("TXN-1"));
    }

    #[tokio::test]
    async fn park_order_survives_an_audit_write_failure() {
        let store = MemoryStore::new();
        let mut order = store.insert_order(paid_order(), None).await.unwrap();
        store.set_fail_audit_appends(true).await;

        park_order(
            &store,
            &mut order,
            &DistributorError::Rejected("no stock".to_string()),
        )
        .await
        .unwrap();

        // The park still happened; only the audit entry is missing.
        let stored = store.get_order(order.id()).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::ManualProcessingRequired);
        assert!(store.audit_for_order(order.id()).await.unwrap().is_empty());
    }
}
