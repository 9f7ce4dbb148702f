use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::checkout::ports::OrderStore;
use crate::domain::order::{DeliveryStatus, Order, OrderId};
use crate::errors::OrderError;

const MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Operator-side delivery updates. Statuses only move forward.
#[derive(Clone)]
pub struct DeliveryTracker {
    orders: Arc<dyn OrderStore>,
    audit: Arc<dyn AuditSink>,
}

impl DeliveryTracker {
    pub fn new(orders: Arc<dyn OrderStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { orders, audit }
    }

    pub async fn update(
        &self,
        order_id: &OrderId,
        status: DeliveryStatus,
        actor: &str,
    ) -> Result<Order, OrderError> {
        let mut attempts = 0;
        let (order, previous) = loop {
            attempts += 1;
            let mut order = self
                .orders
                .fetch_order(order_id)
                .await?
                .ok_or_else(|| OrderError::OrderNotFound { order_id: order_id.to_string() })?;

            let previous = order.delivery_status;
            order.transition_delivery(status)?;
            if previous == status
                || self.orders.update_delivery_status(order_id, previous, status).await?
            {
                break (order, previous);
            }

            // another update landed between the read and the write
            warn!(
                event_name = "order.delivery_status_conflict",
                order_id = %order_id,
                expected = previous.as_str(),
                attempt = attempts,
                "delivery status changed concurrently; re-reading"
            );
            if attempts >= MAX_UPDATE_ATTEMPTS {
                return Err(OrderError::Storage {
                    detail: format!("delivery status of `{order_id}` keeps changing concurrently"),
                    external_reference: None,
                });
            }
        };

        info!(
            event_name = "order.delivery_status_updated",
            order_id = %order_id,
            from = previous.as_str(),
            to = status.as_str(),
            actor,
            "delivery status updated"
        );
        self.audit.emit(
            AuditContext::new(Some(order.session_id.clone()), Uuid::new_v4().to_string(), actor)
                .event(
                    "order.delivery_status_updated",
                    AuditCategory::Persistence,
                    AuditOutcome::Success,
                )
                .with_metadata("order_id", order_id.as_str())
                .with_metadata("from", previous.as_str())
                .with_metadata("to", status.as_str()),
        );
        Ok(order)
    }
}
