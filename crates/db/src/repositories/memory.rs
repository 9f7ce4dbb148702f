use async_trait::async_trait;
use tokio::sync::RwLock;

use pizzabot_core::checkout::ports::OrderStore;
use pizzabot_core::domain::order::{DeliveryStatus, Order, OrderId};
use pizzabot_core::domain::session::SessionId;
use pizzabot_core::errors::StorageError;

/// Order store for tests and `sqlite`-less runs. Keeps insertion order.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderStore {
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn persist_order(&self, order: &Order) -> Result<OrderId, StorageError> {
        let mut orders = self.orders.write().await;
        if orders.iter().any(|existing| existing.id == order.id) {
            return Err(StorageError::Unavailable(format!("order `{}` already exists", order.id)));
        }
        orders.push(order.clone());
        Ok(order.id.clone())
    }

    async fn update_delivery_status(
        &self,
        order_id: &OrderId,
        expected: DeliveryStatus,
        next: DeliveryStatus,
    ) -> Result<bool, StorageError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|order| &order.id == order_id)
            .ok_or_else(|| StorageError::NotFound(order_id.to_string()))?;
        if order.delivery_status != expected {
            return Ok(false);
        }
        order.delivery_status = next;
        Ok(true)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|order| &order.id == order_id).cloned())
    }

    async fn fetch_orders(&self, session_id: &SessionId) -> Result<Vec<Order>, StorageError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> =
            orders.iter().filter(|order| &order.session_id == session_id).cloned().collect();
        matching.sort_by_key(|order| order.created_at);
        Ok(matching)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Order>, StorageError> {
        let orders = self.orders.read().await;
        let mut recent: Vec<Order> = orders.iter().rev().cloned().collect();
        recent.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}
