use async_trait::async_trait;
use thiserror::Error;

use crate::domain::order::{DeliveryStatus, Order, OrderId};
use crate::domain::payment::{ChargeReceipt, ChargeRequest};
use crate::domain::session::SessionId;
use crate::errors::StorageError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PaymentGatewayError {
    #[error("payment provider unreachable: {0}")]
    Transport(String),
    #[error("payment provider rejected the request: {0}")]
    Rejected(String),
    #[error("payment provider returned an unreadable response: {0}")]
    Protocol(String),
}

/// Executes charges. Implementations may be slow and may fail; callers do
/// not retry.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, PaymentGatewayError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn persist_order(&self, order: &Order) -> Result<OrderId, StorageError>;

    /// Writes `next` only while the stored status is still `expected`.
    /// Returns `false` when another writer changed it first.
    async fn update_delivery_status(
        &self,
        order_id: &OrderId,
        expected: DeliveryStatus,
        next: DeliveryStatus,
    ) -> Result<bool, StorageError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;

    /// Orders for one session, oldest first.
    async fn fetch_orders(&self, session_id: &SessionId) -> Result<Vec<Order>, StorageError>;

    /// Most recent orders across sessions, newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<Order>, StorageError>;
}
