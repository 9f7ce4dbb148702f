use std::sync::Arc;

use pizzabot_core::audit::TracingAuditSink;
use pizzabot_core::checkout::ports::OrderStore;
use pizzabot_core::checkout::DeliveryTracker;
use pizzabot_core::config::DatabaseConfig;
use pizzabot_core::domain::order::{DeliveryStatus, Order, OrderId};
use pizzabot_core::domain::session::SessionId;
use pizzabot_core::errors::OrderError;
use pizzabot_db::{connect_with_config, DbPool, SqlOrderStore};
use serde_json::json;

use crate::commands::{block_on, load_config, CommandResult};

enum Failure {
    Connect(String),
    Order(OrderError),
}

impl Failure {
    fn into_result(self, command: &str) -> CommandResult {
        match self {
            Self::Connect(message) => {
                CommandResult::failure(command, "db_connectivity", message, 4)
            }
            Self::Order(error) => {
                let exit_code = match error {
                    OrderError::Storage { .. } => 4,
                    _ => 1,
                };
                CommandResult::failure(command, error.code(), error.to_string(), exit_code)
            }
        }
    }
}

pub fn list(limit: u32, session: Option<String>) -> CommandResult {
    const COMMAND: &str = "orders list";
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let result = block_on(COMMAND, fetch(&config.database, limit, session));

    match result {
        Ok(Ok(orders)) => CommandResult::success_with_data(
            COMMAND,
            format!("{} orders", orders.len()),
            json!(orders.iter().map(summary).collect::<Vec<_>>()),
        ),
        Ok(Err(failure)) => failure.into_result(COMMAND),
        Err(failure) => failure,
    }
}

pub fn set_status(order_id: &str, status: &str) -> CommandResult {
    const COMMAND: &str = "orders set-status";
    let Some(status) = DeliveryStatus::parse(status) else {
        return CommandResult::failure(
            COMMAND,
            "invalid_status",
            format!(
                "unsupported delivery status `{status}` (expected pending|preparing|delivered)"
            ),
            2,
        );
    };
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let order_id = OrderId(order_id.trim().to_string());
    let result = block_on(COMMAND, update(&config.database, &order_id, status));

    match result {
        Ok(Ok(order)) => CommandResult::success_with_data(
            COMMAND,
            format!("order {} is {}", order.id, order.delivery_status),
            summary(&order),
        ),
        Ok(Err(failure)) => failure.into_result(COMMAND),
        Err(failure) => failure,
    }
}

async fn fetch(
    config: &DatabaseConfig,
    limit: u32,
    session: Option<String>,
) -> Result<Vec<Order>, Failure> {
    let pool = connect(config).await?;
    let store = SqlOrderStore::new(pool.clone());
    let orders = match session {
        Some(session) => store.fetch_orders(&SessionId::new(session)).await,
        None => store.list_recent(limit).await,
    };
    pool.close().await;
    orders.map_err(|error| Failure::Order(error.into()))
}

async fn update(
    config: &DatabaseConfig,
    order_id: &OrderId,
    status: DeliveryStatus,
) -> Result<Order, Failure> {
    let pool = connect(config).await?;
    let orders = Arc::new(SqlOrderStore::new(pool.clone()));
    let tracker = DeliveryTracker::new(orders, Arc::new(TracingAuditSink));
    let updated = tracker.update(order_id, status, "cli").await;
    pool.close().await;
    updated.map_err(Failure::Order)
}

async fn connect(config: &DatabaseConfig) -> Result<DbPool, Failure> {
    connect_with_config(config)
        .await
        .map_err(|error| Failure::Connect(format!("failed to connect to database: {error}")))
}

fn summary(order: &Order) -> serde_json::Value {
    json!({
        "order_id": order.id.as_str(),
        "session_id": order.session_id,
        "items": order.lines.iter().map(|line| json!({
            "name": line.display_name,
            "quantity": line.quantity,
            "unit_price": line.unit_price.to_string(),
        })).collect::<Vec<_>>(),
        "total": order.total.to_string(),
        "currency": order.currency,
        "payment_method": order.payment_method,
        "payment_status": order.payment_status.as_str(),
        "delivery_status": order.delivery_status.as_str(),
        "created_at": order.created_at.to_rfc3339(),
    })
}
