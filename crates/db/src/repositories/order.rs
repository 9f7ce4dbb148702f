use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use pizzabot_core::checkout::ports::OrderStore;
use pizzabot_core::domain::order::{
    CustomerDetails, DeliveryStatus, Order, OrderId, OrderLine, PaymentStatus,
};
use pizzabot_core::domain::payment::PaymentMethod;
use pizzabot_core::domain::session::SessionId;
use pizzabot_core::errors::StorageError;

use super::RepositoryError;
use crate::DbPool;

const ORDER_COLUMNS: &str = "id, session_id, customer_name, customer_address, customer_phone,
     payment_method, payment_status, payment_reference, delivery_status,
     total, currency, created_at";

pub struct SqlOrderStore {
    pool: DbPool,
}

impl SqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, session_id, customer_name, customer_address, customer_phone,
                                 payment_method, payment_status, payment_reference,
                                 delivery_status, total, currency, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.id.as_str())
        .bind(order.session_id.as_str())
        .bind(&order.customer.name)
        .bind(&order.customer.address)
        .bind(&order.customer.phone)
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_reference.as_deref())
        .bind(order.delivery_status.as_str())
        .bind(order.total.to_string())
        .bind(&order.currency)
        // fixed precision keeps the text column sortable
        .bind(order.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&mut *tx)
        .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_lines (order_id, position, display_name, quantity, unit_price)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(order.id.as_str())
            .bind(position as i64)
            .bind(&line.display_name)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_lines(&self, order_id: &str) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT display_name, quantity, unit_price
             FROM order_lines WHERE order_id = ? ORDER BY position ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_line).collect()
    }

    async fn hydrate(&self, rows: Vec<SqliteRow>) -> Result<Vec<Order>, RepositoryError> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut order = row_to_order(row)?;
            order.lines = self.load_lines(order.id.as_str()).await?;
            orders.push(order);
        }
        Ok(orders)
    }
}

fn decode<T>(row: &SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("{column} `{raw}` is not a decimal: {e}")))
}

fn row_to_line(row: &SqliteRow) -> Result<OrderLine, RepositoryError> {
    let quantity: i64 = decode(row, "quantity")?;
    let unit_price: String = decode(row, "unit_price")?;

    Ok(OrderLine {
        display_name: decode(row, "display_name")?,
        quantity: u32::try_from(quantity)
            .map_err(|_| RepositoryError::Decode(format!("quantity {quantity} out of range")))?,
        unit_price: parse_decimal("unit_price", &unit_price)?,
    })
}

fn row_to_order(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let payment_method: String = decode(row, "payment_method")?;
    let payment_status: String = decode(row, "payment_status")?;
    let delivery_status: String = decode(row, "delivery_status")?;
    let total: String = decode(row, "total")?;
    let created_at: String = decode(row, "created_at")?;

    Ok(Order {
        id: OrderId(decode(row, "id")?),
        session_id: SessionId(decode(row, "session_id")?),
        lines: Vec::new(),
        customer: CustomerDetails {
            name: decode(row, "customer_name")?,
            address: decode(row, "customer_address")?,
            phone: decode(row, "customer_phone")?,
        },
        payment_method: PaymentMethod::parse(&payment_method).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown payment method `{payment_method}`"))
        })?,
        payment_status: PaymentStatus::parse(&payment_status).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown payment status `{payment_status}`"))
        })?,
        payment_reference: decode(row, "payment_reference")?,
        delivery_status: DeliveryStatus::parse(&delivery_status).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown delivery status `{delivery_status}`"))
        })?,
        total: parse_decimal("total", &total)?,
        currency: decode(row, "currency")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Decode(format!("created_at `{created_at}`: {e}")))?,
    })
}

#[async_trait]
impl OrderStore for SqlOrderStore {
    async fn persist_order(&self, order: &Order) -> Result<OrderId, StorageError> {
        self.insert(order).await?;
        debug!(event_name = "order.row_inserted", order_id = %order.id, lines = order.lines.len());
        Ok(order.id.clone())
    }

    async fn update_delivery_status(
        &self,
        order_id: &OrderId,
        expected: DeliveryStatus,
        next: DeliveryStatus,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE orders SET delivery_status = ? WHERE id = ? AND delivery_status = ?",
        )
        .bind(next.as_str())
        .bind(order_id.as_str())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE id = ?")
            .bind(order_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        if exists == 0 {
            return Err(RepositoryError::NotFound(order_id.to_string()).into());
        }
        Ok(false)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(order_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn fetch_orders(&self, session_id: &SessionId) -> Result<Vec<Order>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE session_id = ?
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(self.hydrate(rows).await?)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Order>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(self.hydrate(rows).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use pizzabot_core::checkout::ports::OrderStore;
    use pizzabot_core::domain::order::{
        CustomerDetails, DeliveryStatus, Order, OrderId, OrderLine, PaymentStatus,
    };
    use pizzabot_core::domain::payment::PaymentMethod;
    use pizzabot_core::domain::session::SessionId;
    use pizzabot_core::errors::StorageError;

    use super::SqlOrderStore;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlOrderStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlOrderStore::new(pool)
    }

    fn sample_order(id: &str, session: &str, minutes_after: i64) -> Order {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 19, 0, 0).single().expect("valid timestamp");
        Order {
            id: OrderId(id.to_string()),
            session_id: SessionId::new(session),
            lines: vec![
                OrderLine {
                    display_name: "Margherita".to_string(),
                    quantity: 2,
                    unit_price: Decimal::new(29900, 2),
                },
                OrderLine {
                    display_name: "Extra Cheese".to_string(),
                    quantity: 2,
                    unit_price: Decimal::new(4900, 2),
                },
            ],
            customer: CustomerDetails {
                name: "Asha".to_string(),
                address: "12 MG Road".to_string(),
                phone: "+919800000001".to_string(),
            },
            payment_method: PaymentMethod::Upi,
            payment_status: PaymentStatus::Paid,
            payment_reference: Some("pay_123".to_string()),
            delivery_status: DeliveryStatus::Pending,
            total: Decimal::new(69600, 2),
            currency: "INR".to_string(),
            created_at: base + Duration::minutes(minutes_after),
        }
    }

    #[tokio::test]
    async fn persisted_order_reads_back_with_lines_in_order() {
        let store = setup().await;
        let order = sample_order("ORD-1", "s-1", 0);

        let id = store.persist_order(&order).await.expect("persist");
        let found = store.fetch_order(&id).await.expect("fetch").expect("should exist");

        assert_eq!(found, order);
    }

    #[tokio::test]
    async fn duplicate_order_id_is_a_storage_failure() {
        let store = setup().await;
        let order = sample_order("ORD-1", "s-1", 0);
        store.persist_order(&order).await.expect("first persist");

        let error = store.persist_order(&order).await.expect_err("duplicate id");
        assert!(matches!(error, StorageError::Unavailable(_)));
    }

    #[tokio::test]
    async fn history_is_oldest_first_and_recent_is_newest_first() {
        let store = setup().await;
        store.persist_order(&sample_order("ORD-2", "s-1", 10)).await.expect("persist");
        store.persist_order(&sample_order("ORD-1", "s-1", 0)).await.expect("persist");
        store.persist_order(&sample_order("ORD-3", "s-2", 20)).await.expect("persist");

        let history = store.fetch_orders(&SessionId::new("s-1")).await.expect("history");
        let ids: Vec<&str> = history.iter().map(|order| order.id.as_str()).collect();
        assert_eq!(ids, vec!["ORD-1", "ORD-2"]);

        let recent = store.list_recent(2).await.expect("recent");
        let ids: Vec<&str> = recent.iter().map(|order| order.id.as_str()).collect();
        assert_eq!(ids, vec!["ORD-3", "ORD-2"]);
    }

    #[tokio::test]
    async fn delivery_status_updates_and_missing_orders() {
        let store = setup().await;
        let order = sample_order("ORD-1", "s-1", 0);
        store.persist_order(&order).await.expect("persist");

        let applied = store
            .update_delivery_status(&order.id, DeliveryStatus::Pending, DeliveryStatus::Preparing)
            .await
            .expect("update");
        assert!(applied);
        let found = store.fetch_order(&order.id).await.expect("fetch").expect("exists");
        assert_eq!(found.delivery_status, DeliveryStatus::Preparing);

        let stale = store
            .update_delivery_status(&order.id, DeliveryStatus::Pending, DeliveryStatus::Delivered)
            .await
            .expect("stale expectation is not an error");
        assert!(!stale);
        let found = store.fetch_order(&order.id).await.expect("fetch").expect("exists");
        assert_eq!(found.delivery_status, DeliveryStatus::Preparing);

        let missing = OrderId("ORD-404".to_string());
        let error = store
            .update_delivery_status(&missing, DeliveryStatus::Pending, DeliveryStatus::Delivered)
            .await
            .expect_err("unknown order");
        assert_eq!(error, StorageError::NotFound("ORD-404".to_string()));
        assert!(store.fetch_order(&missing).await.expect("fetch").is_none());
    }
}
