use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use pizzabot_core::audit::InMemoryAuditSink;
use pizzabot_core::catalog::source::{CatalogRecord, StaticCatalogSource};
use pizzabot_core::catalog::CatalogStore;
use pizzabot_core::checkout::ports::{OrderStore, PaymentGateway, PaymentGatewayError};
use pizzabot_core::checkout::{CheckoutRequest, CheckoutSettings};
use pizzabot_core::domain::order::{CustomerDetails, DeliveryStatus, PaymentStatus};
use pizzabot_core::domain::payment::{ChargeReceipt, ChargeRequest};
use pizzabot_core::domain::session::SessionId;
use pizzabot_core::errors::OrderError;
use pizzabot_core::service::OrderingService;
use pizzabot_db::{connect_with_settings, migrations, InMemoryOrderStore, SqlOrderStore};

struct ApprovingGateway;

#[async_trait]
impl PaymentGateway for ApprovingGateway {
    fn name(&self) -> &'static str {
        "approving"
    }

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, PaymentGatewayError> {
        Ok(ChargeReceipt::captured(format!("pay_{}", request.amount_minor)))
    }
}

fn catalog() -> Arc<CatalogStore> {
    let records = vec![
        CatalogRecord::new(
            "Margherita",
            Decimal::from(299),
            "pizza",
            Some("Classic cheese and tomato"),
        ),
        CatalogRecord::new("Extra Cheese", Decimal::from(49), "customization", None),
        CatalogRecord::new("Coke", Decimal::from(60), "beverage", None),
    ];
    Arc::new(CatalogStore::new(Arc::new(StaticCatalogSource::new(records))))
}

async fn sql_store() -> Arc<dyn OrderStore> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    Arc::new(SqlOrderStore::new(pool))
}

fn service(orders: Arc<dyn OrderStore>) -> OrderingService {
    OrderingService::new(
        catalog(),
        Arc::new(ApprovingGateway),
        orders,
        Arc::new(InMemoryAuditSink::default()),
        CheckoutSettings::default(),
    )
}

async fn exercise_store(orders: Arc<dyn OrderStore>) {
    let service = service(orders);
    let session = SessionId::new("caller-1");

    service.add_to_cart(&session, "margherita with extra cheese", 2).await.expect("add pizza");
    service.add_to_cart(&session, "coke", 1).await.expect("add drink");
    let upi = service
        .checkout(CheckoutRequest::new(session.clone(), "upi").with_upi_id("asha@okbank"))
        .await
        .expect("upi checkout");
    assert_eq!(upi.order.total, Decimal::from(756));
    assert_eq!(upi.order.payment_reference.as_deref(), Some("pay_75600"));

    service.add_to_cart(&session, "margherita", 1).await.expect("add again");
    let cod = service
        .checkout(CheckoutRequest::new(session.clone(), "cod").with_customer(CustomerDetails {
            name: "Asha".to_string(),
            address: "12 MG Road".to_string(),
            phone: "+919800000001".to_string(),
        }))
        .await
        .expect("cod checkout");
    assert_eq!(cod.order.payment_status, PaymentStatus::Pending);

    let history = service.order_history(&session).await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, upi.order.id);
    assert_eq!(history[0].lines.len(), 3);
    assert_eq!(history[1].customer.address, "12 MG Road");

    let delivered = service
        .update_delivery_status(&cod.order.id, DeliveryStatus::Delivered)
        .await
        .expect("deliver");
    assert_eq!(delivered.delivery_status, DeliveryStatus::Delivered);

    let regress = service
        .update_delivery_status(&cod.order.id, DeliveryStatus::Preparing)
        .await
        .expect_err("delivered is final");
    assert!(matches!(regress, OrderError::InvalidDeliveryTransition { .. }));

    let recent = service.recent_orders(10).await.expect("recent");
    assert_eq!(recent.len(), 2);
}

#[tokio::test]
async fn sqlite_store_satisfies_checkout_contract() {
    exercise_store(sql_store().await).await;
}

#[tokio::test]
async fn in_memory_store_satisfies_checkout_contract() {
    exercise_store(Arc::new(InMemoryOrderStore::default())).await;
}
