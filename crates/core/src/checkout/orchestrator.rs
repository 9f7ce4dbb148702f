use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::cart::pricing::{format_amount, to_minor_units, PricingEngine, PricingResult};
use crate::cart::store::CartStore;
use crate::catalog::CatalogStore;
use crate::checkout::ports::{OrderStore, PaymentGateway, PaymentGatewayError};
use crate::checkout::states::{CheckoutAttempt, CheckoutState};
use crate::config::AppConfig;
use crate::domain::cart::Cart;
use crate::domain::order::{
    CustomerDetails, DeliveryStatus, Order, OrderId, OrderLine, PaymentStatus,
};
use crate::domain::payment::{
    ChargeReceipt, ChargeRequest, ChargeStatus, PayeeDetails, PaymentMethod,
};
use crate::domain::session::SessionId;
use crate::errors::OrderError;

static UPI_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{1,255}@[A-Za-z][A-Za-z0-9]{1,63}$")
        .expect("UPI id pattern is valid")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryEstimate {
    pub min_minutes: u32,
    pub max_minutes: u32,
}

impl Default for DeliveryEstimate {
    fn default() -> Self {
        Self { min_minutes: 30, max_minutes: 45 }
    }
}

impl fmt::Display for DeliveryEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} mins", self.min_minutes, self.max_minutes)
    }
}

#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    pub currency: String,
    pub minor_unit_exponent: u32,
    pub delivery_estimate: DeliveryEstimate,
}

impl CheckoutSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            currency: config.catalog.currency.clone(),
            minor_unit_exponent: config.catalog.minor_unit_exponent,
            delivery_estimate: DeliveryEstimate {
                min_minutes: config.checkout.delivery_eta_min_minutes,
                max_minutes: config.checkout.delivery_eta_max_minutes,
            },
        }
    }
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            minor_unit_exponent: 2,
            delivery_estimate: DeliveryEstimate::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub session_id: SessionId,
    pub method: String,
    pub payee: PayeeDetails,
    pub customer: CustomerDetails,
    /// Upper bound on the payment call; `None` waits for the gateway.
    pub timeout: Option<Duration>,
    pub correlation_id: String,
}

impl CheckoutRequest {
    pub fn new(session_id: SessionId, method: impl Into<String>) -> Self {
        Self {
            session_id,
            method: method.into(),
            payee: PayeeDetails::default(),
            customer: CustomerDetails::default(),
            timeout: None,
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_upi_id(mut self, upi_id: impl Into<String>) -> Self {
        self.payee.upi_id = Some(upi_id.into());
        self
    }

    pub fn with_customer(mut self, customer: CustomerDetails) -> Self {
        self.customer = customer;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub delivery_estimate: DeliveryEstimate,
    pub message: String,
}

enum ChargeAttempt {
    Completed(Result<ChargeReceipt, PaymentGatewayError>),
    TimedOut(Duration),
    Cancelled,
}

pub struct CheckoutOrchestrator {
    catalog: Arc<CatalogStore>,
    carts: Arc<CartStore>,
    pricing: Arc<dyn PricingEngine>,
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
    audit: Arc<dyn AuditSink>,
    settings: CheckoutSettings,
}

impl CheckoutOrchestrator {
    pub fn new(
        catalog: Arc<CatalogStore>,
        carts: Arc<CartStore>,
        pricing: Arc<dyn PricingEngine>,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        audit: Arc<dyn AuditSink>,
        settings: CheckoutSettings,
    ) -> Self {
        Self { catalog, carts, pricing, gateway, orders, audit, settings }
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, OrderError> {
        self.checkout_until(request, std::future::pending::<()>()).await
    }

    /// Runs one checkout attempt. If `cancel` resolves while the payment
    /// call is outstanding the attempt fails and the cart is left as is.
    pub async fn checkout_until<C>(
        &self,
        request: CheckoutRequest,
        cancel: C,
    ) -> Result<CheckoutOutcome, OrderError>
    where
        C: Future<Output = ()> + Send,
    {
        let session = Some(request.session_id.clone());
        let audit = AuditContext::new(session, &request.correlation_id, "checkout");
        let mut attempt = CheckoutAttempt::new(self.audit.as_ref(), &audit);
        advance(&mut attempt, CheckoutState::Validating)?;

        let guard = self.carts.lock_session(&request.session_id).await;

        let validated = self.validate(&request, &guard.snapshot());
        let (method, pricing, amount_minor) = match validated {
            Ok(validated) => validated,
            Err(error) => {
                attempt.fail(&error.to_string());
                info!(
                    event_name = "checkout.rejected",
                    session_id = %request.session_id,
                    correlation_id = %request.correlation_id,
                    code = error.code(),
                    "checkout rejected during validation"
                );
                return Err(error);
            }
        };

        let (payment_status, payment_reference) = if method.requires_upfront_charge() {
            advance(&mut attempt, CheckoutState::AwaitingPayment)?;
            let charge = ChargeRequest {
                attempt_id: Uuid::new_v4().to_string(),
                session_id: request.session_id.clone(),
                amount_minor,
                currency: self.settings.currency.clone(),
                method,
                payee: request.payee.clone(),
            };

            match self.charge(charge, request.timeout, cancel, &audit).await {
                Ok(reference) => (PaymentStatus::Paid, Some(reference)),
                Err(error) => {
                    attempt.fail(&error.to_string());
                    return Err(error);
                }
            }
        } else {
            (PaymentStatus::Pending, None)
        };

        let order = Order {
            id: OrderId::generate(),
            session_id: request.session_id.clone(),
            lines: pricing
                .lines
                .iter()
                .map(|line| OrderLine {
                    display_name: line.display_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            customer: request.customer.clone(),
            payment_method: method,
            payment_status,
            payment_reference: payment_reference.clone(),
            delivery_status: DeliveryStatus::Pending,
            total: pricing.total,
            currency: self.settings.currency.clone(),
            created_at: Utc::now(),
        };

        if let Err(storage) = self.orders.persist_order(&order).await {
            error!(
                event_name = "checkout.persist_failed",
                session_id = %request.session_id,
                correlation_id = %request.correlation_id,
                order_id = %order.id,
                payment_reference = payment_reference.as_deref().unwrap_or(""),
                error = %storage,
                "order could not be saved; cart kept for operator retry"
            );
            self.audit.emit(
                audit
                    .event("order.persist_failed", AuditCategory::Persistence, AuditOutcome::Failed)
                    .with_metadata("order_id", order.id.as_str())
                    .with_metadata("error", storage.to_string()),
            );
            let error = OrderError::Storage {
                detail: storage.to_string(),
                external_reference: payment_reference,
            };
            attempt.fail(&error.to_string());
            return Err(error);
        }

        guard.clear();
        drop(guard);
        advance(&mut attempt, CheckoutState::Finalized)?;
        self.audit.emit(
            audit
                .event("order.persisted", AuditCategory::Persistence, AuditOutcome::Success)
                .with_metadata("order_id", order.id.as_str())
                .with_metadata("total", order.total.to_string())
                .with_metadata("payment_status", order.payment_status.as_str()),
        );
        info!(
            event_name = "checkout.finalized",
            session_id = %request.session_id,
            correlation_id = %request.correlation_id,
            order_id = %order.id,
            method = method.as_str(),
            total = %order.total,
            "order finalized"
        );

        let message = self.confirmation_message(&order, &request.payee);
        Ok(CheckoutOutcome { order, delivery_estimate: self.settings.delivery_estimate, message })
    }

    fn validate(
        &self,
        request: &CheckoutRequest,
        cart: &Cart,
    ) -> Result<(PaymentMethod, PricingResult, i64), OrderError> {
        let index = self.catalog.snapshot()?;
        let pricing = self.pricing.price(cart, &index, &self.settings.currency);
        if cart.is_empty() || pricing.is_zero() {
            return Err(OrderError::EmptyCart);
        }

        let method = PaymentMethod::parse(&request.method)
            .ok_or_else(|| OrderError::InvalidPaymentMethod { method: request.method.clone() })?;
        validate_payee(method, &request.payee, &request.customer)?;

        let amount_minor = to_minor_units(pricing.total, self.settings.minor_unit_exponent)?;
        Ok((method, pricing, amount_minor))
    }

    async fn charge<C>(
        &self,
        charge: ChargeRequest,
        timeout: Option<Duration>,
        cancel: C,
        audit: &AuditContext,
    ) -> Result<String, OrderError>
    where
        C: Future<Output = ()> + Send,
    {
        let amount_minor = charge.amount_minor;
        let pending_charge = self.gateway.charge(charge);
        let attempt = match timeout {
            Some(limit) => tokio::select! {
                result = tokio::time::timeout(limit, pending_charge) => match result {
                    Ok(result) => ChargeAttempt::Completed(result),
                    Err(_) => ChargeAttempt::TimedOut(limit),
                },
                () = cancel => ChargeAttempt::Cancelled,
            },
            None => tokio::select! {
                result = pending_charge => ChargeAttempt::Completed(result),
                () = cancel => ChargeAttempt::Cancelled,
            },
        };

        let outcome = match attempt {
            ChargeAttempt::Completed(Ok(receipt)) => receipt_outcome(receipt),
            ChargeAttempt::Completed(Err(gateway_error)) => Err(OrderError::PaymentFailed {
                reason: gateway_error.to_string(),
                external_reference: None,
            }),
            ChargeAttempt::TimedOut(limit) => Err(OrderError::PaymentFailed {
                reason: format!("payment timed out after {}s", limit.as_secs_f64()),
                external_reference: None,
            }),
            ChargeAttempt::Cancelled => Err(OrderError::PaymentFailed {
                reason: "payment cancelled before the provider responded".to_string(),
                external_reference: None,
            }),
        };

        let (event_outcome, detail) = match &outcome {
            Ok(reference) => (AuditOutcome::Success, reference.clone()),
            Err(error) => (AuditOutcome::Failed, error.to_string()),
        };
        self.audit.emit(
            audit
                .event("payment.charge_completed", AuditCategory::Payment, event_outcome)
                .with_metadata("gateway", self.gateway.name())
                .with_metadata("amount_minor", amount_minor.to_string())
                .with_metadata("detail", detail),
        );
        if let Err(error) = &outcome {
            warn!(
                event_name = "checkout.payment_unsuccessful",
                session_id = audit.session_id.as_ref().map(SessionId::as_str).unwrap_or(""),
                correlation_id = %audit.correlation_id,
                code = error.code(),
                reason = %error,
                "payment did not capture"
            );
        }

        outcome
    }

    fn confirmation_message(&self, order: &Order, payee: &PayeeDetails) -> String {
        let amount =
            format_amount(order.total, &order.currency, self.settings.minor_unit_exponent);
        let eta = self.settings.delivery_estimate;
        match order.payment_method {
            PaymentMethod::Upi => format!(
                "Payment successful! Transaction ID: {}\nAmount: {amount} | UPI: {}\nOrder {} confirmed. Estimated delivery: {eta}",
                order.payment_reference.as_deref().unwrap_or("-"),
                payee.upi_id.as_deref().unwrap_or("-"),
                order.id,
            ),
            PaymentMethod::CashOnDelivery => format!(
                "COD confirmed! Order {}\nAmount: {amount}\nPay when you receive your order. Delivery time: {eta}",
                order.id,
            ),
        }
    }
}

fn advance(attempt: &mut CheckoutAttempt<'_>, next: CheckoutState) -> Result<(), OrderError> {
    attempt.advance(next).map_err(|error| OrderError::InvariantViolation(error.to_string()))
}

fn receipt_outcome(receipt: ChargeReceipt) -> Result<String, OrderError> {
    match receipt.status {
        ChargeStatus::Captured => Ok(receipt.external_reference),
        ChargeStatus::Pending => {
            Err(OrderError::PaymentPending { external_reference: receipt.external_reference })
        }
        ChargeStatus::Failed => Err(OrderError::PaymentFailed {
            reason: receipt.reason.unwrap_or_else(|| "payment declined".to_string()),
            external_reference: Some(receipt.external_reference),
        }),
    }
}

pub fn validate_payee(
    method: PaymentMethod,
    payee: &PayeeDetails,
    customer: &CustomerDetails,
) -> Result<(), OrderError> {
    match method {
        PaymentMethod::Upi => {
            let upi_id = payee.upi_id.as_deref().map(str::trim).unwrap_or_default();
            if !UPI_ID.is_match(upi_id) {
                return Err(OrderError::InvalidPayeeDetails {
                    reason: "UPI id must look like name@bank".to_string(),
                });
            }
        }
        PaymentMethod::CashOnDelivery => {
            if customer.address.trim().is_empty() || customer.phone.trim().is_empty() {
                return Err(OrderError::InvalidPayeeDetails {
                    reason: "cash on delivery needs a delivery address and phone number"
                        .to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{validate_payee, CheckoutOrchestrator, CheckoutRequest, CheckoutSettings};
    use crate::audit::InMemoryAuditSink;
    use crate::cart::pricing::DeterministicPricingEngine;
    use crate::cart::store::CartStore;
    use crate::catalog::fixtures;
    use crate::catalog::source::StaticCatalogSource;
    use crate::catalog::CatalogStore;
    use crate::checkout::fakes::{MemoryOrders, ScriptedGateway};
    use crate::checkout::ports::PaymentGatewayError;
    use crate::domain::order::{CustomerDetails, PaymentStatus};
    use crate::domain::payment::{ChargeReceipt, PayeeDetails, PaymentMethod};
    use crate::domain::session::SessionId;
    use crate::errors::OrderError;

    struct Harness {
        carts: Arc<CartStore>,
        gateway: Arc<ScriptedGateway>,
        orders: Arc<MemoryOrders>,
        audit: InMemoryAuditSink,
        orchestrator: CheckoutOrchestrator,
    }

    fn harness(gateway: ScriptedGateway, orders: MemoryOrders) -> Harness {
        let catalog =
            Arc::new(CatalogStore::new(Arc::new(StaticCatalogSource::new(fixtures::records()))));
        let carts = Arc::new(CartStore::new(catalog.clone()));
        let gateway = Arc::new(gateway);
        let orders = Arc::new(orders);
        let audit = InMemoryAuditSink::default();
        let orchestrator = CheckoutOrchestrator::new(
            catalog,
            carts.clone(),
            Arc::new(DeterministicPricingEngine),
            gateway.clone(),
            orders.clone(),
            Arc::new(audit.clone()),
            CheckoutSettings::default(),
        );
        Harness { carts, gateway, orders, audit, orchestrator }
    }

    fn session() -> SessionId {
        SessionId::new("s-checkout")
    }

    fn delivery_customer() -> CustomerDetails {
        CustomerDetails {
            name: "Asha".to_string(),
            address: "12 MG Road, Bengaluru".to_string(),
            phone: "+919800000001".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_cart_never_reaches_the_gateway() {
        let h = harness(ScriptedGateway::capturing(), MemoryOrders::default());

        let error = h
            .orchestrator
            .checkout(CheckoutRequest::new(session(), "upi").with_upi_id("asha@okbank"))
            .await
            .expect_err("empty cart");

        assert_eq!(error, OrderError::EmptyCart);
        assert_eq!(h.gateway.call_count(), 0);
        assert!(h.audit.event_types().contains(&"checkout.transition_applied".to_string()));
    }

    #[tokio::test]
    async fn captured_upi_payment_persists_and_clears_cart() {
        let h = harness(ScriptedGateway::capturing(), MemoryOrders::default());
        h.carts.add(&session(), "Margherita with Extra Cheese", 2).await.expect("seed cart");

        let outcome = h
            .orchestrator
            .checkout(CheckoutRequest::new(session(), "UPI").with_upi_id("asha@okbank"))
            .await
            .expect("checkout succeeds");

        assert_eq!(outcome.order.payment_status, PaymentStatus::Paid);
        assert_eq!(outcome.order.payment_reference.as_deref(), Some("pay_test_1"));
        assert_eq!(outcome.order.lines.len(), 2);
        assert!(outcome.message.contains("₹696.00"));
        assert!(outcome.message.contains("30-45 mins"));
        assert_eq!(h.orders.count(), 1);
        assert!(h.carts.view(&session()).is_empty());

        let request = h.gateway.last_request.lock().expect("request lock").clone();
        assert_eq!(request.map(|request| request.amount_minor), Some(69_600));
    }

    #[tokio::test]
    async fn cash_on_delivery_skips_the_gateway() {
        let h = harness(ScriptedGateway::capturing(), MemoryOrders::default());
        h.carts.add(&session(), "farmhouse", 1).await.expect("seed cart");

        let outcome = h
            .orchestrator
            .checkout(CheckoutRequest::new(session(), "cod").with_customer(delivery_customer()))
            .await
            .expect("cod succeeds");

        assert_eq!(outcome.order.payment_method, PaymentMethod::CashOnDelivery);
        assert_eq!(outcome.order.payment_status, PaymentStatus::Pending);
        assert!(outcome.message.starts_with("COD confirmed!"));
        assert_eq!(h.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn declined_payment_keeps_the_cart_and_reason() {
        let gateway =
            ScriptedGateway::new(Ok(ChargeReceipt::failed("pay_9", "insufficient funds")));
        let h = harness(gateway, MemoryOrders::default());
        h.carts.add(&session(), "margherita", 1).await.expect("seed cart");

        let error = h
            .orchestrator
            .checkout(CheckoutRequest::new(session(), "upi").with_upi_id("asha@okbank"))
            .await
            .expect_err("declined");

        assert!(matches!(
            error,
            OrderError::PaymentFailed { ref reason, .. } if reason == "insufficient funds"
        ));
        assert_eq!(h.orders.count(), 0);
        assert_eq!(h.carts.view(&session()).lines.len(), 1);
    }

    #[tokio::test]
    async fn pending_payment_creates_no_order() {
        let h = harness(
            ScriptedGateway::new(Ok(ChargeReceipt::pending("order_77"))),
            MemoryOrders::default(),
        );
        h.carts.add(&session(), "margherita", 1).await.expect("seed cart");

        let error = h
            .orchestrator
            .checkout(CheckoutRequest::new(session(), "upi").with_upi_id("asha@okbank"))
            .await
            .expect_err("pending");

        assert_eq!(
            error,
            OrderError::PaymentPending { external_reference: "order_77".to_string() }
        );
        assert_eq!(h.orders.count(), 0);
        assert!(!h.carts.view(&session()).is_empty());
    }

    #[tokio::test]
    async fn gateway_errors_surface_as_payment_failed() {
        let reset = PaymentGatewayError::Transport("connection reset".to_string());
        let h = harness(ScriptedGateway::new(Err(reset)), MemoryOrders::default());
        h.carts.add(&session(), "margherita", 1).await.expect("seed cart");

        let error = h
            .orchestrator
            .checkout(CheckoutRequest::new(session(), "upi").with_upi_id("asha@okbank"))
            .await
            .expect_err("transport failure");

        assert!(error.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn storage_failure_after_capture_keeps_cart() {
        let h = harness(ScriptedGateway::capturing(), MemoryOrders::failing());
        h.carts.add(&session(), "margherita", 1).await.expect("seed cart");

        let error = h
            .orchestrator
            .checkout(CheckoutRequest::new(session(), "upi").with_upi_id("asha@okbank"))
            .await
            .expect_err("storage fails");

        assert!(matches!(
            error,
            OrderError::Storage { ref external_reference, .. }
                if external_reference.as_deref() == Some("pay_test_1")
        ));
        assert_eq!(h.carts.view(&session()).lines.len(), 1);
        assert!(h.audit.event_types().contains(&"order.persist_failed".to_string()));
    }

    #[tokio::test]
    async fn timeout_fails_without_touching_the_cart() {
        let gateway = ScriptedGateway::capturing().slow(Duration::from_secs(5));
        let h = harness(gateway, MemoryOrders::default());
        h.carts.add(&session(), "margherita", 1).await.expect("seed cart");

        let error = h
            .orchestrator
            .checkout(
                CheckoutRequest::new(session(), "upi")
                    .with_upi_id("asha@okbank")
                    .with_timeout(Duration::from_millis(20)),
            )
            .await
            .expect_err("times out");

        assert!(matches!(
            error,
            OrderError::PaymentFailed { ref reason, .. } if reason.contains("timed out")
        ));
        assert_eq!(h.orders.count(), 0);
        assert_eq!(h.carts.view(&session()).lines.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_fails_the_attempt() {
        let gateway = ScriptedGateway::capturing().slow(Duration::from_secs(5));
        let h = harness(gateway, MemoryOrders::default());
        h.carts.add(&session(), "margherita", 1).await.expect("seed cart");

        let error = h
            .orchestrator
            .checkout_until(
                CheckoutRequest::new(session(), "upi").with_upi_id("asha@okbank"),
                tokio::time::sleep(Duration::from_millis(10)),
            )
            .await
            .expect_err("cancelled");

        assert!(matches!(error, OrderError::PaymentFailed { .. }));
        assert_eq!(h.carts.view(&session()).lines.len(), 1);
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected_before_payment() {
        let h = harness(ScriptedGateway::capturing(), MemoryOrders::default());
        h.carts.add(&session(), "margherita", 1).await.expect("seed cart");

        let error = h
            .orchestrator
            .checkout(CheckoutRequest::new(session(), "bitcoin"))
            .await
            .expect_err("unsupported");

        assert!(matches!(error, OrderError::InvalidPaymentMethod { .. }));
        assert_eq!(h.gateway.call_count(), 0);
    }

    #[test]
    fn payee_rules_per_method() {
        let upi = |id: &str| PayeeDetails { upi_id: Some(id.to_string()) };
        let customer = CustomerDetails::default();

        assert!(validate_payee(PaymentMethod::Upi, &upi("asha.k@okicici"), &customer).is_ok());
        assert!(validate_payee(PaymentMethod::Upi, &upi("asha"), &customer).is_err());
        assert!(validate_payee(PaymentMethod::Upi, &PayeeDetails::default(), &customer).is_err());
        assert!(validate_payee(PaymentMethod::CashOnDelivery, &PayeeDetails::default(), &customer)
            .is_err());
        assert!(validate_payee(
            PaymentMethod::CashOnDelivery,
            &PayeeDetails::default(),
            &delivery_customer()
        )
        .is_ok());
    }
}
