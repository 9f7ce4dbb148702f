use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::cart::pricing::{format_amount, DeterministicPricingEngine, PricingEngine};
use crate::cart::store::{AddConfirmation, CartStore, CartView, RemoveOutcome};
use crate::catalog::search::{SearchEngine, SearchHit};
use crate::catalog::similarity::{MatchingBlocksRatio, SimilarityMetric};
use crate::catalog::CatalogStore;
use crate::checkout::delivery::DeliveryTracker;
use crate::checkout::orchestrator::{
    CheckoutOrchestrator, CheckoutOutcome, CheckoutRequest, CheckoutSettings,
};
use crate::checkout::ports::{OrderStore, PaymentGateway};
use crate::domain::order::{DeliveryStatus, Order, OrderId};
use crate::domain::product::{CatalogItem, Category, ItemKey};
use crate::domain::session::SessionId;
use crate::errors::OrderError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartTotal {
    pub total: Decimal,
    pub currency: String,
    pub formatted: String,
    pub stale_items: Vec<ItemKey>,
}

impl CartTotal {
    pub fn message(&self) -> String {
        format!("Total: {}", self.formatted)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MenuListing {
    pub pizzas: Vec<CatalogItem>,
    pub customizations: Vec<CatalogItem>,
    pub toppings: Vec<CatalogItem>,
    pub other: Vec<CatalogItem>,
}

impl MenuListing {
    /// "We have 1- Margherita, 2- Farmhouse."
    pub fn pizza_summary(&self) -> String {
        if self.pizzas.is_empty() {
            return "No pizzas available.".to_string();
        }
        let names: Vec<String> = self
            .pizzas
            .iter()
            .enumerate()
            .map(|(position, item)| format!("{}- {}", position + 1, item.name))
            .collect();
        format!("We have {}.", names.join(", "))
    }
}

/// Entry point for every inbound operation on a session.
pub struct OrderingService {
    catalog: Arc<CatalogStore>,
    carts: Arc<CartStore>,
    pricing: Arc<dyn PricingEngine>,
    search: SearchEngine<Box<dyn SimilarityMetric>>,
    checkout: CheckoutOrchestrator,
    orders: Arc<dyn OrderStore>,
    delivery: DeliveryTracker,
    audit: Arc<dyn AuditSink>,
    settings: CheckoutSettings,
}

impl OrderingService {
    pub fn new(
        catalog: Arc<CatalogStore>,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        audit: Arc<dyn AuditSink>,
        settings: CheckoutSettings,
    ) -> Self {
        let carts = Arc::new(CartStore::new(catalog.clone()));
        let pricing: Arc<dyn PricingEngine> = Arc::new(DeterministicPricingEngine);
        let checkout = CheckoutOrchestrator::new(
            catalog.clone(),
            carts.clone(),
            pricing.clone(),
            gateway,
            orders.clone(),
            audit.clone(),
            settings.clone(),
        );

        Self {
            catalog,
            carts,
            pricing,
            search: SearchEngine::new(Box::new(MatchingBlocksRatio)),
            checkout,
            delivery: DeliveryTracker::new(orders.clone(), audit.clone()),
            orders,
            audit,
            settings,
        }
    }

    pub fn with_similarity_metric(mut self, metric: Box<dyn SimilarityMetric>) -> Self {
        self.search = SearchEngine::new(metric);
        self
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    pub async fn add_to_cart(
        &self,
        session_id: &SessionId,
        phrase: &str,
        quantity: i64,
    ) -> Result<AddConfirmation, OrderError> {
        let result = self.carts.add(session_id, phrase, quantity).await;
        let event = self
            .cart_event(session_id, "cart.add", &result)
            .with_metadata("phrase", phrase.trim())
            .with_metadata("quantity", quantity.to_string());
        self.audit.emit(event);
        result
    }

    pub async fn remove_from_cart(
        &self,
        session_id: &SessionId,
        item_name: &str,
    ) -> Result<RemoveOutcome, OrderError> {
        let result = self.carts.remove(session_id, item_name).await;
        let event = self
            .cart_event(session_id, "cart.remove", &result)
            .with_metadata("item", item_name.trim());
        self.audit.emit(event);
        result
    }

    pub fn view_cart(&self, session_id: &SessionId) -> CartView {
        self.carts.view(session_id)
    }

    pub fn total(&self, session_id: &SessionId) -> Result<CartTotal, OrderError> {
        let index = self.catalog.snapshot()?;
        let cart = self.carts.snapshot(session_id);
        let pricing = self.pricing.price(&cart, &index, &self.settings.currency);

        Ok(CartTotal {
            formatted: format_amount(
                pricing.total,
                &pricing.currency,
                self.settings.minor_unit_exponent,
            ),
            total: pricing.total,
            currency: pricing.currency,
            stale_items: pricing.stale_items,
        })
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>, OrderError> {
        let index = self.catalog.snapshot()?;
        Ok(self.search.search(&index, query))
    }

    pub fn list_by_category(&self, category: Category) -> Result<Vec<CatalogItem>, OrderError> {
        let index = self.catalog.snapshot()?;
        Ok(index.items_by_category(category).into_iter().cloned().collect())
    }

    pub fn menu(&self) -> Result<MenuListing, OrderError> {
        let index = self.catalog.snapshot()?;
        let mut listing = MenuListing::default();
        for item in index.items() {
            let bucket = match item.category {
                Category::Pizza => &mut listing.pizzas,
                Category::Customization => &mut listing.customizations,
                Category::Topping => &mut listing.toppings,
                Category::Other => &mut listing.other,
            };
            bucket.push(item.clone());
        }
        Ok(listing)
    }

    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, OrderError> {
        self.checkout.checkout(request).await
    }

    pub async fn checkout_until<C>(
        &self,
        request: CheckoutRequest,
        cancel: C,
    ) -> Result<CheckoutOutcome, OrderError>
    where
        C: Future<Output = ()> + Send,
    {
        self.checkout.checkout_until(request, cancel).await
    }

    pub async fn order_history(&self, session_id: &SessionId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.fetch_orders(session_id).await?)
    }

    pub async fn recent_orders(&self, limit: u32) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_recent(limit).await?)
    }

    /// Moves an order's delivery status forward; regressions are rejected.
    pub async fn update_delivery_status(
        &self,
        order_id: &OrderId,
        status: DeliveryStatus,
    ) -> Result<Order, OrderError> {
        self.delivery.update(order_id, status, "operator").await
    }

    fn cart_event<T>(
        &self,
        session_id: &SessionId,
        event_type: &str,
        result: &Result<T, OrderError>,
    ) -> crate::audit::AuditEvent {
        let context =
            AuditContext::new(Some(session_id.clone()), Uuid::new_v4().to_string(), "cart");
        match result {
            Ok(_) => context.event(event_type, AuditCategory::Cart, AuditOutcome::Success),
            Err(error) => context
                .event(event_type, AuditCategory::Cart, AuditOutcome::Rejected)
                .with_metadata("code", error.code()),
        }
    }
}
