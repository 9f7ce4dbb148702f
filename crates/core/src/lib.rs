pub mod audit;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod errors;
pub mod service;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use cart::{CartStore, CartView, DeterministicPricingEngine, PricingEngine, PricingResult};
pub use catalog::search::{SearchEngine, SearchHit};
pub use catalog::source::{CatalogRecord, CatalogSource, JsonFileCatalogSource};
pub use catalog::{CatalogIndex, CatalogStatus, CatalogStore};
pub use checkout::{
    CheckoutOrchestrator, CheckoutOutcome, CheckoutRequest, CheckoutSettings, DeliveryEstimate,
    DeliveryTracker, OrderStore, PaymentGateway, PaymentGatewayError,
};
pub use domain::order::{CustomerDetails, DeliveryStatus, Order, OrderId, PaymentStatus};
pub use domain::product::{CatalogItem, Category, ItemKey};
pub use domain::session::SessionId;
pub use errors::{CatalogLoadError, InterfaceError, OrderError, StorageError};
pub use service::{CartTotal, MenuListing, OrderingService};
