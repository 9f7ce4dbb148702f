pub mod pricing;
pub mod store;

pub use pricing::{DeterministicPricingEngine, PricingEngine, PricingResult};
pub use store::{AddConfirmation, CartStore, CartView, RemoveOutcome, SessionGuard};
