pub mod delivery;
pub mod orchestrator;
pub mod ports;
pub mod states;

pub use delivery::DeliveryTracker;
pub use orchestrator::{
    CheckoutOrchestrator, CheckoutOutcome, CheckoutRequest, CheckoutSettings, DeliveryEstimate,
};
pub use ports::{OrderStore, PaymentGateway, PaymentGatewayError};
pub use states::{CheckoutAttempt, CheckoutState, CheckoutTransitionError};
