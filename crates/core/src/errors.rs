use thiserror::Error;

use crate::domain::order::DeliveryStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogLoadError {
    #[error("catalog source `{source_name}` is missing: {detail}")]
    Missing { source_name: String, detail: String },
    #[error("catalog source is malformed: {0}")]
    Malformed(String),
    #[error("catalog record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },
    #[error("catalog contains duplicate item `{key}`")]
    DuplicateKey { key: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("`{phrase}` is not a pizza on the menu: {reason}")]
    InvalidBase { phrase: String, reason: String },
    #[error("`{phrase}` cannot be added to a pizza: {reason}")]
    InvalidModifier { phrase: String, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("order `{0}` was not found")]
    NotFound(String),
    #[error("order storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorSeverity {
    UserInput,
    Retryable,
    Critical,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error(transparent)]
    Load(#[from] CatalogLoadError),
    #[error("`{phrase}` is not a pizza on the menu: {reason}")]
    InvalidBase { phrase: String, reason: String },
    #[error("`{phrase}` cannot be added to a pizza: {reason}")]
    InvalidModifier { phrase: String, reason: String },
    #[error("invalid quantity {quantity}: {reason}")]
    InvalidQuantity { quantity: i64, reason: String },
    #[error("`{name}` is not on the menu")]
    UnknownItem { name: String },
    #[error("the cart is empty")]
    EmptyCart,
    #[error("payment method `{method}` is not supported")]
    InvalidPaymentMethod { method: String },
    #[error("invalid payee details: {reason}")]
    InvalidPayeeDetails { reason: String },
    #[error("payment failed: {reason}")]
    PaymentFailed { reason: String, external_reference: Option<String> },
    #[error("payment `{external_reference}` is still pending")]
    PaymentPending { external_reference: String },
    #[error("order could not be saved: {detail}")]
    Storage { detail: String, external_reference: Option<String> },
    #[error("order `{order_id}` was not found")]
    OrderNotFound { order_id: String },
    #[error("delivery status cannot move from {from} to {to}")]
    InvalidDeliveryTransition { from: DeliveryStatus, to: DeliveryStatus },
    #[error("amount {amount} cannot be charged in minor units")]
    AmountOutOfRange { amount: String },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl OrderError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Load(_) => "load_error",
            Self::InvalidBase { .. } => "invalid_base",
            Self::InvalidModifier { .. } => "invalid_modifier",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::UnknownItem { .. } => "unknown_item",
            Self::EmptyCart => "empty_cart",
            Self::InvalidPaymentMethod { .. } => "invalid_payment_method",
            Self::InvalidPayeeDetails { .. } => "invalid_payee_details",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::PaymentPending { .. } => "payment_pending",
            Self::Storage { .. } => "storage_error",
            Self::OrderNotFound { .. } => "order_not_found",
            Self::InvalidDeliveryTransition { .. } => "invalid_delivery_transition",
            Self::AmountOutOfRange { .. } => "amount_out_of_range",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidBase { .. }
            | Self::InvalidModifier { .. }
            | Self::InvalidQuantity { .. }
            | Self::UnknownItem { .. }
            | Self::EmptyCart
            | Self::InvalidPaymentMethod { .. }
            | Self::InvalidPayeeDetails { .. }
            | Self::OrderNotFound { .. }
            | Self::InvalidDeliveryTransition { .. } => ErrorSeverity::UserInput,
            Self::PaymentFailed { .. } | Self::PaymentPending { .. } => ErrorSeverity::Retryable,
            Self::Load(_)
            | Self::Storage { .. }
            | Self::AmountOutOfRange { .. }
            | Self::InvariantViolation(_) => ErrorSeverity::Critical,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self {
            Self::OrderNotFound { .. } => InterfaceError::NotFound { message, correlation_id },
            Self::InvalidDeliveryTransition { .. } | Self::PaymentPending { .. } => {
                InterfaceError::Conflict { message, correlation_id }
            }
            Self::Load(_) | Self::Storage { .. } | Self::PaymentFailed { .. } => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
            Self::AmountOutOfRange { .. } | Self::InvariantViolation(_) => {
                InterfaceError::Internal { message, correlation_id }
            }
            _ => InterfaceError::BadRequest { message, correlation_id },
        }
    }
}

impl From<ParseError> for OrderError {
    fn from(value: ParseError) -> Self {
        match value {
            ParseError::InvalidBase { phrase, reason } => Self::InvalidBase { phrase, reason },
            ParseError::InvalidModifier { phrase, reason } => {
                Self::InvalidModifier { phrase, reason }
            }
        }
    }
}

impl From<StorageError> for OrderError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(order_id) => Self::OrderNotFound { order_id },
            StorageError::Unavailable(detail) => Self::Storage { detail, external_reference: None },
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested order could not be found.",
            Self::Conflict { .. } => "The request conflicts with the current order state.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}
