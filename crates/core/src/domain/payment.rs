use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::session::SessionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Upi,
    CashOnDelivery,
}

impl PaymentMethod {
    /// Parses the method name an agent passes; `None` for unsupported methods.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "upi" => Some(Self::Upi),
            "cod" | "cash" | "cash_on_delivery" => Some(Self::CashOnDelivery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upi => "upi",
            Self::CashOnDelivery => "cash_on_delivery",
        }
    }

    /// Whether the method charges through the payment collaborator before
    /// the order is finalized.
    pub fn requires_upfront_charge(&self) -> bool {
        matches!(self, Self::Upi)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeeDetails {
    pub upi_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub attempt_id: String,
    pub session_id: SessionId,
    pub amount_minor: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub payee: PayeeDetails,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Captured,
    Pending,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    pub status: ChargeStatus,
    pub external_reference: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ChargeReceipt {
    pub fn captured(external_reference: impl Into<String>) -> Self {
        Self {
            status: ChargeStatus::Captured,
            external_reference: external_reference.into(),
            reason: None,
        }
    }

    pub fn pending(external_reference: impl Into<String>) -> Self {
        Self {
            status: ChargeStatus::Pending,
            external_reference: external_reference.into(),
            reason: None,
        }
    }

    pub fn failed(external_reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: ChargeStatus::Failed,
            external_reference: external_reference.into(),
            reason: Some(reason.into()),
        }
    }
}
