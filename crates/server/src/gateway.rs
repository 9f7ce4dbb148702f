use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use pizzabot_core::checkout::ports::{PaymentGateway, PaymentGatewayError};
use pizzabot_core::config::{PaymentConfig, PaymentProvider};
use pizzabot_core::domain::payment::{ChargeReceipt, ChargeRequest, ChargeStatus};

pub fn from_config(
    config: &PaymentConfig,
) -> Result<Box<dyn PaymentGateway>, PaymentGatewayError> {
    match config.provider {
        PaymentProvider::Sandbox => Ok(Box::new(SandboxPaymentGateway)),
        PaymentProvider::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                PaymentGatewayError::Protocol("payment.endpoint is not configured".to_string())
            })?;
            let api_key = config.api_key.clone().ok_or_else(|| {
                PaymentGatewayError::Protocol("payment.api_key is not configured".to_string())
            })?;
            Ok(Box::new(HttpPaymentGateway::new(
                endpoint,
                api_key,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}

/// Captures every UPI charge. Payer ids ending in `@decline` are declined
/// so failure paths can be exercised by hand.
#[derive(Clone, Copy, Debug, Default)]
pub struct SandboxPaymentGateway;

#[async_trait]
impl PaymentGateway for SandboxPaymentGateway {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, PaymentGatewayError> {
        let reference = format!("sandbox_{}", request.attempt_id);
        let payer = request.payee.upi_id.as_deref().unwrap_or_default();

        info!(
            event_name = "payment.sandbox_charge",
            session_id = %request.session_id,
            amount_minor = request.amount_minor,
            currency = %request.currency,
            "sandbox charge requested"
        );

        if payer.ends_with("@decline") {
            return Ok(ChargeReceipt::failed(reference, "declined by sandbox"));
        }
        Ok(ChargeReceipt::captured(reference))
    }
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    status: String,
    reference: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Posts charges as JSON to a payment provider endpoint.
pub struct HttpPaymentGateway {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl HttpPaymentGateway {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, PaymentGatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| PaymentGatewayError::Transport(error.to_string()))?;
        Ok(Self { client, endpoint: endpoint.into(), api_key })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, PaymentGatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .header("Idempotency-Key", &request.attempt_id)
            .json(&request)
            .send()
            .await
            .map_err(|error| PaymentGatewayError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_client_error() && status != StatusCode::PAYMENT_REQUIRED {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "payment.http_rejected",
                status = %status,
                "provider rejected charge"
            );
            return Err(PaymentGatewayError::Rejected(format!("{status}: {body}")));
        }
        if !status.is_success() && status != StatusCode::PAYMENT_REQUIRED {
            return Err(PaymentGatewayError::Transport(format!("provider returned {status}")));
        }

        let payload: ChargeResponse = response.json().await.map_err(|error| {
            PaymentGatewayError::Protocol(format!("failed to decode charge response: {error}"))
        })?;
        receipt_from_response(payload)
    }
}

fn receipt_from_response(payload: ChargeResponse) -> Result<ChargeReceipt, PaymentGatewayError> {
    let status = match payload.status.trim().to_ascii_lowercase().as_str() {
        "captured" | "success" | "paid" => ChargeStatus::Captured,
        "pending" | "processing" => ChargeStatus::Pending,
        "failed" | "declined" => ChargeStatus::Failed,
        other => {
            return Err(PaymentGatewayError::Protocol(format!("unknown charge status `{other}`")))
        }
    };
    if payload.reference.trim().is_empty() {
        return Err(PaymentGatewayError::Protocol("charge response has no reference".to_string()));
    }

    Ok(match status {
        ChargeStatus::Captured => ChargeReceipt::captured(payload.reference),
        ChargeStatus::Pending => ChargeReceipt::pending(payload.reference),
        ChargeStatus::Failed => ChargeReceipt::failed(
            payload.reference,
            payload.reason.unwrap_or_else(|| "declined by provider".to_string()),
        ),
    })
}

#[cfg(test)]
mod tests {
    use pizzabot_core::checkout::ports::{PaymentGateway, PaymentGatewayError};
    use pizzabot_core::config::{PaymentConfig, PaymentProvider};
    use pizzabot_core::domain::payment::{
        ChargeRequest, ChargeStatus, PayeeDetails, PaymentMethod,
    };
    use pizzabot_core::domain::session::SessionId;

    use super::{from_config, receipt_from_response, ChargeResponse, SandboxPaymentGateway};

    fn request(upi_id: &str) -> ChargeRequest {
        ChargeRequest {
            attempt_id: "att-1".to_string(),
            session_id: SessionId::new("s-1"),
            amount_minor: 29_900,
            currency: "INR".to_string(),
            method: PaymentMethod::Upi,
            payee: PayeeDetails { upi_id: Some(upi_id.to_string()) },
        }
    }

    #[tokio::test]
    async fn sandbox_captures_and_declines_on_marker() {
        let gateway = SandboxPaymentGateway;
        let captured = gateway.charge(request("asha@okbank")).await.expect("charge");
        assert_eq!(captured.status, ChargeStatus::Captured);
        assert_eq!(captured.external_reference, "sandbox_att-1");

        let declined = gateway.charge(request("asha@decline")).await.expect("charge");
        assert_eq!(declined.status, ChargeStatus::Failed);
    }

    #[test]
    fn provider_statuses_map_onto_receipts() {
        let pending = receipt_from_response(ChargeResponse {
            status: "PROCESSING".to_string(),
            reference: "pay_1".to_string(),
            reason: None,
        })
        .expect("known status");
        assert_eq!(pending.status, ChargeStatus::Pending);

        let unknown = receipt_from_response(ChargeResponse {
            status: "refunded".to_string(),
            reference: "pay_1".to_string(),
            reason: None,
        });
        assert!(matches!(unknown, Err(PaymentGatewayError::Protocol(_))));
    }

    #[test]
    fn http_provider_requires_endpoint() {
        let config = PaymentConfig {
            provider: PaymentProvider::Http,
            endpoint: None,
            api_key: None,
            timeout_secs: 5,
        };
        assert!(from_config(&config).is_err());
    }
}
