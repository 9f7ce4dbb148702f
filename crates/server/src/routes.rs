use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use pizzabot_agent::{
    tool_definitions, AgentRuntime, ToolCall, ToolDefinition, ToolError, ToolResponse,
};
use pizzabot_core::cart::CartView;
use pizzabot_core::domain::session::SessionId;
use pizzabot_core::errors::{InterfaceError, OrderError};
use pizzabot_core::service::{CartTotal, MenuListing};

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/{tool}", post(call_tool))
        .route("/sessions/{session_id}/cart", get(session_cart))
        .route("/menu", get(menu))
        .with_state(ApiState { runtime })
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: &'static str,
    pub correlation_id: String,
}

/// Wraps interface errors so handlers can return them with `?`.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl From<OrderError> for ApiError {
    fn from(error: OrderError) -> Self {
        Self(error.into_interface(Uuid::new_v4().to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            InterfaceError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        warn!(
            event_name = "api.request_failed",
            correlation_id = %self.0.correlation_id(),
            code,
            error = %self.0,
            "request failed"
        );

        let body = ApiErrorBody {
            error: self.0.user_message().to_string(),
            code,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Body of `POST /tools/{tool}`. Either `session_id` or `caller_id` names
/// the session; a caller id is hashed into a stable session id.
#[derive(Debug, Default, Deserialize)]
pub struct ToolRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub caller_id: Option<String>,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolRequest {
    fn session(&self) -> Option<SessionId> {
        let non_blank = |value: &Option<String>| {
            value.as_deref().map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
        };
        non_blank(&self.session_id)
            .map(SessionId::new)
            .or_else(|| non_blank(&self.caller_id).map(|caller| SessionId::from_caller(&caller)))
    }
}

async fn list_tools() -> Json<Vec<ToolDefinition>> {
    Json(tool_definitions())
}

async fn call_tool(
    State(state): State<ApiState>,
    Path(tool): Path<String>,
    Json(request): Json<ToolRequest>,
) -> (StatusCode, Json<ToolResponse>) {
    let Some(session_id) = request.session() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ToolResponse::error("missing_session", "session_id or caller_id is required")),
        );
    };

    let call = match ToolCall::from_json(&tool, request.arguments) {
        Ok(call) => call,
        Err(error) => {
            let status = match error {
                ToolError::UnknownTool(_) => StatusCode::NOT_FOUND,
                ToolError::InvalidArguments { .. } => StatusCode::BAD_REQUEST,
            };
            return (status, Json(ToolResponse::from_tool_error(&error)));
        }
    };

    // domain outcomes, including errors, are read out by the agent
    (StatusCode::OK, Json(state.runtime.dispatch(&session_id, call).await))
}

#[derive(Debug, Serialize)]
pub struct SessionCart {
    pub session_id: SessionId,
    pub cart: CartView,
    pub total: CartTotal,
}

async fn session_cart(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionCart>, ApiError> {
    let session_id = SessionId::new(session_id);
    let service = state.runtime.service();
    let total = service.total(&session_id)?;
    let cart = service.view_cart(&session_id);
    Ok(Json(SessionCart { session_id, cart, total }))
}

async fn menu(State(state): State<ApiState>) -> Result<Json<MenuListing>, ApiError> {
    Ok(Json(state.runtime.service().menu()?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use pizzabot_agent::{AgentRuntime, GuardrailPolicy};
    use pizzabot_core::audit::InMemoryAuditSink;
    use pizzabot_core::catalog::source::{CatalogRecord, StaticCatalogSource};
    use pizzabot_core::catalog::CatalogStore;
    use pizzabot_core::checkout::CheckoutSettings;
    use pizzabot_core::service::OrderingService;
    use pizzabot_db::InMemoryOrderStore;

    use super::router;
    use crate::gateway::SandboxPaymentGateway;

    fn app(records: Vec<CatalogRecord>) -> axum::Router {
        let service = OrderingService::new(
            Arc::new(CatalogStore::new(Arc::new(StaticCatalogSource::new(records)))),
            Arc::new(SandboxPaymentGateway),
            Arc::new(InMemoryOrderStore::default()),
            Arc::new(InMemoryAuditSink::default()),
            CheckoutSettings::default(),
        );
        router(Arc::new(AgentRuntime::new(Arc::new(service), GuardrailPolicy::default())))
    }

    fn menu() -> Vec<CatalogRecord> {
        vec![
            CatalogRecord::new("Margherita", Decimal::from(299), "pizza", None),
            CatalogRecord::new("Jalapeno", Decimal::from(39), "topping", None),
        ]
    }

    async fn send(
        app: &axum::Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|body| Body::from(body.to_string())).unwrap_or_else(Body::empty))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn tool_calls_mutate_the_caller_session() {
        let app = app(menu());
        let body = json!({
            "caller_id": "+919800000001",
            "arguments": { "phrase": "margherita with jalapeno", "quantity": 2 }
        });
        let (status, body) = send(&app, "POST", "/tools/add_to_cart", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (_, total) = send(
            &app,
            "POST",
            "/tools/get_total",
            Some(json!({ "caller_id": "+919800000001" })),
        )
        .await;
        assert_eq!(total["message"], "Total: ₹676.00");
    }

    #[tokio::test]
    async fn domain_errors_are_tool_responses_not_http_errors() {
        let app = app(menu());
        let body = json!({
            "session_id": "s-1",
            "arguments": { "method": "upi", "upi_id": "a@bank" }
        });
        let (status, body) = send(&app, "POST", "/tools/checkout", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "empty_cart");
    }

    #[tokio::test]
    async fn malformed_requests_are_rejected() {
        let app = app(menu());
        let (status, body) = send(&app, "POST", "/tools/view_cart", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "missing_session");

        let (status, _) =
            send(&app, "POST", "/tools/order_pasta", Some(json!({ "session_id": "s-1" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn menu_and_tool_listing() {
        let app = app(menu());
        let (status, body) = send(&app, "GET", "/menu", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pizzas"][0]["name"], "Margherita");

        let (_, tools) = send(&app, "GET", "/tools", None).await;
        assert_eq!(tools.as_array().map(Vec::len), Some(8));
    }

    #[tokio::test]
    async fn broken_catalog_maps_to_service_unavailable() {
        let duplicate = vec![
            CatalogRecord::new("Margherita", Decimal::from(299), "pizza", None),
            CatalogRecord::new("margherita", Decimal::from(199), "pizza", None),
        ];
        let app = app(duplicate);
        let (status, body) = send(&app, "GET", "/sessions/s-1/cart", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "service_unavailable");
        assert!(body["correlation_id"].as_str().is_some());
    }
}
