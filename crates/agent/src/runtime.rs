use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use pizzabot_core::cart::pricing::format_amount;
use pizzabot_core::checkout::CheckoutRequest;
use pizzabot_core::domain::order::Order;
use pizzabot_core::domain::session::SessionId;
use pizzabot_core::errors::OrderError;
use pizzabot_core::service::OrderingService;

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::tools::{CheckoutArgs, ToolCall, ToolResponse};

/// Dispatches typed tool calls for one session onto the ordering service.
pub struct AgentRuntime {
    service: Arc<OrderingService>,
    guardrails: GuardrailPolicy,
    payment_timeout: Option<Duration>,
}

impl AgentRuntime {
    pub fn new(service: Arc<OrderingService>, guardrails: GuardrailPolicy) -> Self {
        Self { service, guardrails, payment_timeout: None }
    }

    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = Some(timeout);
        self
    }

    pub fn service(&self) -> &Arc<OrderingService> {
        &self.service
    }

    pub fn guardrails(&self) -> &GuardrailPolicy {
        &self.guardrails
    }

    pub async fn dispatch(&self, session_id: &SessionId, call: ToolCall) -> ToolResponse {
        let correlation_id = Uuid::new_v4().to_string();
        let tool = call.name();

        let response = match self.guardrails.evaluate(&call) {
            GuardrailDecision::Allow => self.execute(session_id, call, &correlation_id).await,
            GuardrailDecision::Deny { reason_code, user_message, fallback_path }
            | GuardrailDecision::Degrade { reason_code, user_message, fallback_path } => {
                warn!(
                    event_name = "tool.guardrail_blocked",
                    tool,
                    session_id = %session_id,
                    reason_code,
                    fallback_path,
                    "tool call blocked by guardrail"
                );
                let mut response = ToolResponse::error(reason_code, user_message);
                response.data = json!({ "fallback_path": fallback_path });
                response
            }
        };

        info!(
            event_name = "tool.dispatched",
            tool,
            session_id = %session_id,
            correlation_id = %correlation_id,
            status = ?response.status,
            code = %response.code,
            "tool call handled"
        );
        response
    }

    async fn execute(
        &self,
        session_id: &SessionId,
        call: ToolCall,
        correlation_id: &str,
    ) -> ToolResponse {
        let result = match call {
            ToolCall::AddToCart(args) => self
                .service
                .add_to_cart(session_id, &args.phrase, args.quantity)
                .await
                .map(|added| ToolResponse::ok("item_added", added.message(), to_data(&added))),
            ToolCall::RemoveFromCart(args) => {
                self.service.remove_from_cart(session_id, &args.item_name).await.map(|outcome| {
                    ToolResponse::ok("item_removed", outcome.message(), to_data(&outcome))
                })
            }
            ToolCall::ViewCart => {
                let view = self.service.view_cart(session_id);
                Ok(ToolResponse::ok("cart", view.render(), to_data(&view)))
            }
            ToolCall::GetTotal => self
                .service
                .total(session_id)
                .map(|total| ToolResponse::ok("total", total.message(), to_data(&total))),
            ToolCall::SearchCatalog(args) => self.service.search(&args.query).map(|hits| {
                let message = if hits.is_empty() {
                    format!("No menu items match \"{}\".", args.query.trim())
                } else {
                    let names: Vec<&str> = hits.iter().map(|hit| hit.item.name.as_str()).collect();
                    format!("Found: {}.", names.join(", "))
                };
                ToolResponse::ok("search_results", message, to_data(&hits))
            }),
            ToolCall::ListByCategory(args) => {
                let category = args.category();
                self.service.list_by_category(category).map(|items| {
                    let settings = self.service.settings();
                    let entries: Vec<String> = items
                        .iter()
                        .map(|item| {
                            let price = format_amount(
                                item.price,
                                &settings.currency,
                                settings.minor_unit_exponent,
                            );
                            format!("{} ({price})", item.name)
                        })
                        .collect();
                    let message = if entries.is_empty() {
                        format!("Nothing listed under {category}.")
                    } else {
                        entries.join(", ")
                    };
                    ToolResponse::ok("category_listing", message, to_data(&items))
                })
            }
            ToolCall::Checkout(args) => self.checkout(session_id, args, correlation_id).await,
            ToolCall::OrderStatus => {
                self.service.order_history(session_id).await.map(|orders| {
                    let message = self.describe_orders(&orders);
                    ToolResponse::ok("order_status", message, to_data(&orders))
                })
            }
        };

        result.unwrap_or_else(|error| ToolResponse::from_order_error(error, correlation_id))
    }

    async fn checkout(
        &self,
        session_id: &SessionId,
        args: CheckoutArgs,
        correlation_id: &str,
    ) -> Result<ToolResponse, OrderError> {
        let mut request =
            CheckoutRequest::new(session_id.clone(), args.method).with_customer(args.customer);
        request.correlation_id = correlation_id.to_string();
        if let Some(upi_id) = args.upi_id {
            request = request.with_upi_id(upi_id);
        }
        if let Some(timeout) = self.payment_timeout {
            request = request.with_timeout(timeout);
        }

        let outcome = self.service.checkout(request).await?;
        Ok(ToolResponse::ok("order_placed", outcome.message.clone(), to_data(&outcome)))
    }

    fn describe_orders(&self, orders: &[Order]) -> String {
        if orders.is_empty() {
            return "No orders found for this caller.".to_string();
        }

        let settings = self.service.settings();
        orders
            .iter()
            .map(|order| {
                format!(
                    "Order {}: {} via {}, payment {}, delivery {}.",
                    order.id,
                    format_amount(order.total, &order.currency, settings.minor_unit_exponent),
                    order.payment_method.as_str(),
                    order.payment_status.as_str(),
                    order.delivery_status,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn to_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}
