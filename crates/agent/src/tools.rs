use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use pizzabot_core::domain::order::CustomerDetails;
use pizzabot_core::domain::product::Category;
use pizzabot_core::errors::{ErrorSeverity, OrderError};

pub const TOOL_NAMES: &[&str] = &[
    "add_to_cart",
    "remove_from_cart",
    "view_cart",
    "get_total",
    "search_catalog",
    "list_by_category",
    "checkout",
    "order_status",
];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
        }
    }
}

fn default_quantity() -> i64 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddToCartArgs {
    pub phrase: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveFromCartArgs {
    pub item_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCatalogArgs {
    pub query: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListByCategoryArgs {
    pub category: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutArgs {
    pub method: String,
    #[serde(default)]
    pub upi_id: Option<String>,
    #[serde(default)]
    pub customer: CustomerDetails,
}

/// One inbound operation, as an agent requests it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    AddToCart(AddToCartArgs),
    RemoveFromCart(RemoveFromCartArgs),
    ViewCart,
    GetTotal,
    SearchCatalog(SearchCatalogArgs),
    ListByCategory(ListByCategoryArgs),
    Checkout(CheckoutArgs),
    OrderStatus,
}

impl ToolCall {
    /// Builds a call from a tool name and its JSON arguments. Missing or
    /// `null` arguments are treated as an empty object.
    pub fn from_json(name: &str, arguments: Value) -> Result<Self, ToolError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let call = match name.trim() {
            "add_to_cart" => Self::AddToCart(decode(name, arguments)?),
            "remove_from_cart" => Self::RemoveFromCart(decode(name, arguments)?),
            "view_cart" => Self::ViewCart,
            "get_total" => Self::GetTotal,
            "search_catalog" => Self::SearchCatalog(decode(name, arguments)?),
            "list_by_category" => {
                let args: ListByCategoryArgs = decode(name, arguments)?;
                if Category::parse_label(&args.category).is_none() {
                    return Err(ToolError::InvalidArguments {
                        tool: name.to_string(),
                        reason: format!(
                            "unknown category `{}` (expected pizza|topping|customization|other)",
                            args.category.trim()
                        ),
                    });
                }
                Self::ListByCategory(args)
            }
            "checkout" => Self::Checkout(decode(name, arguments)?),
            "order_status" => Self::OrderStatus,
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddToCart(_) => "add_to_cart",
            Self::RemoveFromCart(_) => "remove_from_cart",
            Self::ViewCart => "view_cart",
            Self::GetTotal => "get_total",
            Self::SearchCatalog(_) => "search_catalog",
            Self::ListByCategory(_) => "list_by_category",
            Self::Checkout(_) => "checkout",
            Self::OrderStatus => "order_status",
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::AddToCart(_) | Self::RemoveFromCart(_) | Self::Checkout(_))
    }
}

impl ListByCategoryArgs {
    pub fn category(&self) -> Category {
        Category::from_label(&self.category)
    }
}

fn decode<T: for<'de> Deserialize<'de>>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::InvalidArguments { tool: tool.to_string(), reason: e.to_string() })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// Result of a tool call: a message for the caller to read out, plus a
/// status and code for the agent to branch on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub status: ToolStatus,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ToolResponse {
    pub fn ok(code: &str, message: impl Into<String>, data: Value) -> Self {
        Self {
            status: ToolStatus::Ok,
            code: code.to_string(),
            message: message.into(),
            data,
            correlation_id: None,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            code: code.to_string(),
            message: message.into(),
            data: Value::Null,
            correlation_id: None,
        }
    }

    /// Input and retryable errors keep their detail so the agent can repair
    /// the request; critical errors only expose the user-safe message.
    pub fn from_order_error(error: OrderError, correlation_id: impl Into<String>) -> Self {
        let code = error.code();
        let external_reference = match &error {
            OrderError::PaymentFailed { external_reference, .. }
            | OrderError::Storage { external_reference, .. } => external_reference.clone(),
            OrderError::PaymentPending { external_reference } => Some(external_reference.clone()),
            _ => None,
        };
        let message = match error.severity() {
            ErrorSeverity::UserInput | ErrorSeverity::Retryable => error.to_string(),
            ErrorSeverity::Critical => error.into_interface("").user_message().to_string(),
        };

        let mut response = Self::error(code, message);
        if let Some(reference) = external_reference {
            response.data = json!({ "external_reference": reference });
        }
        response.correlation_id = Some(correlation_id.into());
        response
    }

    pub fn from_tool_error(error: &ToolError) -> Self {
        Self::error(error.code(), error.to_string())
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }
}

/// Function-calling schema for one tool.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "add_to_cart",
            description: "Add a pizza, optionally with toppings or customizations \
                          (\"Margherita with Extra Cheese and Jalapeno\"), or a side item.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "phrase": {
                        "type": "string",
                        "description": "Item phrase as the customer said it"
                    },
                    "quantity": { "type": "integer", "minimum": 1, "default": 1 }
                },
                "required": ["phrase"]
            }),
        },
        ToolDefinition {
            name: "remove_from_cart",
            description: "Remove an item line from the cart entirely.",
            parameters: json!({
                "type": "object",
                "properties": { "item_name": { "type": "string" } },
                "required": ["item_name"]
            }),
        },
        ToolDefinition {
            name: "view_cart",
            description: "Read back the items currently in the cart.",
            parameters: no_arguments(),
        },
        ToolDefinition {
            name: "get_total",
            description: "Compute the cart total from current menu prices.",
            parameters: no_arguments(),
        },
        ToolDefinition {
            name: "search_catalog",
            description: "Find menu items by name or description, tolerating misspellings.",
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "list_by_category",
            description: "List menu items in one category with prices.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "enum": ["pizza", "topping", "customization", "other"]
                    }
                },
                "required": ["category"]
            }),
        },
        ToolDefinition {
            name: "checkout",
            description: "Place the order. UPI needs a UPI id; cash on delivery needs \
                          the customer's address and phone.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "method": { "type": "string", "enum": ["upi", "cod"] },
                    "upi_id": { "type": "string" },
                    "customer": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "address": { "type": "string" },
                            "phone": { "type": "string" }
                        }
                    }
                },
                "required": ["method"]
            }),
        },
        ToolDefinition {
            name: "order_status",
            description: "Report this caller's orders with payment and delivery status.",
            parameters: no_arguments(),
        },
    ]
}
