use pizzabot_core::config::CheckoutConfig;

use crate::tools::ToolCall;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    Degrade { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

/// Limits applied to tool calls before they reach the ordering service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub checkout_enabled: bool,
    pub max_quantity_per_add: u32,
    pub max_phrase_chars: usize,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { checkout_enabled: true, max_quantity_per_add: 50, max_phrase_chars: 200 }
    }
}

impl GuardrailPolicy {
    pub fn from_config(config: &CheckoutConfig) -> Self {
        Self {
            checkout_enabled: config.enabled,
            max_quantity_per_add: config.max_quantity_per_add,
            max_phrase_chars: config.max_phrase_chars,
        }
    }

    pub fn evaluate(&self, call: &ToolCall) -> GuardrailDecision {
        match call {
            ToolCall::AddToCart(args) if args.quantity > i64::from(self.max_quantity_per_add) => {
                GuardrailDecision::Deny {
                    reason_code: "quantity_over_limit",
                    user_message: format!(
                        "I can add at most {} of an item at a time.",
                        self.max_quantity_per_add
                    ),
                    fallback_path: "confirm_quantity_with_caller",
                }
            }
            ToolCall::AddToCart(args) if self.phrase_too_long(&args.phrase) => {
                self.deny_long_phrase()
            }
            ToolCall::RemoveFromCart(args) if self.phrase_too_long(&args.item_name) => {
                self.deny_long_phrase()
            }
            ToolCall::SearchCatalog(args) if self.phrase_too_long(&args.query) => {
                self.deny_long_phrase()
            }
            ToolCall::Checkout(_) if !self.checkout_enabled => GuardrailDecision::Degrade {
                reason_code: "checkout_disabled",
                user_message: "We are not taking new orders right now. Your cart has been kept."
                    .to_string(),
                fallback_path: "keep_cart_and_retry_later",
            },
            _ => GuardrailDecision::Allow,
        }
    }

    fn phrase_too_long(&self, phrase: &str) -> bool {
        phrase.chars().count() > self.max_phrase_chars
    }

    fn deny_long_phrase(&self) -> GuardrailDecision {
        GuardrailDecision::Deny {
            reason_code: "phrase_too_long",
            user_message: "That request is too long. Please name one item at a time.".to_string(),
            fallback_path: "ask_for_single_item",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{GuardrailDecision, GuardrailPolicy};
    use crate::tools::ToolCall;

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall::from_json(name, arguments).expect("valid call")
    }

    #[test]
    fn ordinary_calls_are_allowed() {
        let policy = GuardrailPolicy::default();
        let decision =
            policy.evaluate(&call("add_to_cart", json!({ "phrase": "margherita", "quantity": 2 })));
        assert_eq!(decision, GuardrailDecision::Allow);
    }

    #[test]
    fn oversized_quantity_is_denied() {
        let policy = GuardrailPolicy { max_quantity_per_add: 10, ..GuardrailPolicy::default() };
        let args = json!({ "phrase": "margherita", "quantity": 11 });
        let decision = policy.evaluate(&call("add_to_cart", args));

        let GuardrailDecision::Deny { reason_code, user_message, .. } = decision else {
            panic!("expected denial");
        };
        assert_eq!(reason_code, "quantity_over_limit");
        assert!(user_message.contains("at most 10"));
    }

    #[test]
    fn long_phrases_are_denied() {
        let policy = GuardrailPolicy { max_phrase_chars: 8, ..GuardrailPolicy::default() };
        let decision =
            policy.evaluate(&call("search_catalog", json!({ "query": "pepperoni pizza" })));
        assert!(matches!(
            decision,
            GuardrailDecision::Deny { reason_code: "phrase_too_long", .. }
        ));
    }

    #[test]
    fn checkout_kill_switch_degrades() {
        let policy = GuardrailPolicy { checkout_enabled: false, ..GuardrailPolicy::default() };
        let decision = policy.evaluate(&call("checkout", json!({ "method": "upi" })));

        let GuardrailDecision::Degrade { reason_code, fallback_path, .. } = decision else {
            panic!("expected degrade");
        };
        assert_eq!(reason_code, "checkout_disabled");
        assert_eq!(fallback_path, "keep_cart_and_retry_later");
        assert_eq!(policy.evaluate(&ToolCall::ViewCart), GuardrailDecision::Allow);
    }
}
