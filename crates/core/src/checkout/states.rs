use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Idle,
    Validating,
    AwaitingPayment,
    Finalized,
    Failed,
}

impl CheckoutState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::{AwaitingPayment, Failed, Finalized, Idle, Validating};

        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, AwaitingPayment)
                | (Validating, Finalized)
                | (Validating, Failed)
                | (AwaitingPayment, Finalized)
                | (AwaitingPayment, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid checkout transition from {from:?} to {to:?}")]
pub struct CheckoutTransitionError {
    pub from: CheckoutState,
    pub to: CheckoutState,
}

/// One checkout attempt's position in the state graph. Every transition,
/// accepted or rejected, is written to the audit sink.
pub struct CheckoutAttempt<'a> {
    state: CheckoutState,
    sink: &'a dyn AuditSink,
    audit: &'a AuditContext,
}

impl<'a> CheckoutAttempt<'a> {
    pub fn new(sink: &'a dyn AuditSink, audit: &'a AuditContext) -> Self {
        Self { state: CheckoutState::Idle, sink, audit }
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn advance(&mut self, next: CheckoutState) -> Result<(), CheckoutTransitionError> {
        let from = self.state;
        if !from.can_transition_to(next) {
            self.sink.emit(
                self.audit
                    .event(
                        "checkout.transition_rejected",
                        AuditCategory::Checkout,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("from", from.as_str())
                    .with_metadata("to", next.as_str()),
            );
            return Err(CheckoutTransitionError { from, to: next });
        }

        self.state = next;
        let outcome = match next {
            CheckoutState::Failed => AuditOutcome::Failed,
            _ => AuditOutcome::Success,
        };
        self.sink.emit(
            self.audit
                .event("checkout.transition_applied", AuditCategory::Checkout, outcome)
                .with_metadata("from", from.as_str())
                .with_metadata("to", next.as_str()),
        );
        Ok(())
    }

    /// Moves to `Failed` recording the reason; a no-op once terminal.
    pub fn fail(&mut self, reason: &str) {
        if self.state.is_terminal() {
            return;
        }
        let from = self.state;
        self.state = CheckoutState::Failed;
        self.sink.emit(
            self.audit
                .event("checkout.transition_applied", AuditCategory::Checkout, AuditOutcome::Failed)
                .with_metadata("from", from.as_str())
                .with_metadata("to", CheckoutState::Failed.as_str())
                .with_metadata("reason", reason),
        );
    }
}
