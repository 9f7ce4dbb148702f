//! Tool surface for the voice agent.
//!
//! The agent never prices or persists anything itself. It
//! picks a tool, and this crate turns the call into a typed [`ToolCall`],
//! applies the [`GuardrailPolicy`], and dispatches onto the ordering
//! service, returning a [`ToolResponse`] the agent can read out.

pub mod guardrails;
pub mod runtime;
pub mod tools;

pub use guardrails::{GuardrailDecision, GuardrailPolicy};
pub use runtime::AgentRuntime;
pub use tools::{tool_definitions, ToolCall, ToolDefinition, ToolError, ToolResponse, ToolStatus};
