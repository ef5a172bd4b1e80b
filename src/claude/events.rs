//! Event types for Claude's stream-json output.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Parsed event from Claude's NDJSON stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SystemInit { session_id: String, model: String },
    Assistant(Vec<ContentItem>),
    User(Vec<ContentItem>),
    Result(FinalResult),
    /// A known event type that carries nothing worth showing (e.g. no `message`).
    Empty,
    Unrecognized { type_tag: String, raw: Value },
}

/// One element of an assistant or user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text { text: String },
    ToolUse { id: String, name: String, input: Map<String, Value> },
    ToolResult(ToolResult),
    Other { type_tag: String },
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolResult {
    pub tool_use_id: Option<String>,
    pub is_error: bool,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
    pub items: Vec<ResultItem>,
}

/// Item inside a tool result's content.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultItem {
    Text { text: String },
    Image,
    Document { name: Option<String> },
    /// Content that was neither a list of items nor a string.
    Json(Value),
    Other { type_tag: String, raw: Value },
}

/// Final result event from Claude.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FinalResult {
    pub is_error: bool,
    pub result: Option<String>,
    pub error_code: Option<String>,
    pub duration_ms: Option<f64>,
    pub total_cost_usd: Option<f64>,
    pub tokens_used: Option<f64>,
}

/// Raw JSON structures for deserialization.
#[derive(Deserialize)]
pub(crate) struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub subtype: Option<String>,
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub message: Option<RawMessage>,
    pub is_error: Option<bool>,
    pub result: Option<Value>,
    pub error_code: Option<Value>,
    pub duration_ms: Option<f64>,
    pub total_cost_usd: Option<f64>,
    pub tokens_used: Option<f64>,
}

#[derive(Deserialize)]
pub(crate) struct RawMessage {
    pub content: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct RawContentBlock {
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    pub text: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub input: Option<Value>,
    pub tool_use_id: Option<String>,
    pub content: Option<Value>,
    pub is_error: Option<bool>,
    pub error: Option<Value>,
    pub error_details: Option<Value>,
}
