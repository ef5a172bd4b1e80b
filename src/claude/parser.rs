//! NDJSON line parser for Claude's stream output.

use super::events::*;
use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Parse a single line of NDJSON into an event.
///
/// Blank lines yield `Ok(None)`; anything that is not JSON is an error.
pub fn parse_line(line: &str) -> Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)?;
    Ok(Some(parse_value(value)))
}

/// Classify an already-decoded JSON document.
///
/// Never fails: shapes that do not fit a known variant become
/// [`Event::Unrecognized`] so the caller can still show them.
pub fn parse_value(value: Value) -> Event {
    let raw = match RawEvent::deserialize(&value) {
        Ok(raw) => raw,
        Err(_) => return unrecognized(value),
    };

    match raw.event_type.as_deref() {
        Some("system") if raw.subtype.as_deref() == Some("init") => Event::SystemInit {
            session_id: raw.session_id.unwrap_or_else(|| "unknown".to_string()),
            model: raw.model.unwrap_or_else(|| "unknown".to_string()),
        },
        Some("assistant") => match raw.message {
            Some(message) => Event::Assistant(parse_content(message.content)),
            None => Event::Empty,
        },
        Some("user") => match raw.message {
            Some(message) => Event::User(parse_content(message.content)),
            None => Event::Empty,
        },
        Some("result") => Event::Result(FinalResult {
            is_error: raw.is_error.unwrap_or(false),
            result: text_of(raw.result),
            error_code: text_of(raw.error_code),
            duration_ms: raw.duration_ms,
            total_cost_usd: raw.total_cost_usd,
            tokens_used: raw.tokens_used,
        }),
        _ => unrecognized(value),
    }
}

fn unrecognized(raw: Value) -> Event {
    let type_tag = match (
        raw.get("type").and_then(Value::as_str),
        raw.get("subtype").and_then(Value::as_str),
    ) {
        (Some("system"), Some(subtype)) => format!("system:{}", subtype),
        (Some(t), _) => t.to_string(),
        (None, _) => "unknown".to_string(),
    };
    Event::Unrecognized { type_tag, raw }
}

fn parse_content(content: Option<Value>) -> Vec<ContentItem> {
    match content {
        Some(Value::Array(blocks)) => blocks.into_iter().map(parse_content_block).collect(),
        Some(Value::String(text)) => vec![ContentItem::Text { text }],
        _ => Vec::new(),
    }
}

fn parse_content_block(value: Value) -> ContentItem {
    let block = match RawContentBlock::deserialize(&value) {
        Ok(block) => block,
        Err(_) => {
            return ContentItem::Other {
                type_tag: type_tag_of(&value),
            }
        }
    };

    match block.block_type.as_deref() {
        Some("text") => ContentItem::Text {
            text: block.text.unwrap_or_default(),
        },
        Some("tool_use") => ContentItem::ToolUse {
            id: block.id.unwrap_or_default(),
            name: block.name.unwrap_or_default(),
            input: match block.input {
                Some(Value::Object(input)) => input,
                _ => Map::new(),
            },
        },
        Some("tool_result") => ContentItem::ToolResult(parse_tool_result(block)),
        other => ContentItem::Other {
            type_tag: other.unwrap_or("unknown").to_string(),
        },
    }
}

fn parse_tool_result(block: RawContentBlock) -> ToolResult {
    let items: Vec<ResultItem> = match block.content {
        Some(Value::Array(items)) => items.into_iter().map(parse_result_item).collect(),
        Some(Value::String(text)) => vec![ResultItem::Text { text }],
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![ResultItem::Json(other)],
    };
    let is_error = block.is_error.unwrap_or(false);

    // Claude Code reports tool failures in `content`; an explicit `error` wins.
    let error_message = text_of(block.error).or_else(|| {
        if !is_error {
            return None;
        }
        let text = items
            .iter()
            .filter_map(|item| match item {
                ResultItem::Text { text } => Some(text.trim()),
                _ => None,
            })
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        (!text.is_empty()).then_some(text)
    });

    ToolResult {
        tool_use_id: block.tool_use_id,
        is_error,
        error_message,
        error_details: text_of(block.error_details),
        items,
    }
}

fn parse_result_item(value: Value) -> ResultItem {
    let type_tag = type_tag_of(&value);
    match type_tag.as_str() {
        "text" => ResultItem::Text {
            text: value
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        "image" => ResultItem::Image,
        "document" => ResultItem::Document {
            name: value.get("name").and_then(Value::as_str).map(String::from),
        },
        _ => ResultItem::Other {
            type_tag,
            raw: value,
        },
    }
}

fn type_tag_of(value: &Value) -> String {
    value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// Flatten an optional JSON value to display text, dropping `null` and `""`.
fn text_of(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
