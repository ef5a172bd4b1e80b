//! Human-readable rendering of Claude's stream-json events.
//!
//! [`render`] is the whole contract: one JSON line in, `Some(text)` to show
//! or `None` to skip. It is pure and never fails; the console helpers at the
//! bottom of this file are the only place that writes anywhere.

use chrono::Local;
use colored::Colorize;
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::path::Path;

use crate::claude::events::{ContentItem, Event, FinalResult, ResultItem, ToolResult};
use crate::claude::parser;

use super::payload::format_payload;
use super::text::{format_grouped, normalize_tool_name, truncate};

/// Tool-use input key that is never displayed.
pub const SENSITIVE_FIELD: &str = "user_google_email";

/// Budget for a rendered tool-use parameter value.
const PARAM_BUDGET: usize = 80;
/// Budget for raw JSON shown in diagnostic lines.
const RAW_BUDGET: usize = 100;
/// Tool-use ids are shown by prefix only.
const TOOL_ID_PREFIX: usize = 8;

/// Render one line of Claude's NDJSON stream.
///
/// Returns `None` for input that is not JSON and for events with nothing
/// worth showing. `Some("")` is a legitimate (empty) rendering.
pub fn render(line: &str) -> Option<String> {
    match parser::parse_line(line) {
        Ok(Some(event)) => render_event(&event),
        Ok(None) | Err(_) => None,
    }
}

/// Render a whole captured stream.
///
/// Accepts NDJSON, or a single JSON array holding the events (what
/// `--output-format json --verbose` prints).
pub fn render_document(text: &str) -> Vec<String> {
    if text.trim_start().starts_with('[') {
        if let Ok(Value::Array(events)) = serde_json::from_str::<Value>(text) {
            return events
                .into_iter()
                .filter_map(|v| render_event(&parser::parse_value(v)))
                .collect();
        }
    }
    text.lines().filter_map(render).collect()
}

/// Render an already-parsed event.
pub fn render_event(event: &Event) -> Option<String> {
    match event {
        Event::SystemInit { session_id, model } => Some(format!(
            "🔧 System initialized\n   Session: {}\n   Model: {}",
            session_id, model
        )),
        Event::Assistant(items) => Some(render_assistant(items)),
        Event::User(items) => render_user(items),
        Event::Result(result) => Some(render_final_result(result)),
        Event::Empty => None,
        Event::Unrecognized { type_tag, raw } => Some(format!(
            "\n🔍 [{}] {}",
            type_tag,
            truncate(&raw.to_string(), RAW_BUDGET)
        )),
    }
}

fn render_assistant(items: &[ContentItem]) -> String {
    let mut output = String::new();

    for item in items {
        match item {
            ContentItem::Text { text } => {
                if text.contains('\n') {
                    output.push_str("\n💭 Claude:\n");
                    for line in text.split('\n') {
                        output.push_str(&format!("   {}\n", line));
                    }
                } else {
                    output.push_str(&format!("\n💭 Claude: {}\n", text));
                }
            }
            ContentItem::ToolUse { name, input, .. } => {
                output.push_str(&format!("\n🔧 Using tool: {}\n", normalize_tool_name(name)));
                for param in format_parameters(input) {
                    output.push_str(&format!("   → {}\n", param));
                }
            }
            ContentItem::ToolResult(_) | ContentItem::Other { .. } => {}
        }
    }

    output
}

/// `key: value` lines for a tool invocation, minus empty and sensitive fields.
pub fn format_parameters(input: &Map<String, Value>) -> Vec<String> {
    input
        .iter()
        .filter(|(key, value)| {
            key.as_str() != SENSITIVE_FIELD
                && !value.is_null()
                && value.as_str() != Some("")
        })
        .map(|(key, value)| format!("{}: {}", key, format_parameter_value(value)))
        .collect()
}

fn format_parameter_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() > PARAM_BUDGET => {
            format!("\"{}\"", truncate(s, PARAM_BUDGET))
        }
        Value::Array(_) | Value::Object(_) => truncate(&value.to_string(), PARAM_BUDGET),
        other => other.to_string(),
    }
}

fn render_user(items: &[ContentItem]) -> Option<String> {
    let blocks: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            ContentItem::ToolResult(result) => Some(render_tool_result(result)),
            _ => None,
        })
        .collect();

    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n"))
    }
}

/// Render one tool result as an indented block without trailing whitespace.
pub fn render_tool_result(result: &ToolResult) -> String {
    let mut output = String::from("\n📊 Tool Result");
    if let Some(id) = result.tool_use_id.as_deref().filter(|id| !id.is_empty()) {
        let short: String = id.chars().take(TOOL_ID_PREFIX).collect();
        output.push_str(&format!(" [{}]", short));
    }
    output.push_str(":\n");

    if result.is_error {
        output.push_str(&format!(
            "   ❌ Error: {}\n",
            result.error_message.as_deref().unwrap_or("Unknown error")
        ));
        if let Some(details) = &result.error_details {
            output.push_str(&format!("   Details: {}\n", details));
        }
        return output.trim_end().to_string();
    }

    for item in &result.items {
        match item {
            ResultItem::Text { text } => {
                let text = text.trim();
                if !text.is_empty() {
                    output.push_str(&format_payload(text));
                }
            }
            ResultItem::Image => output.push_str("   📷 [Image content]\n"),
            ResultItem::Document { name } => output.push_str(&format!(
                "   📄 [Document: {}]\n",
                name.as_deref().unwrap_or("unnamed")
            )),
            ResultItem::Json(value) => {
                let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
                for line in pretty.lines() {
                    output.push_str(&format!("   {}\n", line));
                }
            }
            ResultItem::Other { type_tag, raw } => output.push_str(&format!(
                "   ℹ️ [{}]: {}\n",
                type_tag,
                truncate(&raw.to_string(), RAW_BUDGET)
            )),
        }
    }

    output.trim_end().to_string()
}

fn render_final_result(result: &FinalResult) -> String {
    if result.is_error {
        let mut output = format!(
            "\n❌ Error: {}",
            result.result.as_deref().unwrap_or("Unknown error")
        );
        if let Some(code) = &result.error_code {
            output.push_str(&format!(" (Code: {})", code));
        }
        return output;
    }

    let mut output = String::from("\n✅ Success");
    if let Some(ms) = result.duration_ms {
        output.push_str(&format!(" ({:.1}s)", tenths_half_up(ms / 1000.0)));
    }
    if let Some(cost) = result.total_cost_usd {
        output.push_str(&format!(" - Cost: ${:.4}", cost));
    }
    if let Some(tokens) = result.tokens_used {
        output.push_str(&format!(" - Tokens: {}", format_grouped(tokens)));
    }
    output
}

/// Round to one decimal with ties away from zero (`1.25` → `1.3`).
fn tenths_half_up(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}

/// Print a rendered event to stdout, stamped with local time.
///
/// Whitespace-only renderings are dropped here; that is a console choice,
/// not something [`render`] decides.
pub fn print_rendered(rendered: &str) {
    let body = rendered.trim_start_matches('\n');
    if body.trim().is_empty() {
        return;
    }

    // One lock per event keeps concurrent runs from interleaving lines.
    let mut out = io::stdout().lock();
    let _ = write_rendered(&mut out, body);
}

/// Write one event block: stamp on the first line, the rest as-is.
fn write_rendered<W: Write>(out: &mut W, body: &str) -> io::Result<()> {
    let stamp = format!("[{}]", Local::now().format("%H:%M:%S"));
    let mut lines = body.lines();
    if let Some(first) = lines.next() {
        writeln!(out, "{} {}", stamp.dimmed(), colorize_line(first))?;
    }
    for line in lines {
        writeln!(out, "{}", colorize_line(line))?;
    }
    out.flush()
}

fn colorize_line(line: &str) -> String {
    let trimmed = line.trim_start();
    if trimmed.starts_with('❌') {
        line.red().to_string()
    } else if trimmed.starts_with('✅') {
        line.green().to_string()
    } else if trimmed.starts_with("🔧") {
        line.cyan().to_string()
    } else if trimmed.starts_with("🔍") {
        line.yellow().to_string()
    } else if trimmed.starts_with('→') {
        line.dimmed().to_string()
    } else {
        line.to_string()
    }
}

/// Print a run header for the `run` command.
pub fn print_run_header(agent: &str, prompt: &str) {
    println!(
        "{} {}",
        format!("▶ {}", agent).bold(),
        truncate(prompt, PARAM_BUDGET).dimmed()
    );
}

/// Print the path of the raw NDJSON log for this run.
pub fn print_log_path(path: &Path) {
    println!("{} {}", "Raw log:".dimmed(), path.display());
}
