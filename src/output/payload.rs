//! Sub-format detection for free-text tool output.
//!
//! Tool results arrive as opaque text. Before showing them we try, in a fixed
//! order, to recognise a structure worth re-laying out:
//!
//! 1. a JSON document (list, object or scalar)
//! 2. a chat transcript (`[MM-DD HH:MM sender] message` lines, `┌─` chat headers)
//! 3. an email or calendar record (`Subject:`, `From:`, `Start:` fields)
//! 4. a file listing (`Name: ..., Type: File|Folder, Size: ...` lines)
//! 5. generic multi-line text
//! 6. a single line
//!
//! The first layout that both matches and produces output wins. A transcript
//! guess with no parseable message falls through to the next layout, so the
//! chain always ends in one of the plain-text renderers.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::text::{format_number, humanize_key, truncate};

/// Budget for one passed-through line of text.
const LINE_BUDGET: usize = 100;
/// Budget for a lone line of output.
const SINGLE_LINE_BUDGET: usize = 200;
/// Budget for a summary field of a list item.
const FIELD_BUDGET: usize = 50;

/// Lists longer than this are elided in the middle.
const MAX_LIST_ITEMS: usize = 10;
const LIST_HEAD: usize = 5;
const LIST_TAIL: usize = 2;

/// Outputs longer than this are elided in the middle.
const MAX_OUTPUT_LINES: usize = 20;
const OUTPUT_HEAD: usize = 10;
const OUTPUT_TAIL: usize = 2;

/// Fields used to summarise an object inside a list, in display order.
const SUMMARY_FIELDS: &[&str] = &["name", "title", "id", "email", "message", "text"];

const EMAIL_MARKERS: &[&str] = &["Subject:", "From:", "Start:"];
const EMAIL_FIELDS: &[&str] = &["Subject:", "From:", "To:", "Start:", "End:", "Location:"];
const EMAIL_LONG_FIELDS: &[&str] = &["Body:", "Description:"];

const CHAT_HEADER: &str = "┌─";
const CHAT_RULE: &str = "───";
const OUTGOING_ARROW: &str = "→";

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[0-9]{2}-[0-9]{2}\s+[0-9]{2}:[0-9]{2}").expect("valid regex"));

static CHAT_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"┌─\s*(.+)").expect("valid regex"));

static MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[│|]?\s*\[([0-9]{2}-[0-9]{2}\s+[0-9]{2}:[0-9]{2})(?:\s+([^\]]+))?\]\s*(.*)")
        .expect("valid regex")
});

static BRACKETED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\s*(.*)").expect("valid regex"));

/// Render one tool-result text payload.
///
/// Never fails; unrecognised input falls through to the plain-text layouts.
pub fn format_payload(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => format_json(&value),
        Err(_) => TextFormat::candidates(text)
            .find_map(|format| format.render(text))
            .unwrap_or_else(|| format_single_line(text)),
    }
}

/// Non-JSON layouts, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Transcript,
    EmailOrCalendar,
    FileListing,
    MultiLine,
    SingleLine,
}

type Detector = fn(&str) -> bool;

const DETECTORS: &[(TextFormat, Detector)] = &[
    (TextFormat::Transcript, looks_like_transcript),
    (TextFormat::EmailOrCalendar, looks_like_email),
    (TextFormat::FileListing, looks_like_file_listing),
    (TextFormat::MultiLine, is_multi_line),
];

impl TextFormat {
    /// Pick the first layout whose detector accepts `text`.
    pub fn detect(text: &str) -> Self {
        Self::candidates(text).next().unwrap_or(TextFormat::SingleLine)
    }

    /// Every layout whose detector accepts `text`, in detection order.
    fn candidates(text: &str) -> impl Iterator<Item = TextFormat> + '_ {
        DETECTORS
            .iter()
            .filter(move |(_, matches)| matches(text))
            .map(|(format, _)| *format)
    }

    /// Lay `text` out in this format; `None` when the text does not fit it.
    pub fn render(self, text: &str) -> Option<String> {
        match self {
            TextFormat::Transcript => format_transcript(text),
            TextFormat::EmailOrCalendar => Some(format_email_or_calendar(text)),
            TextFormat::FileListing => Some(format_file_listing(text)),
            TextFormat::MultiLine => Some(format_multi_line(text)),
            TextFormat::SingleLine => Some(format_single_line(text)),
        }
    }
}

fn looks_like_transcript(text: &str) -> bool {
    (text.contains('[') && TIMESTAMP_RE.is_match(text))
        || text.contains(CHAT_HEADER)
        || text.contains(OUTGOING_ARROW)
}

fn looks_like_email(text: &str) -> bool {
    EMAIL_MARKERS.iter().any(|marker| text.contains(marker))
}

fn looks_like_file_listing(text: &str) -> bool {
    text.contains("Type:") && (text.contains("File") || text.contains("Folder"))
}

fn is_multi_line(text: &str) -> bool {
    non_blank_lines(text).nth(1).is_some()
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|line| !line.trim().is_empty())
}

// --- JSON ---------------------------------------------------------------

fn format_json(value: &Value) -> String {
    match value {
        Value::Array(items) => format_json_list(items),
        Value::Object(map) => format_json_object(map),
        scalar => format!("   → {}\n", scalar),
    }
}

fn format_json_list(items: &[Value]) -> String {
    if items.is_empty() {
        return "   📋 Empty list\n".to_string();
    }

    let mut output = format!("   📋 List ({} items):\n", items.len());
    if items.len() > MAX_LIST_ITEMS {
        for (i, item) in items.iter().enumerate().take(LIST_HEAD) {
            output.push_str(&format_list_item(item, i + 1));
        }
        let omitted = items.len() - LIST_HEAD - LIST_TAIL;
        output.push_str(&format!("   ... ({} more items)\n", omitted));
        let tail_start = items.len() - LIST_TAIL;
        for (i, item) in items.iter().enumerate().skip(tail_start) {
            output.push_str(&format_list_item(item, i + 1));
        }
    } else {
        for (i, item) in items.iter().enumerate() {
            output.push_str(&format_list_item(item, i + 1));
        }
    }
    output
}

fn format_list_item(item: &Value, number: usize) -> String {
    if let Value::Object(map) = item {
        let summary: Vec<String> = SUMMARY_FIELDS
            .iter()
            .filter_map(|key| {
                let value = map.get(*key).filter(|v| is_truthy(v))?;
                Some(format!("{}: {}", key, truncate(&display_text(value), FIELD_BUDGET)))
            })
            .collect();
        if !summary.is_empty() {
            return format!("   {}. {}\n", number, summary.join(", "));
        }
    }
    format!("   {}. {}\n", number, truncate(&display_text(item), LINE_BUDGET))
}

fn format_json_object(map: &Map<String, Value>) -> String {
    if map.is_empty() {
        return "   📦 Empty object\n".to_string();
    }

    let mut output = String::from("   📦 Data:\n");
    for (key, value) in map {
        output.push_str(&format!("      • {}: {}\n", humanize_key(key), format_value(value)));
    }
    output
}

/// Compact one-token description of a JSON value for key/value lines.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(true) => "✓".to_string(),
        Value::Bool(false) => "✗".to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => format!("\"{}\"", truncate(s, LINE_BUDGET)),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(fields) => format!("{{{} fields}}", fields.len()),
    }
}

/// Strings render bare, everything else as compact JSON.
fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// --- Chat transcripts -----------------------------------------------------

#[derive(Debug)]
struct ChatMessage {
    timestamp: String,
    sender: String,
    text: String,
    outgoing: bool,
}

#[derive(Debug)]
struct ChatGroup {
    name: String,
    messages: Vec<ChatMessage>,
}

fn format_transcript(text: &str) -> Option<String> {
    let mut groups: Vec<ChatGroup> = Vec::new();
    let mut current_chat: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.contains(CHAT_HEADER) || line.contains(CHAT_RULE) {
            if let Some(caps) = CHAT_HEADER_RE.captures(line) {
                current_chat = Some(caps[1].trim().to_string());
            }
            continue;
        }

        let message = match parse_chat_line(line) {
            Some(message) => message,
            None => continue,
        };
        let chat = current_chat.as_deref().unwrap_or("Unknown");
        match groups.iter_mut().find(|g| g.name == chat) {
            Some(group) => group.messages.push(message),
            None => groups.push(ChatGroup {
                name: chat.to_string(),
                messages: vec![message],
            }),
        }
    }

    if groups.is_empty() {
        return None;
    }

    let mut output = String::from("   💬 Messages:\n\n");
    for group in &groups {
        output.push_str(&format!("   ┌─ {}\n", group.name));
        for message in &group.messages {
            output.push_str(&format_chat_message(message));
        }
        output.push('\n');
    }
    Some(output)
}

fn parse_chat_line(line: &str) -> Option<ChatMessage> {
    if let Some(caps) = MESSAGE_RE.captures(line) {
        let sender = caps.get(2).map(|m| m.as_str().trim());
        let body = caps.get(3).map_or("", |m| m.as_str());
        return Some(ChatMessage {
            timestamp: caps[1].trim().to_string(),
            sender: sender.unwrap_or("Me").to_string(),
            text: body
                .strip_prefix(OUTGOING_ARROW)
                .unwrap_or(body)
                .trim()
                .to_string(),
            outgoing: sender.is_none() || body.starts_with(OUTGOING_ARROW),
        });
    }

    // Bracketed but not a full message line: keep it as-is.
    if line.contains('[') && line.contains(']') && BRACKETED_RE.is_match(line) {
        return Some(ChatMessage {
            timestamp: String::new(),
            sender: "Unknown".to_string(),
            text: line.trim().to_string(),
            outgoing: line.contains(OUTGOING_ARROW),
        });
    }

    None
}

fn format_chat_message(message: &ChatMessage) -> String {
    if message.timestamp.is_empty() {
        return format!("   │ {}\n", truncate(&message.text, LINE_BUDGET));
    }
    if message.outgoing {
        format!("   │ [{}] → {}\n", message.timestamp, message.text)
    } else {
        format!(
            "   │ [{} {}] {}\n",
            message.timestamp, message.sender, message.text
        )
    }
}

// --- Email / calendar -----------------------------------------------------

fn format_email_or_calendar(text: &str) -> String {
    let mut output = String::from("   📧 Message Details:\n");

    for line in non_blank_lines(text) {
        if EMAIL_FIELDS.iter().any(|field| line.starts_with(field)) {
            output.push_str(&format!("      • {}\n", line.trim()));
        } else if EMAIL_LONG_FIELDS.iter().any(|field| line.starts_with(field)) {
            let (key, content) = line.split_once(':').unwrap_or((line, ""));
            output.push_str(&format!(
                "      • {}: {}\n",
                key,
                truncate(content.trim(), LINE_BUDGET)
            ));
        } else {
            output.push_str(&format!("      {}\n", truncate(line, LINE_BUDGET)));
        }
    }
    output
}

// --- File listings --------------------------------------------------------

fn format_file_listing(text: &str) -> String {
    let mut output = String::from("   📁 Files:\n");

    for line in non_blank_lines(text) {
        if !line.contains("Type:") {
            output.push_str(&format!("      {}\n", truncate(line, LINE_BUDGET)));
            continue;
        }

        let name = listing_field(line, "Name:").unwrap_or("unnamed");

        if listing_field(line, "Type:") == Some("Folder") {
            output.push_str(&format!("      📁 {}/\n", name));
        } else {
            match listing_field(line, "Size:").filter(|s| !s.is_empty()) {
                Some(size) => output.push_str(&format!("      📄 {} ({})\n", name, size)),
                None => output.push_str(&format!("      📄 {}\n", name)),
            }
        }
    }
    output
}

/// Value of `Key: value` inside a comma-separated listing line.
fn listing_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split(',')
        .map(str::trim)
        .find_map(|part| part.strip_prefix(key))
        .map(str::trim)
}

// --- Plain text -----------------------------------------------------------

fn format_multi_line(text: &str) -> String {
    let lines: Vec<&str> = non_blank_lines(text).collect();
    let mut output = String::new();

    if lines.len() > MAX_OUTPUT_LINES {
        output.push_str(&format!("   📝 Output ({} lines):\n", lines.len()));
        for line in &lines[..OUTPUT_HEAD] {
            output.push_str(&format!("   {}\n", truncate(line, LINE_BUDGET)));
        }
        let omitted = lines.len() - OUTPUT_HEAD - OUTPUT_TAIL;
        output.push_str(&format!("   ... ({} more lines)\n", omitted));
        for line in &lines[lines.len() - OUTPUT_TAIL..] {
            output.push_str(&format!("   {}\n", truncate(line, LINE_BUDGET)));
        }
    } else {
        for line in &lines {
            output.push_str(&format!("   {}\n", truncate(line, LINE_BUDGET)));
        }
    }
    output
}

fn format_single_line(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    format!("   → {}\n", truncate(text, SINGLE_LINE_BUDGET))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numbered_lines(output: &str) -> usize {
        output
            .lines()
            .filter(|l| {
                let t = l.trim_start();
                t.split_once(". ")
                    .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            })
            .count()
    }

    #[test]
    fn empty_list() {
        assert_eq!(format_payload("[]"), "   📋 Empty list\n");
    }

    #[test]
    fn short_list_of_objects_uses_summary_fields() {
        let out = format_payload(r#"[{"id": 7, "name": "Alice", "age": 30}, {"other": true}]"#);
        assert!(out.contains("📋 List (2 items)"));
        assert!(out.contains("   1. name: Alice, id: 7\n"));
        assert!(out.contains(r#"   2. {"other":true}"#));
    }

    #[test]
    fn summary_fields_are_truncated() {
        let long = "x".repeat(80);
        let out = format_payload(&json!([{ "title": long }]).to_string());
        let expected = format!("1. title: {}...", "x".repeat(47));
        assert!(out.contains(&expected), "{}", out);
    }

    #[test]
    fn long_list_shows_head_and_tail() {
        let out = format_payload(&Value::Array(vec![json!("same"); 11]).to_string());
        assert_eq!(numbered_lines(&out), 7);
        assert!(out.contains("... (4 more items)"));
        assert!(out.contains("   5. same\n"));
        assert!(out.contains("   10. same\n"));
        assert!(out.contains("   11. same\n"));
        assert!(!out.contains("   6. same\n"));
    }

    #[test]
    fn ten_items_are_not_elided() {
        let out = format_payload(&json!((1..=10).collect::<Vec<_>>()).to_string());
        assert_eq!(numbered_lines(&out), 10);
        assert!(!out.contains("more items"));
    }

    #[test]
    fn object_key_values() {
        let out = format_payload(
            r#"{"user_name": "bob", "active": true, "deleted": false, "count": 12345,
                "tags": [1,2], "meta": {"a":1,"b":2}, "note": null}"#,
        );
        assert!(out.starts_with("   📦 Data:\n"));
        assert!(out.contains("      • User Name: \"bob\"\n"));
        assert!(out.contains("      • Active: ✓\n"));
        assert!(out.contains("      • Deleted: ✗\n"));
        assert!(out.contains("      • Count: 12,345\n"));
        assert!(out.contains("      • Tags: [2 items]\n"));
        assert!(out.contains("      • Meta: {2 fields}\n"));
        assert!(out.contains("      • Note: null\n"));
    }

    #[test]
    fn empty_object() {
        assert_eq!(format_payload("{}"), "   📦 Empty object\n");
    }

    #[test]
    fn long_string_value_is_cut_to_97_plus_ellipsis() {
        let s = "y".repeat(150);
        assert_eq!(format_value(&json!(s)), format!("\"{}...\"", "y".repeat(97)));
        let exact = "z".repeat(100);
        assert_eq!(format_value(&json!(exact)), format!("\"{}\"", exact));
    }

    #[test]
    fn json_scalar() {
        assert_eq!(format_payload("42"), "   → 42\n");
        assert_eq!(format_payload("\"hi\""), "   → \"hi\"\n");
    }

    #[test]
    fn detection_order() {
        assert_eq!(TextFormat::detect("[01-15 10:30 Bob] hi"), TextFormat::Transcript);
        assert_eq!(TextFormat::detect("Subject: Hello\nFrom: a@b.c"), TextFormat::EmailOrCalendar);
        assert_eq!(TextFormat::detect("Name: a.txt, Type: File"), TextFormat::FileListing);
        assert_eq!(TextFormat::detect("one\ntwo"), TextFormat::MultiLine);
        assert_eq!(TextFormat::detect("one\n\n   \n"), TextFormat::SingleLine);
        assert_eq!(TextFormat::detect("just words"), TextFormat::SingleLine);
    }

    #[test]
    fn transcript_groups_by_chat() {
        let text = "┌─ Family\n\
                    │ [01-15 10:30 Mom] Dinner at 7?\n\
                    │ [01-15 10:31] → Sounds good\n\
                    └───────\n\
                    ┌─ Work\n\
                    [01-15 11:00 Boss] Standup moved\n\
                    ┌─ Family\n\
                    [01-15 12:00 Dad] Bring bread";
        let out = format_transcript(text).unwrap();
        assert!(out.starts_with("   💬 Messages:\n\n"));
        assert_eq!(out.matches("┌─ Family").count(), 1);
        assert!(out.contains("   │ [01-15 10:30 Mom] Dinner at 7?\n"));
        assert!(out.contains("   │ [01-15 10:31] → Sounds good\n"));
        assert!(out.contains("   │ [01-15 11:00 Boss] Standup moved\n"));

        let family = out.find("┌─ Family").unwrap();
        let work = out.find("┌─ Work").unwrap();
        let dad = out.find("Bring bread").unwrap();
        assert!(family < work);
        assert!(dad < work, "later Family messages join the first Family group");
    }

    #[test]
    fn transcript_default_chat_is_unknown() {
        let out = format_payload("[02-01 09:00 Ann] hello");
        assert!(out.contains("   ┌─ Unknown\n"));
        assert!(out.contains("[02-01 09:00 Ann] hello"));
    }

    #[test]
    fn transcript_arrow_marks_outgoing_even_with_sender() {
        let out = format_payload("[02-01 09:00 Me] → on my way");
        assert!(out.contains("   │ [02-01 09:00] → on my way\n"));
    }

    #[test]
    fn transcript_bracketed_fallback() {
        let out = format_payload("┌─ Chat\n[yesterday] something odd");
        assert!(out.contains("   │ [yesterday] something odd\n"));
    }

    #[test]
    fn arrow_without_messages_falls_through_to_plain_text() {
        let out = format_payload("renamed a.txt → b.txt\nrenamed c.txt → d.txt");
        assert!(!out.contains("💬 Messages"));
        assert!(out.contains("   renamed a.txt → b.txt\n"));
        assert!(out.contains("   renamed c.txt → d.txt\n"));

        assert_eq!(format_payload("moved → archive"), "   → moved → archive\n");
        assert_eq!(TextFormat::Transcript.render("no chat here →"), None);
    }

    #[test]
    fn calendar_record_triggered_by_start() {
        let description = "d".repeat(150);
        let text = format!(
            "Start: 2024-03-14 09:00\nEnd: 2024-03-14 09:30\nDescription: {}",
            description
        );
        assert_eq!(TextFormat::detect(&text), TextFormat::EmailOrCalendar);

        let out = format_payload(&text);
        assert!(out.starts_with("   📧 Message Details:\n"));
        assert!(out.contains("      • Start: 2024-03-14 09:00\n"));
        assert!(out.contains("      • End: 2024-03-14 09:30\n"));
        assert!(out.contains(&format!("      • Description: {}...\n", "d".repeat(97))));
    }

    #[test]
    fn email_fields() {
        let body = "b".repeat(120);
        let text = format!(
            "Subject: Lunch\nFrom: a@example.com\nBody: {}\nrandom trailer\n\nLocation: Cafe",
            body
        );
        let out = format_payload(&text);
        assert!(out.starts_with("   📧 Message Details:\n"));
        assert!(out.contains("      • Subject: Lunch\n"));
        assert!(out.contains("      • From: a@example.com\n"));
        assert!(out.contains(&format!("      • Body: {}...\n", "b".repeat(97))));
        assert!(out.contains("      random trailer\n"));
        assert!(out.contains("      • Location: Cafe\n"));
    }

    #[test]
    fn file_listing() {
        let text = "Listing of /docs\n\
                    Name: reports, Type: Folder\n\
                    Name: q1.pdf, Type: File, Size: 12 KB\n\
                    Name: notes.txt, Type: File";
        let out = format_payload(text);
        assert!(out.starts_with("   📁 Files:\n"));
        assert!(out.contains("      Listing of /docs\n"));
        assert!(out.contains("      📁 reports/\n"));
        assert!(out.contains("      📄 q1.pdf (12 KB)\n"));
        assert!(out.contains("      📄 notes.txt\n"));
    }

    #[test]
    fn short_multi_line_keeps_every_line() {
        let text = (1..=20).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let out = format_payload(&text);
        assert_eq!(out.lines().count(), 20);
        assert!(!out.contains("more lines"));
    }

    #[test]
    fn long_multi_line_elides_middle() {
        let text = (1..=25).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let out = format_payload(&text);
        let literal = out.lines().filter(|l| l.trim_start().starts_with("line ")).count();
        assert_eq!(literal, 12);
        assert!(out.contains("   ... (13 more lines)\n"));
        assert!(out.contains("   line 10\n"));
        assert!(!out.contains("   line 11\n"));
        assert!(out.contains("   line 24\n"));
        assert!(out.contains("   line 25\n"));
    }

    #[test]
    fn multi_line_truncates_long_lines() {
        let text = format!("short\n{}", "w".repeat(150));
        let out = format_payload(&text);
        assert!(out.contains(&format!("   {}...\n", "w".repeat(97))));
    }

    #[test]
    fn single_line_budget() {
        let text = "s".repeat(250);
        let out = format_payload(&text);
        assert_eq!(out, format!("   → {}...\n", "s".repeat(197)));
    }

    #[test]
    fn empty_text_renders_nothing() {
        assert_eq!(format_payload(""), "");
    }
}
