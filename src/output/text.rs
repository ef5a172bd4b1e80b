//! Truncation and formatting primitives shared by the event renderers.

use serde_json::Number;

/// Suffix appended when a fragment is cut short.
pub const ELLIPSIS: &str = "...";

/// Truncate `s` to at most `max_chars` characters.
///
/// The ellipsis counts against the budget, so the result never exceeds
/// `max_chars` and truncating twice is the same as truncating once.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars < ELLIPSIS.len() {
        return s.chars().take(max_chars).collect();
    }
    let mut out: String = s.chars().take(max_chars - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Upper-case the first ASCII word character of every word.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_word = false;
    for c in s.chars() {
        let is_word = c.is_ascii_alphanumeric() || c == '_';
        if is_word && !prev_is_word {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
        prev_is_word = is_word;
    }
    out
}

/// `created_at` -> `Created At`.
pub fn humanize_key(key: &str) -> String {
    title_case(&key.replace('_', " "))
}

/// Display name for a tool: `mcp__gmail__search_messages` -> `Search Messages`.
pub fn normalize_tool_name(name: &str) -> String {
    humanize_key(strip_mcp_prefix(name))
}

fn strip_mcp_prefix(name: &str) -> &str {
    if let Some(rest) = name.strip_prefix("mcp__") {
        if let Some(pos) = rest.find('_') {
            if pos > 0 && rest[pos..].starts_with("__") {
                return &rest[pos + 2..];
            }
        }
    }
    name
}

/// Render a JSON number with thousands separators.
pub fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_u64() {
        group_digits(&i.to_string())
    } else if let Some(i) = n.as_i64() {
        format!("-{}", group_digits(&i.unsigned_abs().to_string()))
    } else {
        format_grouped(n.as_f64().unwrap_or_default())
    }
}

/// Thousands-grouped decimal with at most three fraction digits.
pub fn format_grouped(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    let rounded = format!("{:.3}", n.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut out = String::new();
    if n < 0.0 && (int_part != "0" || !frac.is_empty()) {
        out.push('-');
    }
    out.push_str(&group_digits(int_part));
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
