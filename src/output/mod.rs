//! Turning Claude's event stream into readable console text.
//!
//! `formatter` is the entry point; `payload` and `text` are its building blocks.
//! `logger` handles the raw NDJSON log and diagnostic tracing.

pub mod formatter;
pub mod logger;
pub mod payload;
pub mod text;
