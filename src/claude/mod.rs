//! Claude CLI integration: event model, NDJSON parsing, and process spawning.

pub mod client;
pub mod events;
pub mod parser;
