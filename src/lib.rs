//! claude-relay library.
//!
//! The binary in `main.rs` is thin glue over these modules; integration
//! tests in `tests/` use them directly.
//!
//! [`render`] turns one line of the agent's stream-json output into console
//! text and is the entry point most callers want.

pub mod claude;
pub mod cli;
pub mod config;
pub mod output;
pub mod server;

pub use output::formatter::render;
