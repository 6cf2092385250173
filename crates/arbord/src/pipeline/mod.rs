//! Decode pipelines installed behind the protocol multiplexer.

mod errors;
mod jsonl;
mod push;
mod reader;

pub use self::errors::DispatchError;
pub use self::jsonl::JsonlPipeline;

/// Longest request line the JSONL pipeline accepts by default.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

const PIPELINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pipeline");
