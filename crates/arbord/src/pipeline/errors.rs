//! Failures surfaced while serving a JSONL connection.

use std::io;

use arbor_spi::wire::WireError;
use thiserror::Error;

/// Errors that end a JSONL connection.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A request line grew past the configured limit.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge { size: usize, max_size: usize },

    /// IO error during read or write.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A line could not be parsed or a response could not be serialized.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl DispatchError {
    /// Creates a [`DispatchError::RequestTooLarge`].
    #[must_use]
    pub fn request_too_large(size: usize, max_size: usize) -> Self {
        Self::RequestTooLarge { size, max_size }
    }
}
