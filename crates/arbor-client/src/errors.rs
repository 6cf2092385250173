//! Client error taxonomy.

use std::time::Duration;

use arbor_spi::{PoolError, ResourceError};
use thiserror::Error;

/// Failures surfaced by [`crate::Client`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The container answered with an error kind.
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// The connection ended before the response arrived.
    #[error("connection closed before a response arrived")]
    Disconnected,
    /// No response arrived within the configured timeout.
    #[error("no response within {after:?}")]
    Timeout { after: Duration },
    /// The connection could not be established.
    #[error("failed to connect to {address}: {message}")]
    Connect { address: String, message: String },
    /// The request could not be written.
    #[error("failed to send request: {message}")]
    Send { message: String },
    /// The callback executor could not be started.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl ClientError {
    /// Creates a connect failure.
    pub fn connect(address: impl Into<String>, message: impl ToString) -> Self {
        Self::Connect {
            address: address.into(),
            message: message.to_string(),
        }
    }

    /// Creates a send failure.
    pub fn send(message: impl ToString) -> Self {
        Self::Send {
            message: message.to_string(),
        }
    }

    /// The container error, when this is one.
    #[must_use]
    pub const fn as_resource_error(&self) -> Option<&ResourceError> {
        match self {
            Self::Resource(error) => Some(error),
            _ => None,
        }
    }
}
