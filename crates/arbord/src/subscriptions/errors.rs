//! Subscription failures.

use arbor_spi::{CodecError, MediaType, ResourcePath};
use thiserror::Error;

/// Errors raised while subscribing or delivering.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// No codec produces the requested media type.
    #[error("no codec for {media_type} to subscribe to {destination}")]
    NotAcceptable {
        destination: ResourcePath,
        media_type: MediaType,
    },
    /// The connection already holds a subscription with this id.
    #[error("subscription '{key}' already exists")]
    Duplicate { key: String },
    /// The resource state could not be encoded for the subscriber.
    #[error(transparent)]
    Encode(#[from] CodecError),
    /// The push connection refused the message.
    #[error("failed to push to connection '{connection_id}': {message}")]
    Send {
        connection_id: String,
        message: String,
    },
}

impl SubscriptionError {
    /// Creates a send failure.
    pub fn send(connection_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            connection_id: connection_id.into(),
            message: message.into(),
        }
    }
}
