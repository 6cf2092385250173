//! The push transport boundary and its messages.

use std::fmt;

use arbor_spi::{MediaType, ResourcePath};
use bytes::Bytes;

use super::SubscriptionError;

/// Status carried by every lifecycle push.
pub const PUSH_STATUS: u16 = 200;

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    /// Header value for this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One notification for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    /// The subscriber's connection-scoped subscription id.
    pub subscription: String,
    /// The subscriber's negotiated media type.
    pub content_type: MediaType,
    /// What happened.
    pub action: Action,
    /// Always [`PUSH_STATUS`].
    pub status: u16,
    /// Canonical location of the affected resource.
    pub location: ResourcePath,
    /// The resource state encoded in `content_type`.
    pub body: Bytes,
}

impl PushMessage {
    /// Header pairs in wire order.
    #[must_use]
    pub fn headers(&self) -> [(&'static str, String); 5] {
        [
            ("subscription", self.subscription.clone()),
            ("content-type", self.content_type.to_string()),
            ("action", self.action.as_str().to_owned()),
            ("status", self.status.to_string()),
            ("location", self.location.to_string()),
        ]
    }
}

/// A connection able to receive pushed messages.
#[cfg_attr(test, mockall::automock)]
pub trait PushConnection: Send + Sync {
    /// Identifier of the owning connection.
    fn connection_id(&self) -> String;

    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Send`] when the message cannot be sent.
    fn send(&self, message: PushMessage) -> Result<(), SubscriptionError>;
}
