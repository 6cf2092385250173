//! Per-request context handed to every resource operation.

use crate::MediaType;

/// Ambient information about the requester.
///
/// The container treats the subject as opaque; authorization policies give it
/// meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    subject: Option<String>,
    accept: Option<MediaType>,
}

impl RequestContext {
    /// Creates an anonymous context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the authenticated subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches the media type the requester wants responses encoded in.
    #[must_use]
    pub fn with_accept(mut self, media_type: MediaType) -> Self {
        self.accept = Some(media_type);
        self
    }

    /// Authenticated subject, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Requested response media type, if any.
    #[must_use]
    pub fn accept(&self) -> Option<&MediaType> {
        self.accept.as_ref()
    }
}
