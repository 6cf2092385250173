//! The continuation through which resources answer.
//!
//! A [`Responder`] is consumed by the first outcome it delivers, so a resource
//! cannot answer twice. Dropping a responder without answering delivers an
//! internal error, so a request never ends without an outcome either.

use std::fmt;
use std::sync::Arc;

use crate::{RequestType, Resource, ResourceError, ResourcePath};

/// The single outcome a [`Responder`] delivers.
pub enum Outcome {
    /// A member lookup, or a read, resolved to this resource.
    Read(Arc<dyn Resource>),
    /// A member was created.
    Created(Arc<dyn Resource>),
    /// The resource was updated.
    Updated(Arc<dyn Resource>),
    /// The resource was deleted.
    Deleted(Arc<dyn Resource>),
    /// The member with this id does not exist.
    NoSuchResource(String),
    /// A member with this id already exists.
    ResourceAlreadyExists(String),
    /// Any other failure.
    Failed(ResourceError),
}

impl Outcome {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
            Self::Deleted(_) => "deleted",
            Self::NoSuchResource(_) => "no_such_resource",
            Self::ResourceAlreadyExists(_) => "resource_already_exists",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(resource)
            | Self::Created(resource)
            | Self::Updated(resource)
            | Self::Deleted(resource) => {
                write!(formatter, "{}({})", self.kind(), resource.uri())
            }
            Self::NoSuchResource(id) | Self::ResourceAlreadyExists(id) => {
                write!(formatter, "{}({id})", self.kind())
            }
            Self::Failed(error) => write!(formatter, "failed({error})"),
        }
    }
}

type Reply = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// One-shot continuation delivering exactly one [`Outcome`].
pub struct Responder {
    reply: Option<Reply>,
}

impl Responder {
    /// Wraps a callback.
    pub fn new(reply: impl FnOnce(Outcome) + Send + 'static) -> Self {
        Self {
            reply: Some(Box::new(reply)),
        }
    }

    /// Delivers `outcome`, consuming the responder.
    pub fn respond(mut self, outcome: Outcome) {
        if let Some(reply) = self.reply.take() {
            reply(outcome);
        }
    }

    /// Reports a resolved member or a read result.
    pub fn resource_read(self, resource: Arc<dyn Resource>) {
        self.respond(Outcome::Read(resource));
    }

    /// Reports a created member.
    pub fn resource_created(self, resource: Arc<dyn Resource>) {
        self.respond(Outcome::Created(resource));
    }

    /// Reports an updated resource.
    pub fn resource_updated(self, resource: Arc<dyn Resource>) {
        self.respond(Outcome::Updated(resource));
    }

    /// Reports a deleted resource.
    pub fn resource_deleted(self, resource: Arc<dyn Resource>) {
        self.respond(Outcome::Deleted(resource));
    }

    /// Reports that no member named `id` exists.
    pub fn no_such_resource(self, id: impl Into<String>) {
        self.respond(Outcome::NoSuchResource(id.into()));
    }

    /// Reports that a member named `id` already exists.
    pub fn resource_already_exists(self, id: impl Into<String>) {
        self.respond(Outcome::ResourceAlreadyExists(id.into()));
    }

    /// Reports that `path` does not support `request_type`.
    pub fn not_supported(self, request_type: RequestType, path: ResourcePath) {
        self.fail(ResourceError::not_supported(request_type, path));
    }

    /// Reports that the requester may not touch `path`.
    pub fn not_authorized(self, path: ResourcePath) {
        self.fail(ResourceError::NotAuthorized { path });
    }

    /// Reports that `path` cannot be rendered acceptably.
    pub fn not_acceptable(self, path: ResourcePath) {
        self.fail(ResourceError::NotAcceptable { path });
    }

    /// Reports an internal failure.
    pub fn internal_error(self, message: impl Into<String>) {
        self.fail(ResourceError::internal(message));
    }

    /// Reports an arbitrary failure.
    pub fn fail(self, error: ResourceError) {
        self.respond(Outcome::Failed(error));
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(reply) = self.reply.take() {
            tracing::warn!(
                target: concat!(env!("CARGO_PKG_NAME"), "::responder"),
                "responder dropped without reply"
            );
            reply(Outcome::Failed(ResourceError::internal(
                "responder dropped without reply",
            )));
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Responder")
            .field("answered", &self.reply.is_none())
            .finish()
    }
}
