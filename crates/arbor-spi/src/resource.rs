//! The resource capability consumed by the container.

use std::sync::Arc;

use crate::{
    RequestContext, RequestType, ResourceError, ResourcePath, ResourceState, Responder,
};

/// Declares where a resource's operations may run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Execution {
    /// Operations return promptly and may run on the I/O thread.
    #[default]
    NonBlocking,
    /// Operations may block and are always offloaded to the worker pool.
    Blocking,
}

impl Execution {
    /// Returns `true` for [`Execution::Blocking`].
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Blocking)
    }
}

/// A node in the addressable resource graph.
///
/// Operations answer through the supplied [`Responder`], either before
/// returning or later from another thread. Unsupported operations default to
/// the matching "not supported" error.
pub trait Resource: Send + Sync {
    /// Identifier of this resource within its parent. The root uses `""`.
    fn id(&self) -> &str;

    /// The containing resource, or `None` for a root.
    fn parent(&self) -> Option<Arc<dyn Resource>>;

    /// Where this resource's operations may run. Queried once per hop.
    fn execution(&self) -> Execution {
        Execution::NonBlocking
    }

    /// Canonical location derived from the parent chain.
    fn uri(&self) -> ResourcePath {
        match self.parent() {
            Some(parent) => parent.uri().child(self.id()),
            None if self.id().is_empty() => ResourcePath::root(),
            None => ResourcePath::from_segments([self.id()]),
        }
    }

    /// Renders this resource's own state.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] when the state cannot be produced.
    fn read_properties(&self, _ctx: &RequestContext) -> Result<ResourceState, ResourceError> {
        Ok(ResourceState::new()
            .with_id(self.id())
            .with_uri(self.uri()))
    }

    /// Lists member resources for rendering. Leaves return nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] when membership cannot be listed.
    fn read_members(&self, _ctx: &RequestContext) -> Result<Vec<Arc<dyn Resource>>, ResourceError> {
        Ok(Vec::new())
    }

    /// Resolves the member named `id`. Leaves have no members.
    fn read_member(&self, _ctx: &RequestContext, id: &str, responder: Responder) {
        responder.no_such_resource(id);
    }

    /// Creates a member from `state`.
    fn create_member(&self, _ctx: &RequestContext, _state: ResourceState, responder: Responder) {
        responder.not_supported(RequestType::Create, self.uri());
    }

    /// Replaces this resource's properties with `state`.
    fn update_properties(
        &self,
        _ctx: &RequestContext,
        _state: ResourceState,
        responder: Responder,
    ) {
        responder.not_supported(RequestType::Update, self.uri());
    }

    /// Deletes this resource from its parent's membership.
    fn delete_member(&self, _ctx: &RequestContext, responder: Responder) {
        responder.not_supported(RequestType::Delete, self.uri());
    }
}
