//! The transport boundary the client writes through.

use std::sync::Arc;

use arbor_spi::{ResourceRequest, ResourceResponse, WorkerPool};

use crate::ClientError;

/// Callback receiving exactly one response.
pub type ResponseHandler = Box<dyn FnOnce(ResourceResponse) + Send + 'static>;

/// An open channel to a container.
///
/// Implementations invoke each handler exactly once, on the executor the
/// connection was opened with, and fail outstanding handlers when closed.
pub trait Connection: Send + Sync {
    /// Identifier of this connection, unique within its container.
    fn id(&self) -> &str;

    /// Sends `request`; `handler` later receives its response.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Send`] when the request cannot be written. The
    /// handler is not invoked in that case.
    fn write(&self, request: ResourceRequest, handler: ResponseHandler) -> Result<(), ClientError>;

    /// Closes the connection. Idempotent.
    fn close(&self);
}

/// Opens connections to an address.
pub trait Connector: Send + Sync {
    /// Connects to `address`, delivering response callbacks on `executor`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] when the address is unreachable.
    fn connect(
        &self,
        address: &str,
        executor: Arc<WorkerPool>,
    ) -> Result<Arc<dyn Connection>, ClientError>;
}
