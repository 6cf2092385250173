//! In-process connections to a container.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arbor_client::{ClientError, Connection, Connector, ResponseHandler};
use arbor_spi::{ResourceRequest, WorkerPool};
use dashmap::DashMap;
use tracing::debug;

use super::{CONTAINER_TARGET, Container};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Resolves names bound with [`LocalConnector::bind`] to containers in this
/// process.
#[derive(Default)]
pub struct LocalConnector {
    bindings: DashMap<String, Weak<Container>>,
}

impl LocalConnector {
    /// Creates a connector with no bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `container` reachable as `address`, replacing any earlier binding.
    pub fn bind(&self, address: impl Into<String>, container: &Arc<Container>) {
        self.bindings
            .insert(address.into(), Arc::downgrade(container));
    }

    /// Removes the binding for `address`.
    pub fn unbind(&self, address: &str) {
        self.bindings.remove(address);
    }
}

impl Connector for LocalConnector {
    fn connect(
        &self,
        address: &str,
        executor: Arc<WorkerPool>,
    ) -> Result<Arc<dyn Connection>, ClientError> {
        let container = self
            .bindings
            .get(address)
            .and_then(|entry| entry.value().upgrade())
            .ok_or_else(|| ClientError::connect(address, "no container bound to this address"))?;
        let id = format!(
            "local-{}",
            NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed)
        );
        debug!(target: CONTAINER_TARGET, connection = %id, address, "local connection opened");
        Ok(Arc::new(LocalConnection {
            id,
            container,
            executor,
            closed: AtomicBool::new(false),
        }))
    }
}

/// A connection dispatching straight into a container.
///
/// Responses reach their handlers on the executor given at connect time.
pub struct LocalConnection {
    id: String,
    container: Arc<Container>,
    executor: Arc<WorkerPool>,
    closed: AtomicBool,
}

impl LocalConnection {
    /// The container this connection dispatches into.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }
}

impl Connection for LocalConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(&self, request: ResourceRequest, handler: ResponseHandler) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::send("connection closed"));
        }
        let executor = Arc::clone(&self.executor);
        self.container.dispatch(request, move |response| {
            executor.execute(move || handler(response));
        });
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = self.container.connection_closed(&self.id);
        debug!(
            target: CONTAINER_TARGET,
            connection = %self.id,
            released,
            "local connection closed"
        );
    }
}

impl Drop for LocalConnection {
    fn drop(&mut self) {
        self.close();
    }
}
