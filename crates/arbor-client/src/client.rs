//! Asynchronous and synchronous CRUD calls.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use arbor_config::Config;
use arbor_spi::{
    RequestContext, RequestType, ResourcePath, ResourceRequest, ResourceResponse, ResourceState,
    WorkerPool,
};
use tracing::{debug, warn};

use crate::{ClientError, Connection, Connector, SocketConnector};

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Name of the pool a client creates for its callbacks.
pub const CLIENT_POOL_NAME: &str = "arbor-client";

const CLIENT_POOL_THREADS: usize = 2;
const CLIENT_POOL_CAPACITY: usize = 256;

/// Issues requests over one [`Connection`].
pub struct Client {
    connection: Arc<dyn Connection>,
    executor: Option<Arc<WorkerPool>>,
    timeout: Option<Duration>,
}

impl Client {
    /// Connects through `connector`, creating a private callback pool.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Pool`] when the pool cannot start, or the
    /// connector's failure.
    pub fn connect(connector: &dyn Connector, address: &str) -> Result<Self, ClientError> {
        let executor = Arc::new(WorkerPool::new(
            CLIENT_POOL_NAME,
            CLIENT_POOL_THREADS,
            CLIENT_POOL_CAPACITY,
        )?);
        let connection = connector.connect(address, Arc::clone(&executor))?;
        Ok(Self {
            connection,
            executor: Some(executor),
            timeout: None,
        })
    }

    /// Connects through `connector`, delivering callbacks on `executor`.
    ///
    /// # Errors
    ///
    /// Returns the connector's failure.
    pub fn connect_with_executor(
        connector: &dyn Connector,
        address: &str,
        executor: Arc<WorkerPool>,
    ) -> Result<Self, ClientError> {
        let connection = connector.connect(address, executor)?;
        Ok(Self::from_connection(connection))
    }

    /// Connects to the daemon named by `config` over its socket.
    ///
    /// # Errors
    ///
    /// See [`Client::connect`].
    pub fn connect_with_config(config: &Config) -> Result<Self, ClientError> {
        let address = config.listen_socket().to_string();
        Ok(Self::connect(&SocketConnector, &address)?.with_timeout(config.request_timeout()))
    }

    /// Wraps an already open connection.
    #[must_use]
    pub fn from_connection(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            executor: None,
            timeout: None,
        }
    }

    /// Bounds how long synchronous calls wait. `None` waits indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Asks `path`'s collection to create a member from `state`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Send`] when the request cannot be written.
    pub fn create(
        &self,
        ctx: RequestContext,
        path: ResourcePath,
        state: ResourceState,
        handler: impl FnOnce(ResourceResponse) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.submit(request(RequestType::Create, ctx, path, Some(state)), handler)
    }

    /// Reads the resource at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Send`] when the request cannot be written.
    pub fn read(
        &self,
        ctx: RequestContext,
        path: ResourcePath,
        handler: impl FnOnce(ResourceResponse) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.submit(request(RequestType::Read, ctx, path, None), handler)
    }

    /// Updates the resource at `path`, creating it when its parent allows.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Send`] when the request cannot be written.
    pub fn update(
        &self,
        ctx: RequestContext,
        path: ResourcePath,
        state: ResourceState,
        handler: impl FnOnce(ResourceResponse) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.submit(request(RequestType::Update, ctx, path, Some(state)), handler)
    }

    /// Deletes the resource at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Send`] when the request cannot be written.
    pub fn delete(
        &self,
        ctx: RequestContext,
        path: ResourcePath,
        handler: impl FnOnce(ResourceResponse) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.submit(request(RequestType::Delete, ctx, path, None), handler)
    }

    /// Blocking form of [`Client::create`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Resource`] carrying the error kind and path the
    /// container answered with, or a transport failure.
    pub fn create_sync(
        &self,
        ctx: RequestContext,
        path: ResourcePath,
        state: ResourceState,
    ) -> Result<ResourceState, ClientError> {
        self.wait(|handler| self.create(ctx, path, state, handler))
    }

    /// Blocking form of [`Client::read`].
    ///
    /// # Errors
    ///
    /// See [`Client::create_sync`].
    pub fn read_sync(
        &self,
        ctx: RequestContext,
        path: ResourcePath,
    ) -> Result<ResourceState, ClientError> {
        self.wait(|handler| self.read(ctx, path, handler))
    }

    /// Blocking form of [`Client::update`].
    ///
    /// # Errors
    ///
    /// See [`Client::create_sync`].
    pub fn update_sync(
        &self,
        ctx: RequestContext,
        path: ResourcePath,
        state: ResourceState,
    ) -> Result<ResourceState, ClientError> {
        self.wait(|handler| self.update(ctx, path, state, handler))
    }

    /// Blocking form of [`Client::delete`].
    ///
    /// # Errors
    ///
    /// See [`Client::create_sync`].
    pub fn delete_sync(
        &self,
        ctx: RequestContext,
        path: ResourcePath,
    ) -> Result<ResourceState, ClientError> {
        self.wait(|handler| self.delete(ctx, path, handler))
    }

    /// Closes the connection and stops the private callback pool.
    pub fn close(&self) {
        self.connection.close();
        if let Some(executor) = &self.executor {
            executor.shutdown();
        }
    }

    fn submit(
        &self,
        request: ResourceRequest,
        handler: impl FnOnce(ResourceResponse) + Send + 'static,
    ) -> Result<(), ClientError> {
        debug!(
            target: CLIENT_TARGET,
            connection = self.connection.id(),
            verb = %request.request_type(),
            path = %request.path(),
            "sending request"
        );
        self.connection.write(request, Box::new(handler))
    }

    fn wait(
        &self,
        send: impl FnOnce(Box<dyn FnOnce(ResourceResponse) + Send>) -> Result<(), ClientError>,
    ) -> Result<ResourceState, ClientError> {
        let (sender, receiver) = mpsc::sync_channel(1);
        send(Box::new(move |response| {
            let _ = sender.send(response);
        }))?;

        let response = match self.timeout {
            Some(after) => receiver.recv_timeout(after).map_err(|error| match error {
                RecvTimeoutError::Timeout => {
                    warn!(
                        target: CLIENT_TARGET,
                        connection = self.connection.id(),
                        ?after,
                        "synchronous call timed out"
                    );
                    ClientError::Timeout { after }
                }
                RecvTimeoutError::Disconnected => ClientError::Disconnected,
            })?,
            None => receiver.recv().map_err(|_| ClientError::Disconnected)?,
        };
        Ok(response.into_result()?)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Client")
            .field("connection", &self.connection.id())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn request(
    request_type: RequestType,
    ctx: RequestContext,
    path: ResourcePath,
    state: Option<ResourceState>,
) -> ResourceRequest {
    let builder = ResourceRequest::builder(request_type, path).context(ctx);
    match state {
        Some(state) => builder.state(state),
        None => builder,
    }
    .build()
}
