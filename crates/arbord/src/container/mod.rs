//! The container: root resource, worker pool, codecs, policies, and the
//! subscription registry behind one request entry point.

mod local;
mod root;

use std::fmt;
use std::sync::Arc;

use arbor_config::Config;
use arbor_spi::{
    AuthorizationDecision, AuthorizationPolicy, Outcome, PoolError, RequestContext, Resource,
    ResourceCodec, ResourceError, ResourcePath, ResourceRequest, ResourceResponse, ResourceState,
    Responder, WorkerPool, decide_all,
};
use tracing::debug;

pub use self::local::{LocalConnection, LocalConnector};
pub use self::root::RootDirectory;
use crate::codecs::CodecManager;
use crate::resolver::dispatch_request;
use crate::subscriptions::{Action, PushConnection, Subscription, SubscriptionError, SubscriptionManager};

const CONTAINER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::container");

/// Name given to the blocking-offload pool.
pub const WORKER_POOL_NAME: &str = "arbord-worker";

/// Owns the resource graph and everything requests need to traverse it.
pub struct Container {
    root: Arc<RootDirectory>,
    pool: Arc<WorkerPool>,
    codecs: Arc<CodecManager>,
    subscriptions: Arc<SubscriptionManager>,
    policies: Vec<Arc<dyn AuthorizationPolicy>>,
}

impl Container {
    /// Starts building a container.
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Builds a container sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] when worker threads cannot be started.
    pub fn from_config(config: &Config) -> Result<Arc<Self>, PoolError> {
        Self::builder()
            .worker_threads(config.worker_threads())
            .queue_capacity(config.worker_queue_capacity())
            .build()
    }

    /// Mounts a top-level resource.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::ResourceAlreadyExists`] when the id is taken.
    pub fn mount(&self, resource: Arc<dyn Resource>) -> Result<(), ResourceError> {
        let id = resource.id().to_owned();
        self.root.mount(resource)?;
        debug!(target: CONTAINER_TARGET, id = %id, "mounted resource");
        Ok(())
    }

    /// Unmounts the top-level resource named `id`.
    pub fn unmount(&self, id: &str) -> Option<Arc<dyn Resource>> {
        self.root.unmount(id)
    }

    /// The root resource.
    #[must_use]
    pub fn root(&self) -> &Arc<RootDirectory> {
        &self.root
    }

    /// The blocking-offload pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// The subscription registry.
    #[must_use]
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Registered codecs.
    #[must_use]
    pub fn codecs(&self) -> &Arc<CodecManager> {
        &self.codecs
    }

    /// Registers a subscription on behalf of `connection`.
    ///
    /// # Errors
    ///
    /// See [`SubscriptionManager::subscribe`].
    pub fn subscribe(
        &self,
        connection: Arc<dyn PushConnection>,
        subscription_id: &str,
        destination: ResourcePath,
        media_type: arbor_spi::MediaType,
    ) -> Result<Arc<Subscription>, SubscriptionError> {
        self.subscriptions
            .subscribe(connection, subscription_id, destination, media_type)
    }

    /// Removes one of `connection_id`'s subscriptions.
    pub fn unsubscribe(
        &self,
        connection_id: &str,
        subscription_id: &str,
    ) -> Option<Arc<Subscription>> {
        self.subscriptions
            .unsubscribe(connection_id, subscription_id)
    }

    /// Releases everything a closed connection owned. Returns the number of
    /// subscriptions removed.
    pub fn connection_closed(&self, connection_id: &str) -> usize {
        self.subscriptions.connection_closed(connection_id)
    }

    /// Processes `request` and hands its single response to `handler`.
    ///
    /// Subscribers are notified of successful creates, updates, and deletes
    /// after `handler` has run.
    pub fn dispatch(
        &self,
        request: ResourceRequest,
        handler: impl FnOnce(ResourceResponse) + Send + 'static,
    ) {
        self.dispatch_then(request, handler, || {});
    }

    /// Like [`Container::dispatch`], then runs `finished` once subscribers
    /// have been notified.
    pub fn dispatch_then(
        &self,
        request: ResourceRequest,
        handler: impl FnOnce(ResourceResponse) + Send + 'static,
        finished: impl FnOnce() + Send + 'static,
    ) {
        let path = request.path().clone();
        if decide_all(&self.policies, &request) == AuthorizationDecision::Reject {
            debug!(target: CONTAINER_TARGET, path = %path, "request rejected by policy");
            handler(ResourceResponse::error(
                path.clone(),
                &ResourceError::NotAuthorized { path },
            ));
            finished();
            return;
        }
        if let Some(accept) = request.context().accept()
            && !self.codecs.supports(accept)
        {
            debug!(
                target: CONTAINER_TARGET,
                path = %path,
                media_type = %accept,
                "no codec for requested media type"
            );
            handler(ResourceResponse::error(
                path.clone(),
                &ResourceError::NotAcceptable { path },
            ));
            finished();
            return;
        }

        let request = Arc::new(request);
        let subscriptions = Arc::clone(&self.subscriptions);
        let ctx = request.context().clone();
        let reply = Responder::new(move |outcome| {
            let (response, event) = render(&ctx, path, outcome);
            handler(response);
            if let Some((action, resource)) = event {
                subscriptions.notify(action, &resource);
            }
            finished();
        });
        let root: Arc<dyn Resource> = self.root.clone();
        dispatch_request(root, request, Arc::clone(&self.pool), reply);
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Container")
            .field("pool", &self.pool)
            .field("codecs", &self.codecs)
            .field("subscriptions", &self.subscriptions)
            .field("policies", &self.policies.len())
            .finish_non_exhaustive()
    }
}

type LifecycleEvent = (Action, Arc<dyn Resource>);

/// Turns a terminal outcome into the response for `path` and the lifecycle
/// event subscribers should hear about.
fn render(
    ctx: &RequestContext,
    path: ResourcePath,
    outcome: Outcome,
) -> (ResourceResponse, Option<LifecycleEvent>) {
    let (resource, action) = match outcome {
        Outcome::Read(resource) => (resource, None),
        Outcome::Created(resource) => (resource, Some(Action::Create)),
        Outcome::Updated(resource) => (resource, Some(Action::Update)),
        Outcome::Deleted(resource) => {
            let state = summary(resource.as_ref());
            return (
                ResourceResponse::ok(path, state),
                Some((Action::Delete, resource)),
            );
        }
        Outcome::NoSuchResource(_) => {
            let error = ResourceError::NoSuchResource { path: path.clone() };
            return (ResourceResponse::error(path, &error), None);
        }
        Outcome::ResourceAlreadyExists(_) => {
            let error = ResourceError::ResourceAlreadyExists { path: path.clone() };
            return (ResourceResponse::error(path, &error), None);
        }
        Outcome::Failed(error) => return (ResourceResponse::error(path, &error), None),
    };

    match full_state(ctx, resource.as_ref()) {
        Ok(state) => (
            ResourceResponse::ok(path, state),
            action.map(|action| (action, resource)),
        ),
        Err(error) => (ResourceResponse::error(path, &error), None),
    }
}

/// The resource's properties with a shallow listing of its members.
fn full_state(ctx: &RequestContext, resource: &dyn Resource) -> Result<ResourceState, ResourceError> {
    let mut state = resource.read_properties(ctx)?;
    state.members = resource
        .read_members(ctx)?
        .iter()
        .map(|member| summary(member.as_ref()))
        .collect();
    Ok(state)
}

fn summary(resource: &dyn Resource) -> ResourceState {
    ResourceState::new()
        .with_id(resource.id())
        .with_uri(resource.uri())
}

/// Configures a [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
    pool: Option<Arc<WorkerPool>>,
    worker_threads: Option<usize>,
    queue_capacity: Option<usize>,
    codecs: Vec<Arc<dyn ResourceCodec>>,
    policies: Vec<Arc<dyn AuthorizationPolicy>>,
}

impl ContainerBuilder {
    /// Uses an existing pool for blocking offload.
    #[must_use]
    pub fn worker_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Threads for the pool created by [`ContainerBuilder::build`].
    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Queue capacity for the pool created by [`ContainerBuilder::build`].
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Registers an additional codec.
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn ResourceCodec>) -> Self {
        self.codecs.push(codec);
        self
    }

    /// Registers an authorization policy.
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn AuthorizationPolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Builds the container, starting a worker pool unless one was supplied.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] when worker threads cannot be started.
    pub fn build(self) -> Result<Arc<Container>, PoolError> {
        let pool = match self.pool {
            Some(pool) => pool,
            None => Arc::new(WorkerPool::new(
                WORKER_POOL_NAME,
                self.worker_threads
                    .unwrap_or(arbor_config::DEFAULT_WORKER_THREADS),
                self.queue_capacity
                    .unwrap_or(arbor_config::DEFAULT_WORKER_QUEUE_CAPACITY),
            )?),
        };
        let codecs = Arc::new(CodecManager::new());
        for codec in self.codecs {
            codecs.register(codec);
        }
        let subscriptions = Arc::new(SubscriptionManager::new(Arc::clone(&codecs)));
        Ok(Arc::new(Container {
            root: RootDirectory::new(Arc::clone(&subscriptions)),
            pool,
            codecs,
            subscriptions,
            policies: self.policies,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use arbor_spi::{MediaType, RequestType, ResponseType};
    use rstest::rstest;

    use super::*;

    struct Deny;

    impl AuthorizationPolicy for Deny {
        fn decide(&self, request: &ResourceRequest) -> AuthorizationDecision {
            if request.context().subject() == Some("mallory") {
                AuthorizationDecision::Reject
            } else {
                AuthorizationDecision::Ignore
            }
        }
    }

    fn call(container: &Container, request: ResourceRequest) -> ResourceResponse {
        let (sender, receiver) = mpsc::channel();
        container.dispatch(request, move |response| {
            let _ = sender.send(response);
        });
        receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("response")
    }

    fn read(path: &str, ctx: RequestContext) -> ResourceRequest {
        ResourceRequest::builder(RequestType::Read, ResourcePath::new(path))
            .context(ctx)
            .build()
    }

    #[rstest]
    #[case(Some("mallory"), ResponseType::NotAuthorized)]
    #[case(Some("alice"), ResponseType::Ok)]
    #[case(None, ResponseType::Ok)]
    fn policies_gate_requests(#[case] subject: Option<&str>, #[case] expected: ResponseType) {
        let container = Container::builder()
            .worker_threads(1)
            .policy(Arc::new(Deny))
            .build()
            .expect("container");
        let ctx = subject.map_or_else(RequestContext::new, |subject| {
            RequestContext::new().with_subject(subject)
        });
        let response = call(&container, read("/", ctx));
        assert_eq!(response.response_type(), expected);
        assert_eq!(response.path(), &ResourcePath::root());
    }

    #[test]
    fn unsupported_accept_is_not_acceptable() {
        let container = Container::builder().build().expect("container");
        let ctx = RequestContext::new().with_accept(MediaType::new("text", "csv"));
        let response = call(&container, read("/", ctx));
        assert_eq!(response.response_type(), ResponseType::NotAcceptable);
    }

    #[test]
    fn missing_paths_report_the_requested_path() {
        let container = Container::builder().build().expect("container");
        let response = call(&container, read("/nobody/home", RequestContext::new()));
        assert_eq!(response.response_type(), ResponseType::NoSuchResource);
        assert_eq!(response.path(), &ResourcePath::new("/nobody/home"));
    }

    #[test]
    fn subscriptions_collection_is_readable() {
        let container = Container::builder().build().expect("container");
        let response = call(&container, read("/_subscriptions", RequestContext::new()));
        let state = response.into_result().expect("subscriptions readable");
        assert_eq!(state.uri, Some(ResourcePath::new("/_subscriptions")));
        assert!(state.members.is_empty());
    }
}
