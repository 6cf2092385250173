//! Resource-oriented container daemon.
//!
//! The container exposes a tree of [`arbor_spi::Resource`]s addressed by
//! [`arbor_spi::ResourcePath`]. Every request walks the tree one segment at a
//! time through continuations, so a lookup that has to wait on a database or
//! a file never holds a connection thread; resources that block are run on a
//! bounded worker pool instead. The walk ends in exactly one terminal outcome
//! which is both returned to the requester and pushed to any subscription
//! watching the affected resource.
//!
//! Connections arrive through a socket listener. The first line of each
//! connection picks its pipeline: `CONNECT`/`STOMP` selects the subscription
//! pipeline, anything else the JSONL request pipeline. Bytes read while
//! deciding are replayed to the pipeline unchanged. JSONL clients may also
//! subscribe, and receive lifecycle pushes on the same connection.
//!
//! In-process callers use [`LocalConnector`] with an
//! [`arbor_client::Client`], which behaves exactly like a socket client.

mod bootstrap;
mod codecs;
mod container;
mod health;
mod launch;
mod pipeline;
mod protocol;
mod resolver;
mod shutdown;
mod subscriptions;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use codecs::CodecManager;
pub use container::{
    Container, ContainerBuilder, LocalConnection, LocalConnector, RootDirectory, WORKER_POOL_NAME,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use launch::{LaunchError, run_daemon};
pub use pipeline::{DispatchError, JsonlPipeline, MAX_REQUEST_BYTES};
pub use protocol::{
    ClosingPipeline, Pipeline, Protocol, ProtocolDetector, ProtocolMultiplexer, ReplayStream,
    SniffError, Sniffed, sniff,
};
pub use resolver::dispatch_request;
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use subscriptions::{
    Action, DeliveryReport, PushConnection, PushMessage, SUBSCRIPTIONS_ID, Subscription,
    SubscriptionError, SubscriptionManager, SubscriptionResource, SubscriptionsCollection,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    ConnectionHandler, ConnectionStream, ListenerError, ListenerHandle, SocketListener,
};

#[cfg(test)]
mod tests;
