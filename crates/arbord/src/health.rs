//! Structured health reporting for container lifecycle events.

use std::sync::Arc;

use arbor_config::{Config, SocketEndpoint};

use crate::bootstrap::BootstrapError;
use crate::protocol::Protocol;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the listener accepts connections on `endpoint`.
    fn listener_started(&self, endpoint: &SocketEndpoint);

    /// Invoked when a connection ends and its subscriptions are released.
    fn connection_closed(&self, connection_id: &str, protocol: Option<Protocol>, released: usize);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_started(&self, endpoint: &SocketEndpoint) {
        (**self).listener_started(endpoint);
    }

    fn connection_closed(&self, connection_id: &str, protocol: Option<Protocol>, released: usize) {
        (**self).connection_closed(connection_id, protocol, released);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting container bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.listen_socket(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            worker_threads = config.worker_threads(),
            worker_queue_capacity = config.worker_queue_capacity(),
            "container bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "container bootstrap failed"
        );
    }

    fn listener_started(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_started",
            endpoint = %endpoint,
            "accepting connections"
        );
    }

    fn connection_closed(&self, connection_id: &str, protocol: Option<Protocol>, released: usize) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "connection_closed",
            connection = connection_id,
            protocol = protocol.map_or("none", Protocol::as_str),
            released,
            "connection closed"
        );
    }
}
