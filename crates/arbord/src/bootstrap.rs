//! Container bootstrap orchestration.

use std::sync::Arc;

use arbor_config::{Config, SocketEndpoint, SocketPreparationError};
use arbor_spi::PoolError;
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use crate::container::Container;
use crate::health::HealthReporter;
use crate::pipeline::JsonlPipeline;
use crate::protocol::{ClosingPipeline, ProtocolMultiplexer};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the container configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare container socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The worker pool could not be started.
    #[error("failed to start worker pool: {source}")]
    Pool {
        /// Underlying pool error.
        #[source]
        source: PoolError,
    },
    /// The listener could not be bound or started.
    #[error("failed to start listener: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
}

/// A running container: configuration, resource graph, and listener.
pub struct Daemon {
    config: Config,
    container: Arc<Container>,
    listener: ListenerHandle,
    telemetry: TelemetryHandle,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The container serving requests; mount resources here.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Endpoint actually listened on. TCP port zero is replaced by the port
    /// the OS assigned.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        self.listener.endpoint()
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Stops accepting connections and drains the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the accept loop panicked.
    pub fn shutdown(self) -> Result<(), ListenerError> {
        self.listener.shutdown();
        let joined = self.listener.join();
        self.container.pool().shutdown();
        joined
    }
}

/// Bootstraps the container using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first stage that fails; the reporter
/// sees the same error first.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    let failed = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    let config = loader
        .load()
        .map_err(|source| failed(BootstrapError::Configuration { source }))?;
    let telemetry = telemetry::initialise(&config)
        .map_err(|source| failed(BootstrapError::Telemetry { source }))?;
    config
        .listen_socket()
        .prepare_filesystem()
        .map_err(|source| failed(BootstrapError::Socket { source }))?;

    let container = Container::from_config(&config)
        .map_err(|source| failed(BootstrapError::Pool { source }))?;
    let listener = SocketListener::bind(config.listen_socket())
        .map_err(|source| failed(BootstrapError::Listener { source }))?;
    let multiplexer = ProtocolMultiplexer::new(
        Arc::clone(&container),
        Arc::new(ClosingPipeline),
        Arc::new(JsonlPipeline::new(Arc::clone(&container))),
        config.max_sniff_bytes(),
        Arc::clone(&reporter),
    );
    let listener = listener
        .start(Arc::new(multiplexer))
        .map_err(|source| failed(BootstrapError::Listener { source }))?;

    reporter.listener_started(listener.endpoint());
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon {
        config,
        container,
        listener,
        telemetry,
    })
}
