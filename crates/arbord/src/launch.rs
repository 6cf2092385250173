//! Runs the container until a shutdown signal arrives.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::transport::ListenerError;

const LAUNCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::launch");

/// Errors ending a container run.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Signal handling could not be installed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// The listener did not stop cleanly.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Runs the container using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, signal handling, or shutdown
/// fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        &SystemShutdownSignal,
    )
}

/// Runs the container with injected collaborators.
pub(crate) fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let daemon = bootstrap_with(loader, reporter)?;
    info!(target: LAUNCH_TARGET, endpoint = %daemon.endpoint(), "container running");
    shutdown.wait()?;
    daemon.shutdown()?;
    info!(target: LAUNCH_TARGET, "shutdown sequence completed");
    Ok(())
}
