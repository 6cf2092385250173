//! Layered configuration for the arbor container daemon and its clients.
//!
//! Values are merged by `ortho_config` from built-in defaults, an optional
//! configuration file (`--config-path` or `ARBOR_CONFIG_PATH`), environment
//! variables prefixed `ARBOR_`, and command-line flags, in increasing order of
//! precedence.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_SNIFF_BYTES, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TCP_PORT,
    DEFAULT_WORKER_QUEUE_CAPACITY, DEFAULT_WORKER_THREADS, default_listen_socket,
    default_log_filter, default_log_format, default_max_sniff_bytes, default_request_timeout_ms,
    default_worker_queue_capacity, default_worker_threads,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration shared by `arbord` and `arbor-client`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "ARBOR")]
#[serde(default)]
pub struct Config {
    /// Endpoint the daemon listens on and clients connect to.
    #[ortho_config(default = defaults::default_listen_socket())]
    #[serde(default = "defaults::default_listen_socket")]
    pub listen_socket: SocketEndpoint,
    /// `tracing` filter directive.
    #[ortho_config(default = defaults::default_log_filter_string())]
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Threads in the blocking worker pool.
    #[ortho_config(default = defaults::default_worker_threads())]
    #[serde(default = "defaults::default_worker_threads")]
    pub worker_threads: usize,
    /// Jobs queued before the pool reports saturation.
    #[ortho_config(default = defaults::default_worker_queue_capacity())]
    #[serde(default = "defaults::default_worker_queue_capacity")]
    pub worker_queue_capacity: usize,
    /// Longest first line accepted while detecting a connection's protocol.
    #[ortho_config(default = defaults::default_max_sniff_bytes())]
    #[serde(default = "defaults::default_max_sniff_bytes")]
    pub max_sniff_bytes: usize,
    /// Timeout for synchronous client calls in milliseconds. Zero waits
    /// indefinitely.
    #[ortho_config(default = defaults::default_request_timeout_ms())]
    #[serde(default = "defaults::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_listen_socket(),
            log_filter: defaults::default_log_filter_string(),
            log_format: default_log_format(),
            worker_threads: default_worker_threads(),
            worker_queue_capacity: default_worker_queue_capacity(),
            max_sniff_bytes: default_max_sniff_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Config {
    /// Listener endpoint.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Worker pool size, never zero.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.worker_threads.max(1)
    }

    /// Worker queue capacity, never zero.
    #[must_use]
    pub fn worker_queue_capacity(&self) -> usize {
        self.worker_queue_capacity.max(1)
    }

    /// First-line sniffing limit in bytes.
    #[must_use]
    pub fn max_sniff_bytes(&self) -> usize {
        self.max_sniff_bytes
    }

    /// Synchronous call timeout, or `None` to wait indefinitely.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}
