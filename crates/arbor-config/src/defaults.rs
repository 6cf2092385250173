//! Built-in configuration values.

#[cfg(unix)]
use std::env;

#[cfg(unix)]
use camino::Utf8PathBuf;
#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// TCP port used where Unix domain sockets are unavailable.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Log filter applied when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Worker threads absorbing blocking resource calls.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Jobs queued before the worker pool reports saturation.
pub const DEFAULT_WORKER_QUEUE_CAPACITY: usize = 256;

/// Bytes buffered while looking for the first line of a connection.
pub const DEFAULT_MAX_SNIFF_BYTES: usize = 8 * 1024;

/// Synchronous client call timeout. Zero waits indefinitely.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 0;

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned default log filter, for serde defaults.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default worker thread count.
#[must_use]
pub const fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

/// Default worker queue capacity.
#[must_use]
pub const fn default_worker_queue_capacity() -> usize {
    DEFAULT_WORKER_QUEUE_CAPACITY
}

/// Default first-line sniffing limit.
#[must_use]
pub const fn default_max_sniff_bytes() -> usize {
    DEFAULT_MAX_SNIFF_BYTES
}

/// Default synchronous call timeout.
#[must_use]
pub const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Default listener endpoint.
///
/// On Unix this is `arbor/arbord.sock` under the user's runtime directory,
/// falling back to a per-user directory under the system temp directory.
/// Elsewhere it is loopback TCP on [`DEFAULT_TCP_PORT`].
#[must_use]
pub fn default_listen_socket() -> SocketEndpoint {
    platform_listen_socket()
}

#[cfg(unix)]
fn platform_listen_socket() -> SocketEndpoint {
    let mut base = match runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok()) {
        Some(dir) => dir.join("arbor"),
        None => {
            let temp = Utf8PathBuf::from_path_buf(env::temp_dir())
                .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
            // SAFETY: geteuid has no preconditions and cannot fail.
            let uid = unsafe { geteuid() };
            temp.join("arbor").join(format!("uid-{uid}"))
        }
    };
    base.push("arbord.sock");
    SocketEndpoint::unix(base)
}

#[cfg(not(unix))]
fn platform_listen_socket() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
