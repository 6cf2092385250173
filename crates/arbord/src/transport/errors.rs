//! Failures binding and running the container's socket listener.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while the container binds its endpoint or runs the accept
/// loop.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured TCP host did not resolve.
    #[error("cannot resolve container endpoint {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    /// The TCP host resolved to no usable address.
    #[error("container endpoint {host}:{port} resolved to no address")]
    ResolveEmpty { host: String, port: u16 },
    /// Binding the TCP socket failed.
    #[error("cannot bind container endpoint tcp://{addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The bound socket refused non-blocking mode.
    #[error("cannot poll container listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    /// The accept-loop thread could not be started.
    #[error("cannot start container accept loop: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    /// A `unix://` endpoint was configured on a platform without Unix
    /// sockets.
    #[cfg(not(unix))]
    #[error("container endpoint {endpoint} needs Unix sockets")]
    UnsupportedUnix { endpoint: String },
    /// Binding the Unix socket failed.
    #[cfg(unix)]
    #[error("cannot bind container endpoint unix://{path}: {source}")]
    BindUnix {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Another process is accepting on the socket path.
    #[cfg(unix)]
    #[error("another container is listening on unix://{path}")]
    UnixInUse { path: String },
    /// Something other than a socket occupies the socket path.
    #[cfg(unix)]
    #[error("{path} exists and is not a socket")]
    UnixNotSocket { path: String },
    /// The socket path could not be inspected.
    #[cfg(unix)]
    #[error("cannot inspect {path}: {source}")]
    UnixMetadata {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Checking whether a leftover socket is live failed unexpectedly.
    #[cfg(unix)]
    #[error("cannot check whether unix://{path} is live: {source}")]
    UnixConnect {
        path: String,
        #[source]
        source: io::Error,
    },
    /// A leftover socket with no listener could not be removed.
    #[cfg(unix)]
    #[error("cannot remove stale socket {path}: {source}")]
    UnixCleanup {
        path: String,
        #[source]
        source: io::Error,
    },
    /// The accept loop panicked before it could be joined.
    #[error("container accept loop panicked")]
    ThreadPanic,
}
