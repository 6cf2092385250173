//! Socket connections speaking the daemon's JSONL protocol.
//!
//! Requests are written one per line under a connection-local id. A reader
//! thread matches response lines to pending handlers by that id and hands
//! each handler to the connection's executor. When the socket ends, every
//! handler still pending receives an internal error.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use arbor_config::SocketEndpoint;
use arbor_spi::wire::{UNPARSED_REQUEST_ID, WirePush, WireRequest, WireResponse};
use arbor_spi::{ResourceError, ResourcePath, ResourceRequest, ResourceResponse, WorkerPool};
#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};
use tracing::{debug, warn};

use crate::{ClientError, Connection, Connector, ResponseHandler};

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Upper bound on establishing a socket connection.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Connects to `tcp://` and `unix://` addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketConnector;

impl Connector for SocketConnector {
    fn connect(
        &self,
        address: &str,
        executor: Arc<WorkerPool>,
    ) -> Result<Arc<dyn Connection>, ClientError> {
        let endpoint: SocketEndpoint = address
            .parse()
            .map_err(|error| ClientError::connect(address, error))?;
        let stream = open(&endpoint).map_err(|error| ClientError::connect(address, error))?;
        let connection = SocketConnection::start(stream, executor)
            .map_err(|error| ClientError::connect(address, error))?;
        debug!(
            target: TRANSPORT_TARGET,
            connection = connection.id(),
            %endpoint,
            "connected"
        );
        Ok(connection)
    }
}

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

fn open(endpoint: &SocketEndpoint) -> io::Result<Stream> {
    match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let address = resolve_tcp_address(host, *port)?;
            TcpStream::connect_timeout(&address, CONNECTION_TIMEOUT).map(Stream::Tcp)
        }
        SocketEndpoint::Unix { path } => {
            #[cfg(unix)]
            {
                connect_unix(path.as_str())
            }

            #[cfg(not(unix))]
            {
                Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("platform does not support Unix sockets: {path}"),
                ))
            }
        }
    }
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

#[cfg(unix)]
fn connect_unix(path: &str) -> io::Result<Stream> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, CONNECTION_TIMEOUT)?;
    let stream: UnixStream = socket.into();
    Ok(Stream::Unix(stream))
}

/// Handlers awaiting a response, keyed by request id.
///
/// Once closed, no further handler is admitted. Closing and admitting share
/// the lock, so a handler is either failed by the close or refused up front.
#[derive(Default)]
struct Pending {
    state: Mutex<PendingState>,
}

#[derive(Default)]
struct PendingState {
    closed: bool,
    handlers: HashMap<u64, (ResourcePath, ResponseHandler)>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, PendingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self, request_id: u64, path: ResourcePath, handler: ResponseHandler) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.handlers.insert(request_id, (path, handler));
        true
    }

    fn take(&self, request_id: u64) -> Option<(ResourcePath, ResponseHandler)> {
        self.lock().handlers.remove(&request_id)
    }

    fn close(&self) -> Vec<(ResourcePath, ResponseHandler)> {
        let mut state = self.lock();
        state.closed = true;
        state.handlers.drain().map(|(_, entry)| entry).collect()
    }
}

/// A JSONL connection to a running daemon.
pub struct SocketConnection {
    id: String,
    writer: Mutex<Stream>,
    pending: Arc<Pending>,
    executor: Arc<WorkerPool>,
    next_request: AtomicU64,
    closed: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SocketConnection {
    fn start(stream: Stream, executor: Arc<WorkerPool>) -> io::Result<Arc<Self>> {
        let id = format!(
            "socket-{}",
            NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed)
        );
        let read_half = stream.try_clone()?;
        let pending = Arc::new(Pending::default());

        let reader = {
            let pending = Arc::clone(&pending);
            let executor = Arc::clone(&executor);
            let id = id.clone();
            thread::Builder::new()
                .name(format!("{id}-reader"))
                .spawn(move || {
                    read_responses(&id, read_half, &pending, &executor);
                    fail_pending(&pending, &executor, "connection closed");
                })?
        };

        Ok(Arc::new(Self {
            id,
            writer: Mutex::new(stream),
            pending,
            executor,
            next_request: AtomicU64::new(UNPARSED_REQUEST_ID + 1),
            closed: AtomicBool::new(false),
            reader: Mutex::new(Some(reader)),
        }))
    }

    fn send_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line)?;
        writer.flush()
    }
}

impl Connection for SocketConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(&self, request: ResourceRequest, handler: ResponseHandler) -> Result<(), ClientError> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let line = WireRequest::from_request(request_id, &request)
            .to_line()
            .map_err(ClientError::send)?;
        if !self
            .pending
            .admit(request_id, request.path().clone(), handler)
        {
            return Err(ClientError::send("connection closed"));
        }
        if let Err(error) = self.send_line(&line) {
            if self.pending.take(request_id).is_some() {
                return Err(ClientError::send(error));
            }
            // The close that broke the socket already failed this handler.
            debug!(target: TRANSPORT_TARGET, connection = %self.id, request_id, %error, "write raced close");
        }
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(error) = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown()
        {
            debug!(target: TRANSPORT_TARGET, connection = %self.id, %error, "socket shutdown failed");
        }
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reader) = reader
            && reader.thread().id() != thread::current().id()
            && reader.join().is_err()
        {
            warn!(target: TRANSPORT_TARGET, connection = %self.id, "reader thread panicked");
        }
        fail_pending(&self.pending, &self.executor, "connection closed");
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_responses(id: &str, stream: Stream, pending: &Pending, executor: &WorkerPool) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => deliver(id, &line, pending, executor),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => {
                debug!(target: TRANSPORT_TARGET, connection = id, %error, "read failed");
                break;
            }
        }
    }
}

fn deliver(id: &str, line: &[u8], pending: &Pending, executor: &WorkerPool) {
    let response = match WireResponse::parse(line) {
        Ok(response) => response,
        Err(_) if WirePush::parse(line).is_ok() => {
            debug!(target: TRANSPORT_TARGET, connection = id, "ignoring subscription push");
            return;
        }
        Err(error) => {
            warn!(target: TRANSPORT_TARGET, connection = id, %error, "discarding unreadable response");
            return;
        }
    };
    let (request_id, response) = response.into_response();
    if request_id == UNPARSED_REQUEST_ID {
        warn!(
            target: TRANSPORT_TARGET,
            connection = id,
            message = response.message().unwrap_or_default(),
            "daemon could not parse a request"
        );
        return;
    }
    match pending.take(request_id) {
        Some((_, handler)) => executor.execute(move || handler(response)),
        None => warn!(
            target: TRANSPORT_TARGET,
            connection = id,
            request_id,
            "response for unknown request"
        ),
    }
}

fn fail_pending(pending: &Pending, executor: &WorkerPool, reason: &str) {
    for (path, handler) in pending.close() {
        let response = ResourceResponse::error(path, &ResourceError::internal(reason));
        executor.execute(move || handler(response));
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::mpsc;

    use arbor_spi::{RequestType, ResponseType};

    use super::*;

    fn pool() -> Arc<WorkerPool> {
        Arc::new(WorkerPool::new("client-test", 1, 16).expect("pool"))
    }

    fn read_request(path: &str) -> ResourceRequest {
        ResourceRequest::builder(RequestType::Read, ResourcePath::new(path)).build()
    }

    #[test]
    fn matches_responses_to_requests_by_id() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let address = format!("tcp://{}", listener.local_addr().expect("addr"));
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut writer = stream.try_clone().expect("clone");
            let mut reader = BufReader::new(stream);
            let mut requests = Vec::new();
            for _ in 0..2 {
                let mut line = Vec::new();
                reader.read_until(b'\n', &mut line).expect("read");
                requests.push(WireRequest::parse(&line).expect("request"));
            }
            for request in requests.into_iter().rev() {
                let response = ResourceResponse::ok(
                    request.path.clone(),
                    arbor_spi::ResourceState::new().with_uri(request.path.clone()),
                );
                let line = WireResponse::from_response(request.id, &response)
                    .to_line()
                    .expect("line");
                writer.write_all(&line).expect("write");
            }
        });

        let connection = SocketConnector.connect(&address, pool()).expect("connect");
        let (sender, receiver) = mpsc::channel();
        for path in ["/a", "/b"] {
            let sender = sender.clone();
            connection
                .write(
                    read_request(path),
                    Box::new(move |response| {
                        let _ = sender.send(response);
                    }),
                )
                .expect("write");
        }
        let mut paths: Vec<String> = (0..2)
            .map(|_| {
                let response = receiver
                    .recv_timeout(Duration::from_secs(5))
                    .expect("response");
                assert_eq!(
                    response.state().and_then(|state| state.uri.clone()),
                    Some(response.path().clone())
                );
                response.path().to_string()
            })
            .collect();
        paths.sort();
        assert_eq!(paths, ["/a", "/b"]);
        server.join().expect("server");
        connection.close();
    }

    #[test]
    fn pending_requests_fail_when_the_daemon_hangs_up() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let address = format!("tcp://{}", listener.local_addr().expect("addr"));
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut line = Vec::new();
            reader.read_until(b'\n', &mut line).expect("read");
        });

        let connection = SocketConnector.connect(&address, pool()).expect("connect");
        let (sender, receiver) = mpsc::channel();
        connection
            .write(
                read_request("/slow"),
                Box::new(move |response| {
                    let _ = sender.send(response);
                }),
            )
            .expect("write");
        server.join().expect("server");

        let response = receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("failure delivered");
        assert_eq!(response.response_type(), ResponseType::InternalError);
        assert_eq!(response.path(), &ResourcePath::new("/slow"));
    }

    #[test]
    fn writes_after_close_are_refused_without_running_the_handler() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let address = format!("tcp://{}", listener.local_addr().expect("addr"));
        let server = thread::spawn(move || listener.accept().map(|_| ()));

        let connection = SocketConnector.connect(&address, pool()).expect("connect");
        connection.close();
        let (sender, receiver) = mpsc::channel::<ResourceResponse>();
        let result = connection.write(
            read_request("/late"),
            Box::new(move |response| {
                let _ = sender.send(response);
            }),
        );

        assert!(matches!(result, Err(ClientError::Send { .. })));
        assert!(receiver.recv_timeout(Duration::from_millis(200)).is_err());
        server.join().expect("server").expect("accept");
    }

    #[test]
    fn connections_can_be_shared_across_threads() {
        fn assert_shareable<T: Send + Sync>() {}
        assert_shareable::<SocketConnection>();
        assert_shareable::<Pending>();
    }

    #[test]
    fn unreachable_addresses_fail_to_connect() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let address = format!("tcp://{}", listener.local_addr().expect("addr"));
        drop(listener);
        let result = SocketConnector.connect(&address, pool());
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }

    #[test]
    fn rejects_unparseable_addresses() {
        let result = SocketConnector.connect("carrier-pigeon://coop", pool());
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }
}
