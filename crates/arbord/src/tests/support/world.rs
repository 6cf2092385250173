//! Scenario world for suites driving a container directly.

use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use arbor_spi::{
    AuthorizationDecision, AuthorizationPolicy, Execution, MediaType, ResourcePath,
    ResourceRequest, ResourceResponse, ResponseType, WorkerPool,
};
use serde_json::Value;

use super::{
    CallLog, MemoryNode, PanickingNode, RESPONSE_WAIT, RecordingConnection, dispatch_and_wait,
};
use crate::container::Container;
use crate::pipeline::JsonlPipeline;

/// Rejects every request.
struct DenyAll;

impl AuthorizationPolicy for DenyAll {
    fn decide(&self, _request: &ResourceRequest) -> AuthorizationDecision {
        AuthorizationDecision::Reject
    }
}

/// A container, the resources mounted in it, and the last response seen.
pub struct ContainerWorld {
    // Declared before `container`: a jammed worker waits on it.
    release: Option<mpsc::Sender<()>>,
    container: Arc<Container>,
    calls: Arc<CallLog>,
    nodes: HashMap<String, Arc<MemoryNode>>,
    connections: HashMap<String, Arc<RecordingConnection>>,
    responses: Vec<ResourceResponse>,
    caller: Option<String>,
    released: Option<usize>,
    jsonl_output: Vec<u8>,
}

impl ContainerWorld {
    pub fn new() -> Self {
        let container = Container::builder()
            .worker_threads(2)
            .build()
            .expect("container");
        Self::around(container)
    }

    fn around(container: Arc<Container>) -> Self {
        Self {
            release: None,
            container,
            calls: Arc::new(CallLog::default()),
            nodes: HashMap::new(),
            connections: HashMap::new(),
            responses: Vec::new(),
            caller: None,
            released: None,
            jsonl_output: Vec::new(),
        }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn calls(&self) -> &CallLog {
        &self.calls
    }

    /// Replaces the container with one holding a rejecting policy.
    pub fn deny_everything(&mut self) {
        let container = Container::builder()
            .policy(Arc::new(DenyAll))
            .build()
            .expect("container");
        *self = Self::around(container);
    }

    /// Replaces the container with one whose single worker is busy and
    /// whose one-slot queue is full.
    pub fn saturate_pool(&mut self) {
        let pool = Arc::new(WorkerPool::new("jammed", 1, 1).expect("pool"));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        pool.submit(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        })
        .expect("jam worker");
        started_rx.recv_timeout(RESPONSE_WAIT).expect("worker jammed");
        pool.submit(|| {}).expect("fill queue");

        let container = Container::builder()
            .worker_pool(pool)
            .build()
            .expect("container");
        *self = Self::around(container);
        self.release = Some(release_tx);
    }

    pub fn mount(&mut self, id: &str, execution: Execution) {
        let node = MemoryNode::top_level(id, execution, Arc::clone(&self.calls));
        self.container.mount(node.clone()).expect("mount");
        self.nodes.insert(id.to_owned(), node);
    }

    pub fn add_member(&mut self, parent: &str, id: &str) {
        let member = self.node(parent).add(id);
        self.nodes.insert(format!("{parent}/{id}"), member);
    }

    pub fn add_member_with(&mut self, parent: &str, id: &str, execution: Execution) {
        let member = self.node(parent).add_with(id, execution);
        self.nodes.insert(format!("{parent}/{id}"), member);
    }

    pub fn mount_panicking(&mut self, id: &str) {
        self.container
            .mount(PanickingNode::new(id))
            .expect("mount");
    }

    pub fn node(&self, path: &str) -> Arc<MemoryNode> {
        Arc::clone(self.nodes.get(path).expect("known node"))
    }

    pub fn perform(&mut self, request: ResourceRequest) {
        self.caller = thread::current().name().map(str::to_owned);
        let response = dispatch_and_wait(&self.container, request);
        self.responses.push(response);
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    pub fn response(&self) -> &ResourceResponse {
        self.responses.last().expect("a response was received")
    }

    pub fn responses(&self) -> &[ResourceResponse] {
        &self.responses
    }

    /// Returns the named connection, creating it on first use.
    pub fn connect(&mut self, id: &str, failing: bool) -> Arc<RecordingConnection> {
        let connection = self.connections.entry(id.to_owned()).or_insert_with(|| {
            Arc::new(if failing {
                RecordingConnection::failing(id)
            } else {
                RecordingConnection::new(id)
            })
        });
        Arc::clone(connection)
    }

    pub fn connection(&self, id: &str) -> Arc<RecordingConnection> {
        Arc::clone(self.connections.get(id).expect("known connection"))
    }

    pub fn subscribe(&mut self, connection: &str, subscription: &str, destination: &str) {
        let connection = self.connection(connection);
        self.container
            .subscribe(
                connection,
                subscription,
                ResourcePath::new(destination),
                MediaType::json(),
            )
            .expect("subscribe");
    }

    pub fn close_connection(&mut self, id: &str) {
        self.released = Some(self.container.connection_closed(id));
    }

    pub fn released(&self) -> Option<usize> {
        self.released
    }

    /// Serves `input` as one JSONL connection and keeps everything written
    /// back to it.
    pub fn serve_jsonl(&mut self, connection: &str, input: Vec<u8>) {
        let output = Arc::new(Mutex::new(Vec::new()));
        JsonlPipeline::new(Arc::clone(&self.container))
            .serve(connection, Cursor::new(input), SharedWriter(Arc::clone(&output)))
            .expect("serve");
        self.jsonl_output = output.lock().expect("output lock").clone();
    }

    /// Lines written back by the last [`ContainerWorld::serve_jsonl`].
    pub fn jsonl_lines(&self) -> Vec<&[u8]> {
        self.jsonl_output
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .collect()
    }
}

impl Default for ContainerWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends to a buffer the test keeps a handle on.
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("output lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parses an upper-case response kind such as `NO_SUCH_RESOURCE`.
pub fn parse_kind(kind: &str) -> ResponseType {
    serde_json::from_value(Value::String(kind.to_ascii_lowercase())).expect("known response kind")
}
