//! Test helpers for the transport module.

use std::io::Read;
use std::sync::{Arc, Mutex};

use super::{ConnectionHandler, ConnectionStream};

/// Drains each connection and keeps what the peer sent.
pub(crate) struct RecordingHandler {
    received: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingHandler {
    pub(crate) fn new() -> (Arc<Mutex<Vec<Vec<u8>>>>, Arc<Self>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(Self {
            received: Arc::clone(&received),
        });
        (received, handler)
    }
}

impl ConnectionHandler for RecordingHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let mut bytes = Vec::new();
        let _ = stream.read_to_end(&mut bytes);
        self.received.lock().expect("received lock").push(bytes);
    }
}
