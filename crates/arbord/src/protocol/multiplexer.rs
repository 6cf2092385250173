//! Routes each accepted connection to the pipeline its first line selects.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use super::{PROTOCOL_TARGET, Protocol, ReplayStream, sniff};
use crate::container::Container;
use crate::health::HealthReporter;
use crate::transport::{ConnectionHandler, ConnectionStream};

/// Serves a connection after its protocol is known.
pub trait Pipeline: Send + Sync {
    /// Runs until the connection ends. `stream` replays the sniffed bytes
    /// first.
    fn run(&self, connection_id: &str, stream: ReplayStream<ConnectionStream>);
}

/// Pipeline that logs the connection and closes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosingPipeline;

impl Pipeline for ClosingPipeline {
    fn run(&self, connection_id: &str, stream: ReplayStream<ConnectionStream>) {
        info!(
            target: PROTOCOL_TARGET,
            connection = connection_id,
            buffered = stream.pending().len(),
            "no pipeline installed for protocol; closing"
        );
        if let Err(error) = stream.get_ref().shutdown() {
            debug!(target: PROTOCOL_TARGET, connection = connection_id, %error, "shutdown failed");
        }
    }
}

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// [`ConnectionHandler`] that sniffs each connection and hands it on.
///
/// When a connection ends, its subscriptions are released from the
/// container.
pub struct ProtocolMultiplexer {
    container: Arc<Container>,
    stomp: Arc<dyn Pipeline>,
    http: Arc<dyn Pipeline>,
    max_sniff_bytes: usize,
    reporter: Arc<dyn HealthReporter>,
}

impl ProtocolMultiplexer {
    /// Creates a multiplexer over the two pipelines.
    pub fn new(
        container: Arc<Container>,
        stomp: Arc<dyn Pipeline>,
        http: Arc<dyn Pipeline>,
        max_sniff_bytes: usize,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            container,
            stomp,
            http,
            max_sniff_bytes,
            reporter,
        }
    }

    fn pipeline(&self, protocol: Protocol) -> &Arc<dyn Pipeline> {
        match protocol {
            Protocol::Stomp => &self.stomp,
            Protocol::Http => &self.http,
        }
    }
}

impl ConnectionHandler for ProtocolMultiplexer {
    fn handle(&self, mut stream: ConnectionStream) {
        let connection_id = format!("conn-{}", NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed));
        let protocol = match sniff(&mut stream, self.max_sniff_bytes) {
            Ok(Some(sniffed)) => {
                debug!(
                    target: PROTOCOL_TARGET,
                    connection = %connection_id,
                    protocol = %sniffed.protocol,
                    buffered = sniffed.replay.len(),
                    "protocol detected"
                );
                self.pipeline(sniffed.protocol)
                    .run(&connection_id, ReplayStream::new(sniffed.replay, stream));
                Some(sniffed.protocol)
            }
            Ok(None) => {
                debug!(
                    target: PROTOCOL_TARGET,
                    connection = %connection_id,
                    "connection closed before its first line"
                );
                None
            }
            Err(error) => {
                warn!(
                    target: PROTOCOL_TARGET,
                    connection = %connection_id,
                    %error,
                    "protocol detection failed"
                );
                None
            }
        };
        let released = self.container.connection_closed(&connection_id);
        self.reporter
            .connection_closed(&connection_id, protocol, released);
    }
}
