//! Request pipeline speaking one JSON message per line.

use std::io::{Read, Write};
use std::sync::{Arc, Condvar, Mutex};

use arbor_spi::wire::{UNPARSED_REQUEST_ID, WireCommand, WireError, WireInbound, WireResponse};
use arbor_spi::{MediaType, ResourcePath, ResponseType};
use tracing::{debug, trace, warn};

use super::errors::DispatchError;
use super::push::JsonlPushConnection;
use super::reader::LineReader;
use super::{MAX_REQUEST_BYTES, PIPELINE_TARGET};
use crate::container::Container;
use crate::protocol::{Pipeline, ReplayStream};
use crate::subscriptions::{SUBSCRIPTIONS_ID, SubscriptionError};
use crate::transport::ConnectionStream;

/// Serves `WireRequest` and `WireCommand` lines against a [`Container`].
///
/// Requests on one connection are dispatched as they arrive; responses are
/// written in completion order and carry the request's id. Subscriptions
/// made over the connection push their events on the same writer. The
/// connection is held open after the client stops sending until every
/// response is out, and its subscriptions are released when it ends.
pub struct JsonlPipeline {
    container: Arc<Container>,
    max_line: usize,
}

impl JsonlPipeline {
    /// Creates a pipeline accepting lines up to [`MAX_REQUEST_BYTES`].
    #[must_use]
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            container,
            max_line: MAX_REQUEST_BYTES,
        }
    }

    /// Overrides the longest accepted request line.
    #[must_use]
    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    /// Reads requests from `reader` until EOF and writes responses to
    /// `writer`. Returns the number of lines handled.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when reading fails or a line exceeds the
    /// limit. The over-long line is answered before the error is returned.
    pub fn serve<R, W>(
        &self,
        connection_id: &str,
        reader: R,
        writer: W,
    ) -> Result<usize, DispatchError>
    where
        R: Read,
        W: Write + Send + 'static,
    {
        let writer = Arc::new(Mutex::new(writer));
        let in_flight = Arc::new(InFlight::default());
        let mut lines = LineReader::new(reader, self.max_line);
        let mut handled = 0;

        let result = loop {
            match lines.next_line() {
                Ok(Some(line)) => {
                    handled += 1;
                    self.handle_line(connection_id, &line, &writer, &in_flight);
                }
                Ok(None) => break Ok(handled),
                Err(error @ DispatchError::RequestTooLarge { .. }) => {
                    warn!(target: PIPELINE_TARGET, connection = connection_id, %error, "rejecting request");
                    write_reply(&writer, &rejection(&error), connection_id);
                    break Err(error);
                }
                Err(error) => break Err(error),
            }
        };

        in_flight.wait();
        let released = self.container.connection_closed(connection_id);
        if released > 0 {
            debug!(
                target: PIPELINE_TARGET,
                connection = connection_id,
                released,
                "released subscriptions"
            );
        }
        result
    }

    fn handle_line<W>(
        &self,
        connection_id: &str,
        line: &[u8],
        writer: &Arc<Mutex<W>>,
        in_flight: &Arc<InFlight>,
    ) where
        W: Write + Send + 'static,
    {
        let wire = match WireInbound::parse(line) {
            Ok(WireInbound::Request(wire)) => wire,
            Ok(WireInbound::Command(command)) => {
                self.handle_command(connection_id, command, writer);
                return;
            }
            Err(WireError::Empty) => {
                trace!(target: PIPELINE_TARGET, connection = connection_id, "skipping blank line");
                return;
            }
            Err(error) => {
                warn!(target: PIPELINE_TARGET, connection = connection_id, %error, "malformed request");
                write_reply(writer, &WireResponse::unparsed(&error), connection_id);
                return;
            }
        };

        let (id, request) = wire.into_request();
        debug!(
            target: PIPELINE_TARGET,
            connection = connection_id,
            id,
            verb = %request.request_type(),
            path = %request.path(),
            "dispatching request"
        );

        let pending = InFlight::begin(in_flight);
        let writer = Arc::clone(writer);
        let connection = connection_id.to_owned();
        self.container.dispatch_then(
            request,
            move |response| {
                write_reply(&writer, &WireResponse::from_response(id, &response), &connection);
            },
            move || drop(pending),
        );
    }

    fn handle_command<W>(&self, connection_id: &str, command: WireCommand, writer: &Arc<Mutex<W>>)
    where
        W: Write + Send + 'static,
    {
        let id = command.id();
        let reply = match command {
            WireCommand::Subscribe {
                subscription,
                destination,
                content_type,
                ..
            } => {
                let push = Arc::new(JsonlPushConnection::new(connection_id, Arc::clone(writer)));
                let media_type = content_type.unwrap_or_else(MediaType::json);
                match self.container.subscribe(
                    push,
                    &subscription,
                    destination.clone(),
                    media_type,
                ) {
                    Ok(_) => command_reply(id, ResponseType::Ok, destination, None),
                    Err(error) => {
                        debug!(
                            target: PIPELINE_TARGET,
                            connection = connection_id,
                            subscription = %subscription,
                            %error,
                            "subscribe refused"
                        );
                        let kind = match &error {
                            SubscriptionError::NotAcceptable { .. } => ResponseType::NotAcceptable,
                            SubscriptionError::Duplicate { .. } => {
                                ResponseType::ResourceAlreadyExists
                            }
                            _ => ResponseType::InternalError,
                        };
                        command_reply(id, kind, destination, Some(error.to_string()))
                    }
                }
            }
            WireCommand::Unsubscribe { subscription, .. } => {
                let path = ResourcePath::root()
                    .child(SUBSCRIPTIONS_ID)
                    .child(format!("{connection_id}-{subscription}"));
                match self.container.unsubscribe(connection_id, &subscription) {
                    Some(_) => command_reply(id, ResponseType::Ok, path, None),
                    None => command_reply(id, ResponseType::NoSuchResource, path, None),
                }
            }
        };
        write_reply(writer, &reply, connection_id);
    }
}

fn command_reply(
    id: u64,
    response_type: ResponseType,
    path: ResourcePath,
    message: Option<String>,
) -> WireResponse {
    WireResponse {
        id,
        response_type,
        path,
        state: None,
        message,
    }
}

impl Pipeline for JsonlPipeline {
    fn run(&self, connection_id: &str, stream: ReplayStream<ConnectionStream>) {
        let writer = match stream.get_ref().try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!(target: PIPELINE_TARGET, connection = connection_id, %error, "cannot split stream");
                return;
            }
        };
        match self.serve(connection_id, stream, writer) {
            Ok(handled) => debug!(
                target: PIPELINE_TARGET,
                connection = connection_id,
                handled,
                "client finished"
            ),
            Err(error) => warn!(
                target: PIPELINE_TARGET,
                connection = connection_id,
                %error,
                "connection ended with error"
            ),
        }
    }
}

fn rejection(error: &DispatchError) -> WireResponse {
    WireResponse {
        id: UNPARSED_REQUEST_ID,
        response_type: ResponseType::InternalError,
        path: ResourcePath::root(),
        state: None,
        message: Some(error.to_string()),
    }
}

fn write_reply<W: Write>(writer: &Mutex<W>, response: &WireResponse, connection_id: &str) {
    let line = match response.to_line() {
        Ok(line) => line,
        Err(error) => {
            warn!(target: PIPELINE_TARGET, connection = connection_id, %error, "cannot encode response");
            return;
        }
    };
    let Ok(mut writer) = writer.lock() else {
        warn!(target: PIPELINE_TARGET, connection = connection_id, "response writer poisoned");
        return;
    };
    if let Err(error) = writer.write_all(&line).and_then(|()| writer.flush()) {
        debug!(
            target: PIPELINE_TARGET,
            connection = connection_id,
            id = response.id,
            %error,
            "client gone before response"
        );
    }
}

/// Counts dispatched requests whose response is not yet written.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    drained: Condvar,
}

impl InFlight {
    fn begin(this: &Arc<Self>) -> Pending {
        if let Ok(mut count) = this.count.lock() {
            *count += 1;
        }
        Pending(Arc::clone(this))
    }

    fn end(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.drained.notify_all();
            }
        }
    }

    fn wait(&self) {
        let Ok(mut count) = self.count.lock() else {
            return;
        };
        while *count > 0 {
            count = match self.drained.wait(count) {
                Ok(count) => count,
                Err(_) => return,
            };
        }
    }
}

/// Marks one outstanding response; dropping it completes the response.
struct Pending(Arc<InFlight>);

impl Drop for Pending {
    fn drop(&mut self) {
        self.0.end();
    }
}
