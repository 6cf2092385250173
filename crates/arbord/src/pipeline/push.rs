//! Lifecycle pushes written back over a JSONL connection.

use std::io::Write;
use std::sync::{Arc, Mutex};

use arbor_spi::wire::WirePush;

use crate::subscriptions::{PushConnection, PushMessage, SubscriptionError};

/// Writes push lines on the same writer as the connection's responses.
pub(super) struct JsonlPushConnection<W> {
    connection_id: String,
    writer: Arc<Mutex<W>>,
}

impl<W> JsonlPushConnection<W> {
    pub(super) fn new(connection_id: &str, writer: Arc<Mutex<W>>) -> Self {
        Self {
            connection_id: connection_id.to_owned(),
            writer,
        }
    }

    fn failure(&self, message: impl Into<String>) -> SubscriptionError {
        SubscriptionError::send(&self.connection_id, message)
    }
}

impl<W: Write + Send> PushConnection for JsonlPushConnection<W> {
    fn connection_id(&self) -> String {
        self.connection_id.clone()
    }

    fn send(&self, message: PushMessage) -> Result<(), SubscriptionError> {
        let body = String::from_utf8(message.body.to_vec())
            .map_err(|_| self.failure(format!("{} body is not UTF-8", message.content_type)))?;
        let line = WirePush {
            event: message.action.as_str().to_owned(),
            subscription: message.subscription,
            content_type: message.content_type,
            status: message.status,
            location: message.location,
            body,
        }
        .to_line()
        .map_err(|error| self.failure(error.to_string()))?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| self.failure("push writer poisoned"))?;
        writer
            .write_all(&line)
            .and_then(|()| writer.flush())
            .map_err(|error| self.failure(error.to_string()))
    }
}
