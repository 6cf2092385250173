//! Push connection double.

use std::sync::Mutex;

use crate::subscriptions::{PushConnection, PushMessage, SubscriptionError};

/// Collects pushed messages, or refuses every send when `failing`.
pub struct RecordingConnection {
    id: String,
    failing: bool,
    received: Mutex<Vec<PushMessage>>,
}

impl RecordingConnection {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            failing: false,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(id: &str) -> Self {
        Self {
            failing: true,
            ..Self::new(id)
        }
    }

    pub fn received(&self) -> Vec<PushMessage> {
        self.received.lock().expect("received lock").clone()
    }
}

impl PushConnection for RecordingConnection {
    fn connection_id(&self) -> String {
        self.id.clone()
    }

    fn send(&self, message: PushMessage) -> Result<(), SubscriptionError> {
        if self.failing {
            return Err(SubscriptionError::send(&self.id, "peer went away"));
        }
        self.received.lock().expect("received lock").push(message);
        Ok(())
    }
}
