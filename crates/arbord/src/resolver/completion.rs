//! Fire-once sink shared by every continuation of one request.

use std::sync::{Arc, Mutex, PoisonError};

use arbor_spi::{Outcome, ResourceError, Responder};
use tracing::debug;

use super::RESOLVER_TARGET;

/// Clones share one [`Responder`]; the first delivery wins and later ones are
/// ignored. When the last clone is dropped undelivered, the responder's own
/// drop guard reports an internal error.
#[derive(Clone)]
pub(crate) struct Completion {
    reply: Arc<Mutex<Option<Responder>>>,
}

impl Completion {
    pub(crate) fn new(reply: Responder) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Some(reply))),
        }
    }

    pub(crate) fn deliver(&self, outcome: Outcome) {
        let reply = self
            .reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match reply {
            Some(reply) => reply.respond(outcome),
            None => debug!(
                target: RESOLVER_TARGET,
                outcome = ?outcome,
                "ignoring outcome delivered after completion"
            ),
        }
    }

    pub(crate) fn fail(&self, error: ResourceError) {
        self.deliver(Outcome::Failed(error));
    }

    /// A responder that forwards into this completion.
    pub(crate) fn responder(&self) -> Responder {
        let completion = self.clone();
        Responder::new(move |outcome| completion.deliver(outcome))
    }
}
