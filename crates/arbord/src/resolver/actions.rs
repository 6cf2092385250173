//! Verb actions run once traversal reaches the end of the path.

use std::sync::Arc;

use arbor_spi::{RequestType, Resource};
use tracing::debug;

use super::traversal::Traversal;
use super::{RESOLVER_TARGET, offload};

/// Runs the request's verb against the resolved `target`.
pub(super) fn perform(traversal: Traversal, target: Arc<dyn Resource>) {
    let Traversal {
        request,
        pool,
        completion,
        ..
    } = traversal;
    let execution = target.execution();
    let forward = completion.clone();
    offload(&pool, execution, &completion, move || {
        let responder = forward.responder();
        let ctx = request.context();
        match request.request_type() {
            RequestType::Read => responder.resource_read(target),
            RequestType::Create => {
                let state = request.state().cloned().unwrap_or_default();
                target.create_member(ctx, state, responder);
            }
            RequestType::Update => {
                let state = request.state().cloned().unwrap_or_default();
                target.update_properties(ctx, state, responder);
            }
            RequestType::Delete => target.delete_member(ctx, responder),
        }
    });
}

/// Turns an update of the missing member `id` into a create against `parent`.
pub(super) fn upsert(traversal: Traversal, parent: Arc<dyn Resource>, id: String) {
    let Traversal {
        request,
        pool,
        completion,
        ..
    } = traversal;
    debug!(
        target: RESOLVER_TARGET,
        parent = %parent.uri(),
        member = %id,
        "update target missing; creating instead"
    );
    let execution = parent.execution();
    let forward = completion.clone();
    offload(&pool, execution, &completion, move || {
        let responder = forward.responder();
        let state = request
            .state()
            .cloned()
            .unwrap_or_default()
            .with_id(id);
        parent.create_member(request.context(), state, responder);
    });
}
