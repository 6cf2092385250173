//! Continuation-driven path resolution and verb dispatch.
//!
//! A request walks the resource graph one segment at a time. Each hop asks the
//! current resource for the next member and hands it a [`Responder`] that
//! resumes the walk; no thread is held while a lookup is outstanding. When
//! the path is exhausted the verb action runs against the resolved resource
//! and its outcome becomes the request's single terminal outcome.
//!
//! Resources tagged [`Execution::Blocking`] are always invoked from the
//! worker pool, never inline, and the tag is consulted afresh at every hop.
//! A pool that rejects work ends the request with an internal error.
//!
//! When the final segment misses and contains a `.`, the lookup is retried
//! once with the suffix after the last `.` removed. An `UPDATE` whose final
//! segment still misses becomes a create against the resolved parent.

mod actions;
mod completion;
mod traversal;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use arbor_spi::{Execution, PoolError, Resource, ResourceRequest, Responder, WorkerPool};

use self::completion::Completion;
use self::traversal::Traversal;

pub(crate) const RESOLVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::resolver");

/// Resolves `request`'s path from `root`, runs its verb, and reports the
/// single terminal outcome to `reply`.
///
/// `Read`, `Created`, `Updated`, and `Deleted` outcomes carry the affected
/// resource. Misses reached during traversal arrive as
/// [`arbor_spi::ResourceError::NoSuchResource`] for the full request path;
/// verb actions may also report `NoSuchResource` or `ResourceAlreadyExists`
/// outcomes carrying a member id.
pub fn dispatch_request(
    root: Arc<dyn Resource>,
    request: Arc<ResourceRequest>,
    pool: Arc<WorkerPool>,
    reply: Responder,
) {
    Traversal::start(root, request, pool, Completion::new(reply));
}

/// Runs `job` inline for non-blocking resources and on `pool` otherwise.
///
/// A rejected job fails `completion`; the job itself is dropped unrun. A job
/// that panics inline fails `completion` instead of unwinding into the
/// caller.
fn offload(
    pool: &WorkerPool,
    execution: Execution,
    completion: &Completion,
    job: impl FnOnce() + Send + 'static,
) {
    if !execution.is_blocking() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(target: RESOLVER_TARGET, "inline resource call panicked");
            completion.fail(arbor_spi::ResourceError::internal("resource call panicked"));
        }
        return;
    }
    if let Err(error) = pool.submit(job) {
        tracing::warn!(
            target: RESOLVER_TARGET,
            pool = pool.name(),
            %error,
            "blocking offload rejected"
        );
        completion.fail(rejection(&error));
    }
}

fn rejection(error: &PoolError) -> arbor_spi::ResourceError {
    arbor_spi::ResourceError::internal(format!("blocking offload rejected: {error}"))
}
