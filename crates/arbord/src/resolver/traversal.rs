//! The segment-by-segment walk.

use std::sync::Arc;

use arbor_spi::{
    Outcome, RequestType, Resource, ResourceError, ResourcePath, ResourceRequest, Responder,
    WorkerPool,
};
use tracing::{debug, trace};

use super::completion::Completion;
use super::{RESOLVER_TARGET, actions, offload};

/// State carried from one continuation to the next.
pub(super) struct Traversal {
    pub(super) request: Arc<ResourceRequest>,
    pub(super) pool: Arc<WorkerPool>,
    pub(super) completion: Completion,
    remaining: ResourcePath,
    fallback_attempted: bool,
}

impl Traversal {
    pub(super) fn start(
        root: Arc<dyn Resource>,
        request: Arc<ResourceRequest>,
        pool: Arc<WorkerPool>,
        completion: Completion,
    ) {
        let remaining = request.path().clone();
        trace!(
            target: RESOLVER_TARGET,
            verb = %request.request_type(),
            path = %remaining,
            "starting traversal"
        );
        Self {
            request,
            pool,
            completion,
            remaining,
            fallback_attempted: false,
        }
        .arrive(root);
    }

    /// Continues from a resolved resource.
    fn arrive(mut self, resource: Arc<dyn Resource>) {
        let Some(segment) = self.remaining.head().map(str::to_owned) else {
            actions::perform(self, resource);
            return;
        };
        self.remaining = self.remaining.sub_path();
        self.lookup(resource, segment);
    }

    fn lookup(self, parent: Arc<dyn Resource>, id: String) {
        trace!(
            target: RESOLVER_TARGET,
            parent = %parent.uri(),
            member = %id,
            "looking up member"
        );
        let pool = Arc::clone(&self.pool);
        let completion = self.completion.clone();
        let request = Arc::clone(&self.request);
        let execution = parent.execution();
        offload(&pool, execution, &completion, move || {
            let target = Arc::clone(&parent);
            let attempted = id.clone();
            let responder =
                Responder::new(move |outcome| self.on_member(target, attempted, outcome));
            parent.read_member(request.context(), &id, responder);
        });
    }

    fn on_member(self, parent: Arc<dyn Resource>, id: String, outcome: Outcome) {
        match outcome {
            Outcome::Read(member) => self.arrive(member),
            Outcome::NoSuchResource(_) => self.on_miss(parent, id),
            Outcome::Failed(error) => self.completion.fail(error),
            other => self.completion.fail(ResourceError::internal(format!(
                "member lookup for '{id}' answered with {}",
                other.kind()
            ))),
        }
    }

    fn on_miss(mut self, parent: Arc<dyn Resource>, id: String) {
        let at_tail = self.remaining.is_empty();
        if at_tail
            && !self.fallback_attempted
            && let Some(stem) = strip_extension(&id)
        {
            debug!(
                target: RESOLVER_TARGET,
                parent = %parent.uri(),
                member = %id,
                retry = stem,
                "retrying lookup without extension"
            );
            self.fallback_attempted = true;
            let stem = stem.to_owned();
            self.lookup(parent, stem);
            return;
        }

        if at_tail && self.request.request_type() == RequestType::Update {
            actions::upsert(self, parent, id);
            return;
        }

        debug!(
            target: RESOLVER_TARGET,
            path = %self.request.path(),
            member = %id,
            "no such resource"
        );
        let path = self.request.path().clone();
        self.completion
            .fail(ResourceError::NoSuchResource { path });
    }
}

/// Drops the suffix after the last `.`, when a non-empty stem remains.
fn strip_extension(id: &str) -> Option<&str> {
    id.rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
}
