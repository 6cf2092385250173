//! The resource at `/`.

use std::sync::{Arc, Weak};

use arbor_spi::{
    RequestContext, Resource, ResourceError, ResourcePath, ResourceState, Responder,
};
use dashmap::DashMap;

use crate::subscriptions::{SUBSCRIPTIONS_ID, SubscriptionManager, SubscriptionsCollection};

/// In-memory directory of mounted top-level resources.
///
/// Also exposes every subscription in the container under `/_subscriptions`.
pub struct RootDirectory {
    members: DashMap<String, Arc<dyn Resource>>,
    subscriptions: Arc<SubscriptionsCollection>,
}

impl RootDirectory {
    /// Creates an empty root reflecting `manager`.
    #[must_use]
    pub fn new(manager: Arc<SubscriptionManager>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let parent: Weak<dyn Resource> = this.clone();
            Self {
                members: DashMap::new(),
                subscriptions: SubscriptionsCollection::new(parent, manager),
            }
        })
    }

    /// Mounts `resource` under its own id.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::ResourceAlreadyExists`] when the id is
    /// already mounted or reserved.
    pub fn mount(&self, resource: Arc<dyn Resource>) -> Result<(), ResourceError> {
        let id = resource.id().to_owned();
        if id.is_empty() || id == SUBSCRIPTIONS_ID {
            return Err(ResourceError::ResourceAlreadyExists {
                path: ResourcePath::root().child(id),
            });
        }
        match self.members.entry(id) {
            dashmap::Entry::Occupied(entry) => Err(ResourceError::ResourceAlreadyExists {
                path: ResourcePath::root().child(entry.key().clone()),
            }),
            dashmap::Entry::Vacant(slot) => {
                slot.insert(resource);
                Ok(())
            }
        }
    }

    /// Unmounts the resource named `id`, returning it.
    pub fn unmount(&self, id: &str) -> Option<Arc<dyn Resource>> {
        self.members.remove(id).map(|(_, resource)| resource)
    }

    /// The mounted resource named `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Resource>> {
        if id == SUBSCRIPTIONS_ID {
            let subscriptions: Arc<dyn Resource> = self.subscriptions.clone();
            return Some(subscriptions);
        }
        self.members.get(id).map(|entry| Arc::clone(entry.value()))
    }
}

impl Resource for RootDirectory {
    fn id(&self) -> &str {
        ""
    }

    fn parent(&self) -> Option<Arc<dyn Resource>> {
        None
    }

    fn uri(&self) -> ResourcePath {
        ResourcePath::root()
    }

    fn read_properties(&self, _ctx: &RequestContext) -> Result<ResourceState, ResourceError> {
        Ok(ResourceState::new().with_uri(ResourcePath::root()))
    }

    fn read_members(&self, _ctx: &RequestContext) -> Result<Vec<Arc<dyn Resource>>, ResourceError> {
        let mut members: Vec<Arc<dyn Resource>> = self
            .members
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        members.sort_by(|left, right| left.id().cmp(right.id()));
        Ok(members)
    }

    fn read_member(&self, _ctx: &RequestContext, id: &str, responder: Responder) {
        match self.get(id) {
            Some(resource) => responder.resource_read(resource),
            None => responder.no_such_resource(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use arbor_spi::Outcome;

    use super::*;
    use crate::codecs::CodecManager;

    struct Named(&'static str);

    impl Resource for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn parent(&self) -> Option<Arc<dyn Resource>> {
            None
        }
    }

    fn root() -> Arc<RootDirectory> {
        RootDirectory::new(Arc::new(SubscriptionManager::new(Arc::new(
            CodecManager::new(),
        ))))
    }

    fn lookup(root: &RootDirectory, id: &str) -> String {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        root.read_member(
            &RequestContext::new(),
            id,
            Responder::new(move |outcome: Outcome| {
                *sink.lock().expect("lock") = format!("{outcome:?}");
            }),
        );
        let text = seen.lock().expect("lock").clone();
        text
    }

    #[test]
    fn mounted_resources_are_members() {
        let root = root();
        root.mount(Arc::new(Named("people"))).expect("mount");
        assert!(lookup(&root, "people").starts_with("read("));
        assert_eq!(lookup(&root, "nobody"), "no_such_resource(nobody)");
    }

    #[test]
    fn duplicate_and_reserved_ids_are_refused() {
        let root = root();
        root.mount(Arc::new(Named("people"))).expect("mount");
        assert!(matches!(
            root.mount(Arc::new(Named("people"))),
            Err(ResourceError::ResourceAlreadyExists { .. })
        ));
        assert!(root.mount(Arc::new(Named(SUBSCRIPTIONS_ID))).is_err());
    }

    #[test]
    fn subscriptions_collection_hangs_off_the_root() {
        let root = root();
        assert_eq!(lookup(&root, SUBSCRIPTIONS_ID), "read(/_subscriptions)");
    }
}
