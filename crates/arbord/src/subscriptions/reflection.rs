//! Subscriptions exposed as readable resources.

use std::sync::{Arc, Weak};

use arbor_spi::{RequestContext, Resource, ResourceError, ResourcePath, ResourceState, Responder};

use super::{Subscription, SubscriptionManager};

/// Member id under which a container exposes its subscriptions.
pub const SUBSCRIPTIONS_ID: &str = "_subscriptions";

/// Lists the subscriptions at or under its parent's path.
pub struct SubscriptionsCollection {
    parent: Weak<dyn Resource>,
    manager: Arc<SubscriptionManager>,
    this: Weak<Self>,
}

impl SubscriptionsCollection {
    /// Creates the collection as a member of `parent`.
    #[must_use]
    pub fn new(parent: Weak<dyn Resource>, manager: Arc<SubscriptionManager>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            parent,
            manager,
            this: this.clone(),
        })
    }

    fn scope(&self) -> ResourcePath {
        self.parent
            .upgrade()
            .map_or_else(ResourcePath::root, |parent| parent.uri())
    }

    fn reflect(&self, subscription: Arc<Subscription>) -> Option<Arc<dyn Resource>> {
        let collection: Arc<dyn Resource> = self.this.upgrade()?;
        Some(Arc::new(SubscriptionResource {
            collection,
            subscription,
            manager: Arc::clone(&self.manager),
        }))
    }
}

impl Resource for SubscriptionsCollection {
    fn id(&self) -> &str {
        SUBSCRIPTIONS_ID
    }

    fn parent(&self) -> Option<Arc<dyn Resource>> {
        self.parent.upgrade()
    }

    fn read_members(&self, _ctx: &RequestContext) -> Result<Vec<Arc<dyn Resource>>, ResourceError> {
        Ok(self
            .manager
            .list_under(&self.scope())
            .into_iter()
            .filter_map(|subscription| self.reflect(subscription))
            .collect())
    }

    fn read_member(&self, _ctx: &RequestContext, id: &str, responder: Responder) {
        let scope = self.scope();
        let found = self
            .manager
            .get(id)
            .filter(|subscription| subscription.destination().starts_with(&scope))
            .and_then(|subscription| self.reflect(subscription));
        match found {
            Some(resource) => responder.resource_read(resource),
            None => responder.no_such_resource(id),
        }
    }
}

/// A single subscription as a resource. Deleting it unsubscribes.
#[derive(Clone)]
pub struct SubscriptionResource {
    collection: Arc<dyn Resource>,
    subscription: Arc<Subscription>,
    manager: Arc<SubscriptionManager>,
}

impl SubscriptionResource {
    /// The reflected subscription.
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Resource for SubscriptionResource {
    fn id(&self) -> &str {
        self.subscription.key()
    }

    fn parent(&self) -> Option<Arc<dyn Resource>> {
        Some(Arc::clone(&self.collection))
    }

    fn read_properties(&self, _ctx: &RequestContext) -> Result<ResourceState, ResourceError> {
        Ok(ResourceState::new()
            .with_id(self.id())
            .with_uri(self.uri())
            .with_property("type", "stomp")
            .with_property("path", self.subscription.destination().to_string())
            .with_property("subscription-id", self.subscription.subscription_id())
            .with_property("media-type", self.subscription.media_type().to_string()))
    }

    fn delete_member(&self, _ctx: &RequestContext, responder: Responder) {
        match self.manager.remove(self.subscription.key()) {
            Some(_) => responder.resource_deleted(Arc::new(self.clone())),
            None => responder.no_such_resource(self.id()),
        }
    }
}
