//! The container-owned subscription map.

use std::fmt;
use std::sync::Arc;

use arbor_spi::{
    MediaType, RequestContext, Resource, ResourceCodec, ResourcePath, ResourceState,
};
use dashmap::{DashMap, Entry};
use tracing::{debug, warn};

use super::push::{Action, PUSH_STATUS, PushConnection, PushMessage};
use super::{SUBSCRIPTIONS_TARGET, SubscriptionError};
use crate::codecs::CodecManager;

/// One connection's interest in events at a destination.
pub struct Subscription {
    connection: Arc<dyn PushConnection>,
    key: String,
    connection_id: String,
    subscription_id: String,
    destination: ResourcePath,
    media_type: MediaType,
    codec: Arc<dyn ResourceCodec>,
}

impl Subscription {
    /// Delivery identity, `{connection_id}-{subscription_id}`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Owning connection id.
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Connection-scoped subscription id.
    #[must_use]
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Watched path, possibly holding `*` segments.
    #[must_use]
    pub fn destination(&self) -> &ResourcePath {
        &self.destination
    }

    /// Negotiated media type.
    #[must_use]
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// Returns `true` when an event on `uri` concerns this subscription.
    ///
    /// Events match the resource's own path and its parent collection's path.
    #[must_use]
    pub fn matches(&self, uri: &ResourcePath) -> bool {
        self.destination.matches(uri)
            || uri
                .parent()
                .is_some_and(|parent| self.destination.matches(&parent))
    }

    fn push(
        &self,
        action: Action,
        location: &ResourcePath,
        state: &ResourceState,
    ) -> Result<(), SubscriptionError> {
        let body = self.codec.encode(&RequestContext::new(), state)?;
        self.connection.send(PushMessage {
            subscription: self.subscription_id.clone(),
            content_type: self.media_type.clone(),
            action,
            status: PUSH_STATUS,
            location: location.clone(),
            body,
        })
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("key", &self.key)
            .field("destination", &self.destination)
            .field("media_type", &self.media_type)
            .finish_non_exhaustive()
    }
}

/// Counts from one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers that received the message.
    pub delivered: usize,
    /// Subscribers whose encode or send failed.
    pub failed: usize,
}

/// Concurrent map of live subscriptions keyed by delivery identity.
pub struct SubscriptionManager {
    codecs: Arc<CodecManager>,
    entries: DashMap<String, Arc<Subscription>>,
}

impl SubscriptionManager {
    /// Creates an empty registry resolving media types through `codecs`.
    #[must_use]
    pub fn new(codecs: Arc<CodecManager>) -> Self {
        Self {
            codecs,
            entries: DashMap::new(),
        }
    }

    /// Registers a subscription for `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::NotAcceptable`] when no codec produces
    /// `media_type`, or [`SubscriptionError::Duplicate`] when the connection
    /// already uses `subscription_id`.
    pub fn subscribe(
        &self,
        connection: Arc<dyn PushConnection>,
        subscription_id: impl Into<String>,
        destination: ResourcePath,
        media_type: MediaType,
    ) -> Result<Arc<Subscription>, SubscriptionError> {
        let Some(codec) = self.codecs.get(&media_type) else {
            return Err(SubscriptionError::NotAcceptable {
                destination,
                media_type,
            });
        };
        let connection_id = connection.connection_id();
        let subscription_id = subscription_id.into();
        let subscription = Arc::new(Subscription {
            connection,
            key: delivery_key(&connection_id, &subscription_id),
            connection_id,
            subscription_id,
            destination,
            media_type,
            codec,
        });
        let key = subscription.key.clone();
        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => Err(SubscriptionError::Duplicate { key }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&subscription));
                debug!(
                    target: SUBSCRIPTIONS_TARGET,
                    key = %key,
                    destination = %subscription.destination,
                    media_type = %subscription.media_type,
                    "subscribed"
                );
                Ok(subscription)
            }
        }
    }

    /// Removes one subscription. Returns it when it existed.
    pub fn unsubscribe(&self, connection_id: &str, subscription_id: &str) -> Option<Arc<Subscription>> {
        self.remove(&delivery_key(connection_id, subscription_id))
    }

    /// Removes a subscription by delivery identity.
    pub fn remove(&self, key: &str) -> Option<Arc<Subscription>> {
        let removed = self.entries.remove(key).map(|(_, subscription)| subscription);
        if removed.is_some() {
            debug!(target: SUBSCRIPTIONS_TARGET, key, "unsubscribed");
        }
        removed
    }

    /// Drops every subscription owned by `connection_id`, returning how many.
    pub fn connection_closed(&self, connection_id: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, subscription| subscription.connection_id != connection_id);
        let released = before.saturating_sub(self.entries.len());
        if released > 0 {
            debug!(
                target: SUBSCRIPTIONS_TARGET,
                connection_id,
                released,
                "released subscriptions of closed connection"
            );
        }
        released
    }

    /// Looks up a subscription by delivery identity.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<Subscription>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Subscriptions whose destination lies at or under `prefix`, by key.
    #[must_use]
    pub fn list_under(&self, prefix: &ResourcePath) -> Vec<Arc<Subscription>> {
        let mut found: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.value().destination.starts_with(prefix))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        found.sort_by(|left, right| left.key.cmp(&right.key));
        found
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes `action` on `resource` to every matching subscriber.
    ///
    /// The state is encoded separately for each subscriber. Failures are
    /// logged and counted without affecting other subscribers.
    pub fn notify(&self, action: Action, resource: &Arc<dyn Resource>) -> DeliveryReport {
        let location = resource.uri();
        let matching: Vec<Arc<Subscription>> = self
            .entries
            .iter()
            .filter(|entry| entry.value().matches(&location))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        if matching.is_empty() {
            return DeliveryReport::default();
        }

        let state = match resource.read_properties(&RequestContext::new()) {
            Ok(state) => state,
            Err(error) => {
                warn!(
                    target: SUBSCRIPTIONS_TARGET,
                    location = %location,
                    %error,
                    "cannot render state for subscribers"
                );
                return DeliveryReport {
                    delivered: 0,
                    failed: matching.len(),
                };
            }
        };

        let mut report = DeliveryReport::default();
        for subscription in matching {
            match subscription.push(action, &location, &state) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        target: SUBSCRIPTIONS_TARGET,
                        key = %subscription.key(),
                        location = %location,
                        %action,
                        %error,
                        "push delivery failed"
                    );
                }
            }
        }
        report
    }
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SubscriptionManager")
            .field("subscriptions", &self.entries.len())
            .finish_non_exhaustive()
    }
}

fn delivery_key(connection_id: &str, subscription_id: &str) -> String {
    format!("{connection_id}-{subscription_id}")
}
