//! Destination-keyed subscriptions and lifecycle fan-out.
//!
//! Each subscription belongs to one connection and is identified across the
//! container by `{connection_id}-{subscription_id}`. Lifecycle events are
//! encoded separately for every matching subscriber, and one subscriber's
//! failure never prevents delivery to the others.

mod errors;
mod push;
mod reflection;
mod registry;

pub use self::errors::SubscriptionError;
#[cfg(test)]
pub(crate) use self::push::MockPushConnection;
pub use self::push::{Action, PUSH_STATUS, PushConnection, PushMessage};
pub use self::reflection::{SUBSCRIPTIONS_ID, SubscriptionResource, SubscriptionsCollection};
pub use self::registry::{DeliveryReport, Subscription, SubscriptionManager};

pub(crate) const SUBSCRIPTIONS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::subscriptions");
