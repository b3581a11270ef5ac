//! Subscription domain logic: alerter registration, single-use keys, subscribe/unsubscribe,
//! listing, and orphan pruning over a `GraphStore`.

mod graph_subscriptions;
mod locks;

pub use alert_types::{SubscriptionError, SubscriptionService};
pub use graph_subscriptions::GraphSubscriptions;
