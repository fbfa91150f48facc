mod schema;
mod store;

pub use store::{PostStore, Subscription, SubscriptionId};
