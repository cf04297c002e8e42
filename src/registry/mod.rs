//! Subscription registry
//!
//! Maps each forum thread to the live push channels currently viewing it and
//! fans payloads out to them.
//!
//! - `channel`: the `Channel` capability a transport connection exposes
//! - `subscription`: the registry itself and the handles it hands out

pub mod channel;
pub mod subscription;

pub use channel::Channel;
pub use subscription::{SubscriptionHandle, SubscriptionRegistry};
