//! Reactive State
//!
//! This module holds the state that a hot reload must not lose: keyed signals,
//! the pub/sub bus and the registry of mounted framework islands.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a keyed value shared across every island on the page,
//! regardless of which framework rendered it. There is exactly one live signal
//! per key; updates replace the value and bump a version counter.
//!
//! ## Subscriptions
//!
//! A Subscription ties an opaque callback to an event name and to the island
//! that owns it. Subscribers of an event are delivered to in registration
//! order.
//!
//! ## Islands
//!
//! An island is one mounted component of one framework. Islands are the owners
//! of subscriptions: unmounting an island drops what it subscribed to.
//!
//! # Implementation Notes
//!
//! There are no ambient globals. A [`Runtime`] handle owns one isolated set of
//! stores and is passed explicitly to whoever needs it.

mod component;
mod pubsub;
mod runtime;
mod signal;
mod subscriber;

pub use component::{
    ComponentRef, ComponentRegistry, Framework, Island, IslandHandle, UnknownFramework,
};
pub use pubsub::{Subscription, SubscriptionRegistry};
pub use runtime::{MountGuard, Runtime};
pub use signal::{Signal, SignalStore};
pub use subscriber::{Callback, SubscriberId};

pub(crate) use component::IslandMap;
pub(crate) use pubsub::EventMap;
pub(crate) use signal::{apply_values, values_of, SignalMap};
