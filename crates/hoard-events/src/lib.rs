//! Change notifications for Hoard.
//!
//! Observers subscribe with an [`EventFilter`] and receive matching
//! [`InventoryEvent`]s over a bounded broadcast channel. Events for one group
//! are published after the in-memory commit and before the write reaches
//! disk, in commit order.

pub mod bus;
pub mod error;
pub mod event;

pub use bus::{EventBus, EventConfig, EventFilter, Subscription, SubscriptionId};
pub use error::{EventError, Result};
pub use event::{EventKind, EventPayload, InventoryEvent};
