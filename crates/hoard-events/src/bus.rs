use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::Utc;
use hoard_types::GroupId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{EventError, Result};
use crate::event::{EventKind, EventPayload, InventoryEvent};

/// Filter for subscribing to a subset of inventory events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events for these groups are delivered.
    pub groups: Option<Vec<GroupId>>,
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Everything for one group.
    pub fn group(group_id: GroupId) -> Self {
        Self {
            groups: Some(vec![group_id]),
            kinds: None,
        }
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn matches(&self, event: &InventoryEvent) -> bool {
        if let Some(ref groups) = self.groups {
            if !groups.contains(&event.group_id) {
                return false;
            }
        }
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }
        true
    }
}

/// Handle identifying a subscription for [`EventBus::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    stream: broadcast::Receiver<InventoryEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next matching event.
    pub async fn recv(&mut self) -> Result<InventoryEvent> {
        self.stream.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Lagged(n) => EventError::Lagged(n),
            broadcast::error::RecvError::Closed => EventError::Closed,
        })
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Result<InventoryEvent>> {
        match self.stream.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Lagged(n)) => Some(Err(EventError::Lagged(n))),
            Err(broadcast::error::TryRecvError::Closed) => Some(Err(EventError::Closed)),
        }
    }
}

/// Configuration for the [`EventBus`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Capacity of each subscriber's channel.
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

struct Subscriber {
    id: SubscriptionId,
    filter: EventFilter,
    sender: broadcast::Sender<InventoryEvent>,
}

/// Fan-out of inventory events to filtered subscribers.
///
/// Publication is synchronous: when [`EventBus::publish`] returns, every
/// matching subscriber has the event queued.
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    seq: AtomicU64,
    config: EventConfig,
}

impl EventBus {
    pub fn new(config: EventConfig) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            seq: AtomicU64::new(0),
            config,
        }
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let (tx, rx) = broadcast::channel(self.config.channel_capacity.max(1));
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .expect("event bus lock poisoned")
            .push(Subscriber {
                id,
                filter,
                sender: tx,
            });
        debug!(subscription = %id, "subscribed");
        Subscription { id, stream: rx }
    }

    /// Cancel a subscription. Its receiver sees [`EventError::Closed`] once
    /// drained. Returns `false` for an unknown id.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write().expect("event bus lock poisoned");
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() != before;
        if removed {
            debug!(subscription = %id, "unsubscribed");
        }
        removed
    }

    /// Publish an event and return its sequence number.
    ///
    /// Subscribers whose receivers were dropped are pruned.
    pub fn publish(&self, group_id: GroupId, payload: EventPayload) -> u64 {
        let mut subs = self.subscribers.write().expect("event bus lock poisoned");
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let event = InventoryEvent {
            seq,
            group_id,
            at: Utc::now(),
            payload,
        };
        subs.retain(|sub| {
            if sub.filter.matches(&event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        debug!(seq, group = %group_id, kind = %event.kind(), subscribers = subs.len(), "published event");
        seq
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("event bus lock poisoned")
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventConfig::default())
    }
}
