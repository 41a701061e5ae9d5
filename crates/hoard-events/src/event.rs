use std::fmt;

use chrono::{DateTime, Utc};
use hoard_types::{GroupId, InventoryItem, ItemId, ItemOwnership};
use serde::{Deserialize, Serialize};

/// Classification of inventory events, used for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ItemsChanged,
    OwnershipsChanged,
    ItemDeleted,
    PersistFailed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ItemsChanged => "items_changed",
            Self::OwnershipsChanged => "ownerships_changed",
            Self::ItemDeleted => "item_deleted",
            Self::PersistFailed => "persist_failed",
        };
        f.write_str(label)
    }
}

/// What changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// The item list changed. Carries the full current list.
    ItemsChanged { items: Vec<InventoryItem> },
    /// Allocations of one item changed. Carries that item's current records.
    OwnershipsChanged {
        item_id: ItemId,
        ownerships: Vec<ItemOwnership>,
    },
    /// An item was deleted along with `purged` ownership records.
    ItemDeleted { item_id: ItemId, purged: usize },
    /// A document write failed. The in-memory state is still committed.
    PersistFailed { document: String, error: String },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ItemsChanged { .. } => EventKind::ItemsChanged,
            Self::OwnershipsChanged { .. } => EventKind::OwnershipsChanged,
            Self::ItemDeleted { .. } => EventKind::ItemDeleted,
            Self::PersistFailed { .. } => EventKind::PersistFailed,
        }
    }
}

/// A change notification for one group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryEvent {
    /// Bus-wide publication sequence, strictly increasing.
    pub seq: u64,
    pub group_id: GroupId,
    pub at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl InventoryEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
