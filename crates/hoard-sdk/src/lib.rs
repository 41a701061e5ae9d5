//! High-level API for Hoard.
//!
//! [`Hoard`] is the process-level service: it owns the document store, the
//! event bus, and the directory collaborators, and hands out one
//! [`PartyInventory`] per open group. All inventory mutations go through
//! `PartyInventory`, which validates them, applies them in memory, notifies
//! subscribers, and queues the affected document slice for saving.

pub mod catalog;
pub mod config;
pub mod directory;
pub mod error;
pub mod hoard;
pub mod inventory;

pub use catalog::{CatalogHit, CatalogItemDetails, CatalogSource, StaticCatalog};
pub use config::{HoardConfig, LedgerConfig};
pub use directory::{CharacterDirectory, GroupDirectory, InMemoryDirectory, UserDirectory};
pub use error::{SdkError, SdkResult};
pub use hoard::Hoard;
pub use inventory::{Committed, DeletedItem, PartyInventory, QuantityChange};

// Re-export key types
pub use hoard_events::{EventFilter, EventKind, EventPayload, InventoryEvent, Subscription};
pub use hoard_ledger::{AllocationBreakdown, ConsistencyReport, InventorySummary, ShrinkPolicy};
pub use hoard_persist::SaveHandle;
pub use hoard_store::AddOutcome;
pub use hoard_types::{
    CharacterId, Group, GroupId, InventoryItem, ItemCandidate, ItemCategory, ItemId, ItemOwnership,
    PlayerCharacter, UserId, UserRecord,
};
