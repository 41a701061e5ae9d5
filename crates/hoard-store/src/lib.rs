//! Item store for Hoard.
//!
//! The item store is the authoritative collection of a group's shared
//! inventory items. It knows nothing about who holds which units; that is the
//! ownership ledger's job (`hoard-ledger`). Callers that delete an item are
//! responsible for purging the item's ownership records first.
//!
//! # Design Rules
//!
//! 1. Items are keyed by [`ItemId`](hoard_types::ItemId); lookup is O(1).
//! 2. Adding an item whose (name, category) already exists merges into the
//!    existing item by summing quantities.
//! 3. `add` and `set_quantity` never produce an item with quantity 0.
//!    Reducing to zero is a delete, which the caller performs through
//!    [`ItemStore::remove`].
//! 4. Mutations never partially apply: validation happens before any write.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryItemStore;
pub use traits::{AddOutcome, ItemStore};
