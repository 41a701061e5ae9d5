use chrono::{DateTime, Utc};
use hoard_types::{InventoryItem, ItemCandidate, ItemCategory, ItemId};

use crate::error::StoreResult;

/// Result of [`ItemStore::add`].
#[derive(Clone, Debug, PartialEq)]
pub struct AddOutcome {
    /// The item as stored after the add.
    pub item: InventoryItem,
    /// `true` if the candidate was merged into an existing item.
    pub merged: bool,
}

/// Collection of shared inventory items.
///
/// Implementations must uphold these invariants:
/// - Item ids are unique.
/// - At most one item per normalized (name, category) pair is reachable
///   through [`ItemStore::find_by_name_category`].
/// - `add` and `set_quantity` never leave an item at quantity 0.
pub trait ItemStore: Send {
    /// Look up an item by id.
    fn get(&self, id: &ItemId) -> Option<InventoryItem>;

    /// Find the item a candidate with this (name, category) would merge into.
    ///
    /// Names compare trimmed and case-insensitively.
    fn find_by_name_category(&self, name: &str, category: ItemCategory) -> Option<InventoryItem>;

    /// Add a candidate, merging into an existing item when one matches.
    fn add(&mut self, candidate: ItemCandidate, now: DateTime<Utc>) -> StoreResult<AddOutcome>;

    /// Set the quantity of an existing item.
    ///
    /// Returns `Ok(None)` if the item does not exist. A quantity of 0 is
    /// rejected; zeroing an item is a delete.
    fn set_quantity(
        &mut self,
        id: &ItemId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<InventoryItem>>;

    /// Remove an item. Returns the removed item, or `None` if it was unknown.
    fn remove(&mut self, id: &ItemId) -> Option<InventoryItem>;

    /// Snapshot of all items, sorted by name then category.
    fn items(&self) -> Vec<InventoryItem>;

    /// Replace the whole collection, e.g. after loading a document.
    fn replace_all(&mut self, items: Vec<InventoryItem>) -> StoreResult<()>;

    /// Number of items.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if an item with this id exists.
    fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }
}
