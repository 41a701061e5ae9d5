use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hoard_types::item::merge_key;
use hoard_types::{InventoryItem, ItemCandidate, ItemCategory, ItemId};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{AddOutcome, ItemStore};

/// In-memory, HashMap-based item store.
///
/// Items are keyed by id, with a secondary index from the normalized
/// (name, category) pair to the id for merge detection.
#[derive(Default)]
pub struct InMemoryItemStore {
    items: HashMap<ItemId, InventoryItem>,
    by_name: HashMap<(String, ItemCategory), ItemId>,
}

impl InMemoryItemStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously persisted items.
    pub fn from_items(items: Vec<InventoryItem>) -> StoreResult<Self> {
        let mut store = Self::new();
        store.replace_all(items)?;
        Ok(store)
    }

    /// Sum of `quantity` across all items.
    pub fn total_units(&self) -> u64 {
        self.items.values().map(|i| u64::from(i.quantity)).sum()
    }

    fn validate_candidate(candidate: &ItemCandidate) -> StoreResult<()> {
        if candidate.name.trim().is_empty() {
            return Err(StoreError::InvalidItem {
                reason: "name must not be empty".into(),
            });
        }
        if candidate.quantity == 0 {
            return Err(StoreError::InvalidQuantity {
                requested: 0,
                reason: "an added item must have at least one unit".into(),
            });
        }
        if !candidate.weight.is_finite() || candidate.weight < 0.0 {
            return Err(StoreError::InvalidItem {
                reason: format!("weight must be a non-negative number, got {}", candidate.weight),
            });
        }
        if !candidate.value.is_finite() || candidate.value < 0.0 {
            return Err(StoreError::InvalidItem {
                reason: format!("value must be a non-negative number, got {}", candidate.value),
            });
        }
        Ok(())
    }
}

impl ItemStore for InMemoryItemStore {
    fn get(&self, id: &ItemId) -> Option<InventoryItem> {
        self.items.get(id).cloned()
    }

    fn find_by_name_category(&self, name: &str, category: ItemCategory) -> Option<InventoryItem> {
        self.by_name
            .get(&merge_key(name, category))
            .and_then(|id| self.items.get(id))
            .cloned()
    }

    fn add(&mut self, candidate: ItemCandidate, now: DateTime<Utc>) -> StoreResult<AddOutcome> {
        Self::validate_candidate(&candidate)?;

        let key = merge_key(&candidate.name, candidate.category);
        if let Some(existing) = self.by_name.get(&key).and_then(|id| self.items.get_mut(id)) {
            let total = existing
                .quantity
                .checked_add(candidate.quantity)
                .ok_or_else(|| StoreError::InvalidQuantity {
                    requested: u64::from(existing.quantity) + u64::from(candidate.quantity),
                    reason: "merged quantity overflows".into(),
                })?;
            existing.quantity = total;
            existing.last_modified = now;
            debug!(item = %existing.id, quantity = total, "merged item");
            return Ok(AddOutcome {
                item: existing.clone(),
                merged: true,
            });
        }

        let item = InventoryItem::from_candidate(candidate, now);
        self.by_name.insert(key, item.id);
        self.items.insert(item.id, item.clone());
        debug!(item = %item.id, name = %item.name, "inserted item");
        Ok(AddOutcome { item, merged: false })
    }

    fn set_quantity(
        &mut self,
        id: &ItemId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<InventoryItem>> {
        if quantity == 0 {
            return Err(StoreError::InvalidQuantity {
                requested: 0,
                reason: "zero quantity is a delete".into(),
            });
        }
        let Some(item) = self.items.get_mut(id) else {
            return Ok(None);
        };
        item.quantity = quantity;
        item.last_modified = now;
        Ok(Some(item.clone()))
    }

    fn remove(&mut self, id: &ItemId) -> Option<InventoryItem> {
        let removed = self.items.remove(id)?;
        let key = removed.merge_key();
        if self.by_name.get(&key) == Some(id) {
            self.by_name.remove(&key);
            // A loaded document may hold several items sharing a name; keep one reachable.
            if let Some(other) = self.items.values().find(|i| i.merge_key() == key) {
                self.by_name.insert(key, other.id);
            }
        }
        Some(removed)
    }

    fn items(&self) -> Vec<InventoryItem> {
        let mut items: Vec<InventoryItem> = self.items.values().cloned().collect();
        items.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.category.cmp(&b.category))
                .then(a.id.cmp(&b.id))
        });
        items
    }

    fn replace_all(&mut self, items: Vec<InventoryItem>) -> StoreResult<()> {
        let mut by_id = HashMap::with_capacity(items.len());
        let mut by_name = HashMap::with_capacity(items.len());
        for item in items {
            let key = item.merge_key();
            if let Some(first) = by_name.get(&key) {
                warn!(item = %item.id, duplicate_of = %first, name = %item.name, "duplicate item name in loaded data");
            } else {
                by_name.insert(key, item.id);
            }
            let id = item.id;
            if by_id.insert(id, item).is_some() {
                return Err(StoreError::DuplicateItem(id));
            }
        }
        self.items = by_id;
        self.by_name = by_name;
        Ok(())
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl std::fmt::Debug for InMemoryItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryItemStore")
            .field("item_count", &self.items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torch(quantity: u32) -> ItemCandidate {
        ItemCandidate::new("Torch", ItemCategory::Tool, quantity)
    }

    #[test]
    fn add_inserts_new_item() {
        let mut store = InMemoryItemStore::new();
        let outcome = store.add(torch(2), Utc::now()).unwrap();
        assert!(!outcome.merged);
        assert_eq!(outcome.item.quantity, 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&outcome.item.id), Some(outcome.item));
    }

    #[test]
    fn add_same_name_and_category_merges() {
        let mut store = InMemoryItemStore::new();
        let first = store.add(torch(2), Utc::now()).unwrap();
        let second = store.add(torch(3), Utc::now()).unwrap();

        assert!(second.merged);
        assert_eq!(second.item.id, first.item.id);
        assert_eq!(second.item.quantity, 5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn merge_ignores_case_and_whitespace() {
        let mut store = InMemoryItemStore::new();
        store.add(torch(1), Utc::now()).unwrap();
        let merged = store
            .add(ItemCandidate::new("  torch", ItemCategory::Tool, 1), Utc::now())
            .unwrap();
        assert!(merged.merged);
        assert_eq!(merged.item.name, "Torch");
    }

    #[test]
    fn same_name_different_category_does_not_merge() {
        let mut store = InMemoryItemStore::new();
        store.add(torch(1), Utc::now()).unwrap();
        store
            .add(ItemCandidate::new("Torch", ItemCategory::Weapon, 1), Utc::now())
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn merge_updates_last_modified() {
        let mut store = InMemoryItemStore::new();
        let t0 = Utc::now();
        let first = store.add(torch(1), t0).unwrap();
        let t1 = t0 + chrono::Duration::seconds(5);
        let merged = store.add(torch(1), t1).unwrap();
        assert_eq!(merged.item.created_at, first.item.created_at);
        assert_eq!(merged.item.last_modified, t1);
    }

    #[test]
    fn add_rejects_empty_name_and_zero_quantity() {
        let mut store = InMemoryItemStore::new();
        let err = store
            .add(ItemCandidate::new("   ", ItemCategory::Tool, 1), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidItem { .. }));

        let err = store.add(torch(0), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuantity { requested: 0, .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn add_rejects_negative_weight() {
        let mut store = InMemoryItemStore::new();
        let err = store.add(torch(1).with_weight(-1.0), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidItem { .. }));
    }

    #[test]
    fn merge_overflow_is_rejected_without_change() {
        let mut store = InMemoryItemStore::new();
        let first = store.add(torch(u32::MAX), Utc::now()).unwrap();
        let err = store.add(torch(1), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuantity { .. }));
        assert_eq!(store.get(&first.item.id).unwrap().quantity, u32::MAX);
    }

    #[test]
    fn set_quantity_updates_existing() {
        let mut store = InMemoryItemStore::new();
        let item = store.add(torch(2), Utc::now()).unwrap().item;
        let updated = store.set_quantity(&item.id, 7, Utc::now()).unwrap().unwrap();
        assert_eq!(updated.quantity, 7);
    }

    #[test]
    fn set_quantity_unknown_is_none() {
        let mut store = InMemoryItemStore::new();
        assert!(store.set_quantity(&ItemId::new(), 3, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn set_quantity_zero_is_rejected() {
        let mut store = InMemoryItemStore::new();
        let item = store.add(torch(2), Utc::now()).unwrap().item;
        assert!(store.set_quantity(&item.id, 0, Utc::now()).is_err());
        assert_eq!(store.get(&item.id).unwrap().quantity, 2);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut store = InMemoryItemStore::new();
        assert!(store.remove(&ItemId::new()).is_none());
    }

    #[test]
    fn remove_clears_name_index() {
        let mut store = InMemoryItemStore::new();
        let item = store.add(torch(2), Utc::now()).unwrap().item;
        assert_eq!(store.remove(&item.id).unwrap().id, item.id);
        assert!(store.find_by_name_category("Torch", ItemCategory::Tool).is_none());

        let again = store.add(torch(1), Utc::now()).unwrap();
        assert!(!again.merged);
        assert_ne!(again.item.id, item.id);
    }

    #[test]
    fn items_are_sorted_by_name() {
        let mut store = InMemoryItemStore::new();
        store
            .add(ItemCandidate::new("Rope", ItemCategory::Tool, 1), Utc::now())
            .unwrap();
        store
            .add(ItemCandidate::new("arrow", ItemCategory::Ammunition, 20), Utc::now())
            .unwrap();
        store
            .add(ItemCandidate::new("Lantern", ItemCategory::Tool, 1), Utc::now())
            .unwrap();
        let names: Vec<_> = store.items().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["arrow", "Lantern", "Rope"]);
        assert_eq!(store.total_units(), 22);
    }

    #[test]
    fn replace_all_rejects_duplicate_ids() {
        let now = Utc::now();
        let item = InventoryItem::from_candidate(torch(1), now);
        let err = InMemoryItemStore::from_items(vec![item.clone(), item.clone()]).unwrap_err();
        assert_eq!(err, StoreError::DuplicateItem(item.id));
    }

    #[test]
    fn replace_all_keeps_duplicate_names_reachable_after_remove() {
        let now = Utc::now();
        let a = InventoryItem::from_candidate(torch(1), now);
        let b = InventoryItem::from_candidate(torch(4), now);
        let mut store = InMemoryItemStore::from_items(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(store.len(), 2);

        let indexed = store.find_by_name_category("Torch", ItemCategory::Tool).unwrap();
        store.remove(&indexed.id);
        let remaining = store.find_by_name_category("Torch", ItemCategory::Tool).unwrap();
        assert_ne!(remaining.id, indexed.id);
    }
}
