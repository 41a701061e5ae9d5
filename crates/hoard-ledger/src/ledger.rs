use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use hoard_types::{CharacterId, InventoryItem, ItemId, ItemOwnership};
use tracing::debug;

use crate::enforcer::{apply_plan, ConsistencyEnforcer, ShrinkPlan};
use crate::error::LedgerResult;

/// Per-item, per-character allocation records.
///
/// Every mutating method validates through [`ConsistencyEnforcer`] first and
/// leaves the ledger untouched when validation fails.
#[derive(Clone, Debug, Default)]
pub struct OwnershipLedger {
    records: HashMap<ItemId, BTreeMap<CharacterId, ItemOwnership>>,
}

impl OwnershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from persisted records.
    ///
    /// Records are taken as-is; run [`ConsistencyEnforcer::repair`] first when
    /// loading untrusted data. Zero-unit records are skipped and later
    /// duplicates replace earlier ones.
    pub fn from_records(records: Vec<ItemOwnership>) -> Self {
        let mut ledger = Self::new();
        for record in records {
            if record.quantity_owned == 0 {
                continue;
            }
            ledger
                .records
                .entry(record.item_id)
                .or_default()
                .insert(record.character_id, record);
        }
        ledger
    }

    /// All records for an item, ordered by character id.
    pub fn ownerships_for_item(&self, item_id: &ItemId) -> Vec<ItemOwnership> {
        self.records
            .get(item_id)
            .map(|holders| holders.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The record for one (item, character) pair.
    pub fn ownership(&self, item_id: &ItemId, character: &CharacterId) -> Option<&ItemOwnership> {
        self.records.get(item_id)?.get(character)
    }

    /// Units of an item allocated to characters.
    pub fn allocated(&self, item_id: &ItemId) -> u64 {
        self.records
            .get(item_id)
            .map(|holders| holders.values().map(|r| u64::from(r.quantity_owned)).sum())
            .unwrap_or(0)
    }

    /// Party storage: units of `item` no character holds.
    ///
    /// Negative only if the ledger is already inconsistent with the item.
    pub fn unallocated(&self, item: &InventoryItem) -> i64 {
        i64::from(item.quantity) - self.allocated(&item.id) as i64
    }

    /// Allocate `requested` more units of `item` to `character`.
    ///
    /// Creates the record on first claim, otherwise adds to it. Non-empty
    /// `notes` replace the record's notes.
    pub fn assign(
        &mut self,
        item: &InventoryItem,
        character: CharacterId,
        requested: u32,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> LedgerResult<ItemOwnership> {
        ConsistencyEnforcer::check_assignment(item, self.allocated(&item.id), requested)?;

        let holders = self.records.entry(item.id).or_default();
        let record = holders
            .entry(character)
            .or_insert_with(|| ItemOwnership::new(item.id, character, 0, now));
        record.quantity_owned += requested;
        record.claimed_date = now;
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            record.notes = notes.to_string();
        }

        debug!(item = %item.id, character = %character, requested, owned = record.quantity_owned, "assigned ownership");
        Ok(record.clone())
    }

    /// Release a character's whole holding of an item back to party storage.
    ///
    /// Returns the removed record, or `None` if there was nothing to release.
    pub fn return_to_party(
        &mut self,
        item_id: &ItemId,
        character: &CharacterId,
    ) -> Option<ItemOwnership> {
        let holders = self.records.get_mut(item_id)?;
        let removed = holders.remove(character);
        if holders.is_empty() {
            self.records.remove(item_id);
        }
        if let Some(record) = &removed {
            debug!(item = %item_id, character = %character, released = record.quantity_owned, "returned to party");
        }
        removed
    }

    /// Set a character's holding to exactly `new_quantity`.
    ///
    /// Zero behaves like [`Self::return_to_party`] and yields `Ok(None)`.
    /// Otherwise the cap is the unallocated remainder plus the character's
    /// current holding. `claimed_date` moves to `now` only when the holding
    /// grows.
    pub fn set(
        &mut self,
        item: &InventoryItem,
        character: CharacterId,
        new_quantity: u32,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<ItemOwnership>> {
        if new_quantity == 0 {
            self.return_to_party(&item.id, &character);
            return Ok(None);
        }

        let current = self
            .ownership(&item.id, &character)
            .map(|r| r.quantity_owned)
            .unwrap_or(0);
        ConsistencyEnforcer::check_set(item, self.allocated(&item.id), current, new_quantity)?;

        let record = self
            .records
            .entry(item.id)
            .or_default()
            .entry(character)
            .or_insert_with(|| ItemOwnership::new(item.id, character, 0, now));
        if new_quantity > record.quantity_owned {
            record.claimed_date = now;
        }
        record.quantity_owned = new_quantity;
        Ok(Some(record.clone()))
    }

    /// Remove every record of an item. Used before the item is deleted.
    pub fn purge_item(&mut self, item_id: &ItemId) -> Vec<ItemOwnership> {
        self.records
            .remove(item_id)
            .map(|holders| holders.into_values().collect())
            .unwrap_or_default()
    }

    /// Apply a shrink plan produced by [`ConsistencyEnforcer::plan_shrink`].
    pub fn apply_shrink(&mut self, plan: &ShrinkPlan) {
        if plan.is_empty() {
            return;
        }
        let mut records = self.ownerships_for_item(&plan.item_id);
        apply_plan(&mut records, plan);
        self.records.remove(&plan.item_id);
        for record in records {
            self.records
                .entry(record.item_id)
                .or_default()
                .insert(record.character_id, record);
        }
        debug!(item = %plan.item_id, released = plan.total_released(), "applied shrink plan");
    }

    /// Every holding of one character, across items.
    pub fn carried_by(&self, character: &CharacterId) -> Vec<ItemOwnership> {
        let mut held: Vec<ItemOwnership> = self
            .records
            .values()
            .filter_map(|holders| holders.get(character).cloned())
            .collect();
        held.sort_by_key(|r| r.item_id);
        held
    }

    /// Snapshot of every record, ordered by item then character.
    pub fn records(&self) -> Vec<ItemOwnership> {
        let mut all: Vec<ItemOwnership> = self
            .records
            .values()
            .flat_map(|holders| holders.values().cloned())
            .collect();
        all.sort_by_key(|r| r.key());
        all
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use hoard_types::{ItemCandidate, ItemCategory};

    use super::*;
    use crate::enforcer::ShrinkPolicy;
    use crate::error::LedgerError;

    fn item(quantity: u32) -> InventoryItem {
        InventoryItem::from_candidate(
            ItemCandidate::new("Arrow", ItemCategory::Ammunition, quantity),
            Utc::now(),
        )
    }

    #[test]
    fn scenario_assign_until_exhausted() {
        let arrows = item(10);
        let (a, b) = (CharacterId::new(), CharacterId::new());
        let mut ledger = OwnershipLedger::new();

        ledger.assign(&arrows, a, 4, None, Utc::now()).unwrap();
        assert_eq!(ledger.unallocated(&arrows), 6);

        let err = ledger.assign(&arrows, b, 7, None, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::AllocationExceeded { available: 6, .. }));
        assert_eq!(ledger.unallocated(&arrows), 6);

        ledger.assign(&arrows, b, 6, None, Utc::now()).unwrap();
        assert_eq!(ledger.unallocated(&arrows), 0);
    }

    #[test]
    fn scenario_return_releases_to_party_storage() {
        let arrows = item(10);
        let (a, b) = (CharacterId::new(), CharacterId::new());
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&arrows, a, 4, None, Utc::now()).unwrap();
        ledger.assign(&arrows, b, 6, None, Utc::now()).unwrap();

        let removed = ledger.return_to_party(&arrows.id, &a).unwrap();
        assert_eq!(removed.quantity_owned, 4);
        assert_eq!(ledger.unallocated(&arrows), 4);
        assert!(ledger.ownership(&arrows.id, &a).is_none());
    }

    #[test]
    fn return_to_party_is_idempotent() {
        let arrows = item(10);
        let a = CharacterId::new();
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&arrows, a, 4, None, Utc::now()).unwrap();

        assert!(ledger.return_to_party(&arrows.id, &a).is_some());
        assert!(ledger.return_to_party(&arrows.id, &a).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn repeated_claims_accumulate_in_one_record() {
        let arrows = item(10);
        let a = CharacterId::new();
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&arrows, a, 2, Some("quiver"), Utc::now()).unwrap();
        let record = ledger.assign(&arrows, a, 3, None, Utc::now()).unwrap();

        assert_eq!(record.quantity_owned, 5);
        assert_eq!(record.notes, "quiver");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn zero_assignment_is_rejected() {
        let arrows = item(10);
        let mut ledger = OwnershipLedger::new();
        let err = ledger
            .assign(&arrows, CharacterId::new(), 0, None, Utc::now())
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidQuantity { requested: 0 });
        assert!(ledger.is_empty());
    }

    #[test]
    fn set_adjusts_own_allocation_without_double_counting() {
        let arrows = item(10);
        let (a, b) = (CharacterId::new(), CharacterId::new());
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&arrows, a, 4, None, Utc::now()).unwrap();
        ledger.assign(&arrows, b, 6, None, Utc::now()).unwrap();

        // a may shrink or keep 4, but not grow past the 0 unallocated units.
        ledger.set(&arrows, a, 4, Utc::now()).unwrap();
        ledger.set(&arrows, a, 1, Utc::now()).unwrap();
        assert_eq!(ledger.unallocated(&arrows), 3);
        ledger.set(&arrows, a, 4, Utc::now()).unwrap();
        assert!(ledger.set(&arrows, a, 5, Utc::now()).is_err());
    }

    #[test]
    fn set_refreshes_claimed_date_only_when_growing() {
        let arrows = item(10);
        let a = CharacterId::new();
        let mut ledger = OwnershipLedger::new();
        let first = Utc::now();
        ledger.assign(&arrows, a, 4, None, first).unwrap();

        let later = first + chrono::Duration::seconds(60);
        let shrunk = ledger.set(&arrows, a, 2, later).unwrap().unwrap();
        assert_eq!(shrunk.claimed_date, first);

        let grown = ledger.set(&arrows, a, 5, later).unwrap().unwrap();
        assert_eq!(grown.claimed_date, later);
    }

    #[test]
    fn set_to_zero_returns_to_party() {
        let arrows = item(10);
        let a = CharacterId::new();
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&arrows, a, 4, None, Utc::now()).unwrap();
        assert_eq!(ledger.set(&arrows, a, 0, Utc::now()).unwrap(), None);
        assert!(ledger.is_empty());
    }

    #[test]
    fn set_creates_record_for_new_holder() {
        let arrows = item(10);
        let a = CharacterId::new();
        let mut ledger = OwnershipLedger::new();
        let record = ledger.set(&arrows, a, 3, Utc::now()).unwrap().unwrap();
        assert_eq!(record.quantity_owned, 3);
        assert_eq!(ledger.unallocated(&arrows), 7);
    }

    #[test]
    fn purge_removes_all_records_of_item() {
        let arrows = item(10);
        let rope = item(1);
        let (a, b) = (CharacterId::new(), CharacterId::new());
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&arrows, a, 4, None, Utc::now()).unwrap();
        ledger.assign(&arrows, b, 6, None, Utc::now()).unwrap();
        ledger.assign(&rope, a, 1, None, Utc::now()).unwrap();

        let purged = ledger.purge_item(&arrows.id);
        assert_eq!(purged.len(), 2);
        assert!(ledger.ownerships_for_item(&arrows.id).is_empty());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn apply_shrink_drops_emptied_records() {
        let mut arrows = item(10);
        let (a, b) = (CharacterId::new(), CharacterId::new());
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&arrows, a, 4, None, Utc::now()).unwrap();
        ledger
            .assign(&arrows, b, 6, None, Utc::now() + chrono::Duration::seconds(1))
            .unwrap();

        let plan = ConsistencyEnforcer::plan_shrink(
            &arrows,
            &ledger.ownerships_for_item(&arrows.id),
            3,
            ShrinkPolicy::ReleaseMostRecent,
        )
        .unwrap();
        ledger.apply_shrink(&plan);
        arrows.quantity = 3;

        assert!(ledger.ownership(&arrows.id, &b).is_none());
        assert_eq!(ledger.ownership(&arrows.id, &a).unwrap().quantity_owned, 3);
        assert_eq!(ledger.unallocated(&arrows), 0);
    }

    #[test]
    fn carried_by_lists_holdings_across_items() {
        let arrows = item(10);
        let rope = item(2);
        let a = CharacterId::new();
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&arrows, a, 4, None, Utc::now()).unwrap();
        ledger.assign(&rope, a, 1, None, Utc::now()).unwrap();
        ledger.assign(&rope, CharacterId::new(), 1, None, Utc::now()).unwrap();

        assert_eq!(ledger.carried_by(&a).len(), 2);
        assert_eq!(ledger.records().len(), 3);
    }

    #[test]
    fn from_records_skips_zero_units() {
        let arrows = item(10);
        let records = vec![
            ItemOwnership::new(arrows.id, CharacterId::new(), 0, Utc::now()),
            ItemOwnership::new(arrows.id, CharacterId::new(), 2, Utc::now()),
        ];
        let ledger = OwnershipLedger::from_records(records);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.allocated(&arrows.id), 2);
    }
}
