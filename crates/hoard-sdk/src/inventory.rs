use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use hoard_events::{EventBus, EventFilter, EventPayload, Subscription};
use hoard_ledger::{
    AllocationBreakdown, ConsistencyEnforcer, ConsistencyReport, InventorySummary, OwnershipLedger,
    ProjectionBuilder, ShrinkPlan, ShrinkPolicy,
};
use hoard_persist::{DocumentStore, GroupDocument, GroupSlice, SaveHandle};
use hoard_store::{AddOutcome, InMemoryItemStore, ItemStore};
use hoard_types::{
    CharacterId, GroupId, InventoryItem, ItemCandidate, ItemCategory, ItemId, ItemOwnership,
};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogItemDetails, CatalogSource};
use crate::directory::{CharacterDirectory, UserDirectory};
use crate::error::{SdkError, SdkResult};

/// The result of a committed mutation plus the handle of its queued save.
///
/// The in-memory change is final once this is returned. Awaiting `saved`
/// (or calling [`Committed::persisted`]) reports whether the write reached
/// disk.
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    pub saved: SaveHandle,
}

impl<T> Committed<T> {
    /// Wait for the save and return the value.
    pub async fn persisted(self) -> SdkResult<T> {
        self.saved.await?;
        Ok(self.value)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Committed<U> {
        Committed {
            value: f(self.value),
            saved: self.saved,
        }
    }
}

/// An item removed together with its ownership records.
#[derive(Clone, Debug, PartialEq)]
pub struct DeletedItem {
    pub item: InventoryItem,
    pub purged: Vec<ItemOwnership>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum QuantityChange {
    /// The quantity changed. `plan` lists allocations released to fit it.
    Updated { item: InventoryItem, plan: ShrinkPlan },
    /// The quantity went to zero and the item was deleted.
    Deleted(DeletedItem),
}

/// Shared collaborators handed to every open group.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) persist: Arc<DocumentStore>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) characters: Arc<dyn CharacterDirectory>,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) shrink_policy: ShrinkPolicy,
}

struct GroupState {
    name: String,
    items: InMemoryItemStore,
    ledger: OwnershipLedger,
    /// Set once the group is deleted. Mutations are refused afterwards.
    closed: bool,
}

/// The shared inventory of one group.
///
/// Every mutation runs under one lock: validate, mutate, notify, then queue
/// the save. Saves are queued before the lock is released, so the group's
/// document is written in the order mutations were accepted.
pub struct PartyInventory {
    group_id: GroupId,
    state: Mutex<GroupState>,
    services: Services,
}

impl PartyInventory {
    /// Build the in-memory state from a loaded document.
    ///
    /// Ownership records that break an invariant are repaired and the
    /// repaired records are written back.
    pub(crate) fn from_document(
        doc: GroupDocument,
        name: String,
        services: Services,
    ) -> SdkResult<Self> {
        let group_id = doc.group_id;
        let (ownerships, report) =
            ConsistencyEnforcer::repair(&doc.items, doc.item_ownerships, services.shrink_policy);
        let items = InMemoryItemStore::from_items(doc.items)?;
        let ledger = OwnershipLedger::from_records(ownerships);

        let inventory = Self {
            group_id,
            state: Mutex::new(GroupState {
                name,
                items,
                ledger,
                closed: false,
            }),
            services,
        };
        if !report.is_consistent() {
            warn!(
                group = %group_id,
                violations = report.violations.len(),
                "repaired inconsistent ownership records"
            );
            let records = inventory.lock().ledger.records();
            drop(inventory.save(GroupSlice::Ownerships(records)));
        }
        Ok(inventory)
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    // ── Items ─────────────────────────────────────────────────────

    /// Add an item, merging into an existing one with the same name and
    /// category.
    pub fn add_item(&self, candidate: ItemCandidate) -> SdkResult<Committed<AddOutcome>> {
        let mut state = self.lock_open()?;
        let outcome = state.items.add(candidate, Utc::now())?;
        debug!(
            group = %self.group_id,
            item = %outcome.item.id,
            quantity = outcome.item.quantity,
            merged = outcome.merged,
            "added item"
        );

        let items = state.items.items();
        self.publish(EventPayload::ItemsChanged {
            items: items.clone(),
        });
        let saved = self.save(GroupSlice::Items(items));
        Ok(Committed {
            value: outcome,
            saved,
        })
    }

    pub fn add_from_catalog(
        &self,
        details: CatalogItemDetails,
        quantity: u32,
    ) -> SdkResult<Committed<AddOutcome>> {
        self.add_item(details.into_candidate(quantity))
    }

    /// Fetch an entry from a catalog and add it.
    pub async fn import_from_catalog(
        &self,
        catalog: &dyn CatalogSource,
        ref_id: &str,
        quantity: u32,
    ) -> SdkResult<Committed<AddOutcome>> {
        let details = catalog
            .fetch_details(ref_id)
            .await?
            .ok_or_else(|| SdkError::Catalog(format!("unknown catalog entry {ref_id}")))?;
        self.add_from_catalog(details, quantity)
    }

    /// Set an item's total quantity.
    ///
    /// Zero deletes the item. A reduction below what characters hold follows
    /// the configured [`ShrinkPolicy`].
    pub fn update_quantity(
        &self,
        item_id: ItemId,
        quantity: u32,
    ) -> SdkResult<Committed<QuantityChange>> {
        if quantity == 0 {
            if self.is_closed() {
                return Err(SdkError::GroupNotFound(self.group_id));
            }
            return self
                .delete_item(item_id)
                .map(|c| c.map(QuantityChange::Deleted))
                .ok_or(SdkError::ItemNotFound(item_id));
        }

        let mut state = self.lock_open()?;
        let item = state
            .items
            .get(&item_id)
            .ok_or(SdkError::ItemNotFound(item_id))?;
        let plan = ConsistencyEnforcer::plan_shrink(
            &item,
            &state.ledger.ownerships_for_item(&item_id),
            quantity,
            self.services.shrink_policy,
        )?;
        let updated = state
            .items
            .set_quantity(&item_id, quantity, Utc::now())?
            .ok_or(SdkError::ItemNotFound(item_id))?;
        state.ledger.apply_shrink(&plan);

        let items = state.items.items();
        self.publish(EventPayload::ItemsChanged {
            items: items.clone(),
        });
        let saved = if plan.is_empty() {
            self.save(GroupSlice::Items(items))
        } else {
            info!(
                group = %self.group_id,
                item = %item_id,
                released = plan.total_released(),
                "released allocations to fit reduced quantity"
            );
            self.publish(EventPayload::OwnershipsChanged {
                item_id,
                ownerships: state.ledger.ownerships_for_item(&item_id),
            });
            self.save(GroupSlice::Inventory {
                items,
                ownerships: state.ledger.records(),
            })
        };

        Ok(Committed {
            value: QuantityChange::Updated {
                item: updated,
                plan,
            },
            saved,
        })
    }

    /// Delete an item and every ownership record of it.
    ///
    /// Returns `None` if the item does not exist or the group was deleted.
    pub fn delete_item(&self, item_id: ItemId) -> Option<Committed<DeletedItem>> {
        let mut state = self.lock_open().ok()?;
        if !state.items.contains(&item_id) {
            return None;
        }
        let purged = state.ledger.purge_item(&item_id);
        let item = state.items.remove(&item_id)?;
        debug!(group = %self.group_id, item = %item_id, purged = purged.len(), "deleted item");

        let items = state.items.items();
        self.publish(EventPayload::ItemDeleted {
            item_id,
            purged: purged.len(),
        });
        self.publish(EventPayload::ItemsChanged {
            items: items.clone(),
        });
        let saved = self.save(GroupSlice::Inventory {
            items,
            ownerships: state.ledger.records(),
        });
        Some(Committed {
            value: DeletedItem { item, purged },
            saved,
        })
    }

    // ── Ownership ─────────────────────────────────────────────────

    /// Give `quantity` more units of an item to a character.
    pub fn assign(
        &self,
        item_id: ItemId,
        character_id: CharacterId,
        quantity: u32,
        notes: Option<&str>,
    ) -> SdkResult<Committed<ItemOwnership>> {
        self.require_character(&character_id)?;
        let mut state = self.lock_open()?;
        let item = state
            .items
            .get(&item_id)
            .ok_or(SdkError::ItemNotFound(item_id))?;
        let record = state
            .ledger
            .assign(&item, character_id, quantity, notes, Utc::now())?;
        let saved = self.ownerships_changed(&state, item_id);
        Ok(Committed {
            value: record,
            saved,
        })
    }

    /// Return a character's whole holding of an item to party storage.
    ///
    /// Returns `None` when the character held none of it or the group was
    /// deleted.
    pub fn return_to_party(
        &self,
        item_id: ItemId,
        character_id: CharacterId,
    ) -> Option<Committed<ItemOwnership>> {
        let mut state = self.lock_open().ok()?;
        let record = state.ledger.return_to_party(&item_id, &character_id)?;
        let saved = self.ownerships_changed(&state, item_id);
        Some(Committed {
            value: record,
            saved,
        })
    }

    /// Set a character's holding of an item to exactly `quantity`.
    ///
    /// Zero returns the holding to party storage.
    pub fn set_ownership(
        &self,
        item_id: ItemId,
        character_id: CharacterId,
        quantity: u32,
    ) -> SdkResult<Committed<Option<ItemOwnership>>> {
        if quantity > 0 {
            self.require_character(&character_id)?;
        }
        let mut state = self.lock_open()?;
        let item = state
            .items
            .get(&item_id)
            .ok_or(SdkError::ItemNotFound(item_id))?;
        let record = state
            .ledger
            .set(&item, character_id, quantity, Utc::now())?;
        let saved = self.ownerships_changed(&state, item_id);
        Ok(Committed {
            value: record,
            saved,
        })
    }

    // ── Snapshots ─────────────────────────────────────────────────

    /// Store the group's current characters in its document.
    pub fn refresh_character_snapshot(&self) -> Committed<usize> {
        let characters = self.services.characters.characters_for_group(&self.group_id);
        let count = characters.len();
        let _state = self.lock();
        Committed {
            value: count,
            saved: self.save(GroupSlice::Characters(characters)),
        }
    }

    /// Store the group's connected session users in its document.
    pub fn refresh_session_snapshot(&self) -> Committed<usize> {
        let users = self.services.users.session_users(&self.group_id);
        let count = users.len();
        let _state = self.lock();
        Committed {
            value: count,
            saved: self.save(GroupSlice::Users(users)),
        }
    }

    pub fn rename(&self, name: impl Into<String>) -> Committed<()> {
        let mut state = self.lock();
        state.name = name.into();
        Committed {
            value: (),
            saved: self.save(GroupSlice::Name(state.name.clone())),
        }
    }

    // ── Reads ─────────────────────────────────────────────────────

    pub fn items(&self) -> Vec<InventoryItem> {
        self.lock().items.items()
    }

    pub fn item(&self, item_id: &ItemId) -> Option<InventoryItem> {
        self.lock().items.get(item_id)
    }

    pub fn find_item(&self, name: &str, category: ItemCategory) -> Option<InventoryItem> {
        self.lock().items.find_by_name_category(name, category)
    }

    pub fn ownerships_for_item(&self, item_id: &ItemId) -> Vec<ItemOwnership> {
        self.lock().ledger.ownerships_for_item(item_id)
    }

    pub fn ownerships(&self) -> Vec<ItemOwnership> {
        self.lock().ledger.records()
    }

    /// Units of the item in party storage, or `None` for an unknown item.
    pub fn unallocated(&self, item_id: &ItemId) -> Option<i64> {
        let state = self.lock();
        let item = state.items.get(item_id)?;
        Some(state.ledger.unallocated(&item))
    }

    pub fn carried_by(&self, character_id: &CharacterId) -> Vec<ItemOwnership> {
        self.lock().ledger.carried_by(character_id)
    }

    pub fn breakdown(&self, item_id: &ItemId) -> Option<AllocationBreakdown> {
        let state = self.lock();
        let item = state.items.get(item_id)?;
        Some(ProjectionBuilder::breakdown(&item, &state.ledger, |id| {
            self.services.characters.character(id).map(|c| c.name)
        }))
    }

    pub fn breakdowns(&self) -> Vec<AllocationBreakdown> {
        let state = self.lock();
        state
            .items
            .items()
            .iter()
            .map(|item| {
                ProjectionBuilder::breakdown(item, &state.ledger, |id| {
                    self.services.characters.character(id).map(|c| c.name)
                })
            })
            .collect()
    }

    pub fn summary(&self) -> InventorySummary {
        let state = self.lock();
        ProjectionBuilder::summary(&state.items.items(), &state.ledger)
    }

    /// Check the in-memory state against every invariant.
    pub fn audit(&self) -> ConsistencyReport {
        let state = self.lock();
        ConsistencyEnforcer::audit(&state.items.items(), &state.ledger.records())
    }

    /// Subscribe to this group's events.
    pub fn subscribe(&self) -> Subscription {
        self.services
            .events
            .subscribe(EventFilter::group(self.group_id))
    }

    // ── Internals ─────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().expect("group state lock poisoned")
    }

    fn lock_open(&self) -> SdkResult<MutexGuard<'_, GroupState>> {
        let state = self.lock();
        if state.closed {
            return Err(SdkError::GroupNotFound(self.group_id));
        }
        Ok(state)
    }

    /// Refuse further mutations. Handles held elsewhere see the group as gone.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
    }

    /// `true` once the group has been deleted.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn require_character(&self, character_id: &CharacterId) -> SdkResult<()> {
        match self.services.characters.character(character_id) {
            Some(_) => Ok(()),
            None => Err(SdkError::CharacterNotFound(*character_id)),
        }
    }

    fn publish(&self, payload: EventPayload) {
        self.services.events.publish(self.group_id, payload);
    }

    fn save(&self, slice: GroupSlice) -> SaveHandle {
        self.services.persist.save_group(self.group_id, slice)
    }

    /// Notify and persist after an ownership change. Called with the lock held.
    fn ownerships_changed(&self, state: &GroupState, item_id: ItemId) -> SaveHandle {
        self.publish(EventPayload::OwnershipsChanged {
            item_id,
            ownerships: state.ledger.ownerships_for_item(&item_id),
        });
        self.save(GroupSlice::Ownerships(state.ledger.records()))
    }
}

impl fmt::Debug for PartyInventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartyInventory")
            .field("group_id", &self.group_id)
            .finish_non_exhaustive()
    }
}
