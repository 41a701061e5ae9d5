//! Consistency rules shared by the item store and the ownership ledger.
//!
//! Everything here is pure: no I/O, no clocks beyond the `now` a caller
//! passes in. Checks run synchronously before a mutation is committed to
//! in-memory state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use hoard_types::{CharacterId, InventoryItem, ItemId, ItemOwnership};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LedgerError, LedgerResult};

/// What to do when an item's quantity drops below what characters hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShrinkPolicy {
    /// Refuse the reduction until holders return units.
    #[default]
    Reject,
    /// Take units back from the most recently claimed holders first.
    ReleaseMostRecent,
    /// Scale every holder down proportionally (largest remainder rounding).
    Proportional,
}

impl fmt::Display for ShrinkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reject => "reject",
            Self::ReleaseMostRecent => "release-most-recent",
            Self::Proportional => "proportional",
        })
    }
}

impl FromStr for ShrinkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "release-most-recent" | "most-recent" => Ok(Self::ReleaseMostRecent),
            "proportional" => Ok(Self::Proportional),
            other => Err(format!("unknown shrink policy: {other}")),
        }
    }
}

/// One holder's allocation change in a [`ShrinkPlan`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Release {
    pub character_id: CharacterId,
    pub from: u32,
    pub to: u32,
}

impl Release {
    pub fn released(&self) -> u32 {
        self.from - self.to
    }
}

/// Allocation changes that make an item fit a smaller quantity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShrinkPlan {
    pub item_id: ItemId,
    pub releases: Vec<Release>,
}

impl ShrinkPlan {
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn total_released(&self) -> u64 {
        self.releases.iter().map(|r| u64::from(r.released())).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// Records for an item sum above the item's quantity.
    OverAllocated,
    /// A record with zero units.
    NonPositiveRecord,
    /// A record referencing an item that does not exist.
    OrphanedRecord,
    /// More than one record for the same (item, character) pair.
    DuplicateRecord,
}

/// A specific consistency violation found by [`ConsistencyEnforcer::audit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub item_id: ItemId,
    pub character_id: Option<CharacterId>,
    pub description: String,
}

/// Result of auditing a set of items and ownership records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub item_count: usize,
    pub record_count: usize,
    pub violations: Vec<Violation>,
}

impl ConsistencyReport {
    /// Returns `true` if all checks passed.
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, kind: &ViolationKind) -> usize {
        self.violations.iter().filter(|v| &v.kind == kind).count()
    }
}

/// Pure validation logic guarding the allocation invariant.
pub struct ConsistencyEnforcer;

impl ConsistencyEnforcer {
    /// Check that `requested` more units of `item` may be allocated when
    /// `allocated` units are already held.
    pub fn check_assignment(
        item: &InventoryItem,
        allocated: u64,
        requested: u32,
    ) -> LedgerResult<()> {
        if requested == 0 {
            return Err(LedgerError::InvalidQuantity { requested });
        }
        let available = u64::from(item.quantity).saturating_sub(allocated);
        if u64::from(requested) > available {
            return Err(LedgerError::AllocationExceeded {
                item_id: item.id,
                requested,
                available,
            });
        }
        Ok(())
    }

    /// Check that a holder currently owning `current` units may be set to
    /// `new_quantity`. The holder's own units do not count against the cap.
    pub fn check_set(
        item: &InventoryItem,
        allocated: u64,
        current: u32,
        new_quantity: u32,
    ) -> LedgerResult<()> {
        let others = allocated.saturating_sub(u64::from(current));
        let available = u64::from(item.quantity).saturating_sub(others);
        if u64::from(new_quantity) > available {
            return Err(LedgerError::AllocationExceeded {
                item_id: item.id,
                requested: new_quantity,
                available,
            });
        }
        Ok(())
    }

    /// Decide how allocations change when `item` is reduced to `new_quantity`.
    ///
    /// Returns an empty plan when the allocations already fit.
    pub fn plan_shrink(
        item: &InventoryItem,
        records: &[ItemOwnership],
        new_quantity: u32,
        policy: ShrinkPolicy,
    ) -> LedgerResult<ShrinkPlan> {
        let allocated: u64 = records.iter().map(|r| u64::from(r.quantity_owned)).sum();
        if allocated <= u64::from(new_quantity) {
            return Ok(ShrinkPlan {
                item_id: item.id,
                releases: Vec::new(),
            });
        }

        let releases = match policy {
            ShrinkPolicy::Reject => {
                return Err(LedgerError::QuantityBelowAllocated {
                    item_id: item.id,
                    requested: new_quantity,
                    allocated,
                });
            }
            ShrinkPolicy::ReleaseMostRecent => {
                release_most_recent(records, allocated - u64::from(new_quantity))
            }
            ShrinkPolicy::Proportional => scale_proportionally(records, allocated, new_quantity),
        };

        Ok(ShrinkPlan {
            item_id: item.id,
            releases,
        })
    }

    /// Audit items and ownership records against every invariant.
    pub fn audit(items: &[InventoryItem], ownerships: &[ItemOwnership]) -> ConsistencyReport {
        let quantities: HashMap<ItemId, u32> = items.iter().map(|i| (i.id, i.quantity)).collect();
        let mut violations = Vec::new();
        let mut seen = HashSet::new();
        let mut allocated: BTreeMap<ItemId, u64> = BTreeMap::new();

        for record in ownerships {
            if !quantities.contains_key(&record.item_id) {
                violations.push(Violation {
                    kind: ViolationKind::OrphanedRecord,
                    item_id: record.item_id,
                    character_id: Some(record.character_id),
                    description: "ownership references an unknown item".into(),
                });
                continue;
            }
            if record.quantity_owned == 0 {
                violations.push(Violation {
                    kind: ViolationKind::NonPositiveRecord,
                    item_id: record.item_id,
                    character_id: Some(record.character_id),
                    description: "ownership record holds zero units".into(),
                });
            }
            if !seen.insert(record.key()) {
                violations.push(Violation {
                    kind: ViolationKind::DuplicateRecord,
                    item_id: record.item_id,
                    character_id: Some(record.character_id),
                    description: "more than one record for this item and character".into(),
                });
            }
            *allocated.entry(record.item_id).or_default() += u64::from(record.quantity_owned);
        }

        for (item_id, total) in allocated {
            let quantity = quantities[&item_id];
            if total > u64::from(quantity) {
                violations.push(Violation {
                    kind: ViolationKind::OverAllocated,
                    item_id,
                    character_id: None,
                    description: format!("{total} units allocated but quantity is {quantity}"),
                });
            }
        }

        ConsistencyReport {
            item_count: items.len(),
            record_count: ownerships.len(),
            violations,
        }
    }

    /// Bring loaded ownership records back in line with the invariants.
    ///
    /// Orphaned and zero records are dropped, duplicates merged, and
    /// over-allocation reconciled with `policy`. Loaded state cannot be
    /// refused, so [`ShrinkPolicy::Reject`] reconciles as
    /// [`ShrinkPolicy::ReleaseMostRecent`]. Returns the repaired records and
    /// the audit of the input.
    pub fn repair(
        items: &[InventoryItem],
        ownerships: Vec<ItemOwnership>,
        policy: ShrinkPolicy,
    ) -> (Vec<ItemOwnership>, ConsistencyReport) {
        let report = Self::audit(items, &ownerships);
        if report.is_consistent() {
            return (ownerships, report);
        }

        let by_id: HashMap<ItemId, &InventoryItem> = items.iter().map(|i| (i.id, i)).collect();
        let mut merged: BTreeMap<(ItemId, CharacterId), ItemOwnership> = BTreeMap::new();
        for record in ownerships {
            if record.quantity_owned == 0 || !by_id.contains_key(&record.item_id) {
                continue;
            }
            match merged.get_mut(&record.key()) {
                Some(existing) => {
                    existing.quantity_owned =
                        existing.quantity_owned.saturating_add(record.quantity_owned);
                    existing.claimed_date = existing.claimed_date.max(record.claimed_date);
                    if existing.notes.is_empty() {
                        existing.notes = record.notes;
                    }
                }
                None => {
                    merged.insert(record.key(), record);
                }
            }
        }

        let policy = match policy {
            ShrinkPolicy::Reject => ShrinkPolicy::ReleaseMostRecent,
            other => other,
        };

        let mut per_item: BTreeMap<ItemId, Vec<ItemOwnership>> = BTreeMap::new();
        for record in merged.into_values() {
            per_item.entry(record.item_id).or_default().push(record);
        }

        let mut repaired = Vec::new();
        for (item_id, mut records) in per_item {
            let item = by_id[&item_id];
            // Non-rejecting policies cannot fail.
            if let Ok(plan) = Self::plan_shrink(item, &records, item.quantity, policy) {
                apply_plan(&mut records, &plan);
            }
            repaired.extend(records);
        }

        warn!(
            violations = report.violations.len(),
            %policy,
            "repaired inconsistent ownership records"
        );
        (repaired, report)
    }
}

/// Apply a plan to an item's records in place, dropping emptied records.
pub(crate) fn apply_plan(records: &mut Vec<ItemOwnership>, plan: &ShrinkPlan) {
    for release in &plan.releases {
        if let Some(record) = records
            .iter_mut()
            .find(|r| r.character_id == release.character_id)
        {
            record.quantity_owned = release.to;
        }
    }
    records.retain(|r| r.quantity_owned > 0);
}

fn release_most_recent(records: &[ItemOwnership], mut excess: u64) -> Vec<Release> {
    let mut order: Vec<&ItemOwnership> = records.iter().collect();
    order.sort_by(|a, b| {
        b.claimed_date
            .cmp(&a.claimed_date)
            .then(b.character_id.cmp(&a.character_id))
    });

    let mut releases = Vec::new();
    for record in order {
        if excess == 0 {
            break;
        }
        let take = excess.min(u64::from(record.quantity_owned)) as u32;
        excess -= u64::from(take);
        releases.push(Release {
            character_id: record.character_id,
            from: record.quantity_owned,
            to: record.quantity_owned - take,
        });
    }
    releases
}

fn scale_proportionally(records: &[ItemOwnership], allocated: u64, target: u32) -> Vec<Release> {
    let target = u64::from(target);
    let mut shares: Vec<(&ItemOwnership, u64, u64)> = records
        .iter()
        .map(|r| {
            let scaled = u64::from(r.quantity_owned) * target;
            (r, scaled / allocated, scaled % allocated)
        })
        .collect();

    let floor_total: u64 = shares.iter().map(|(_, floor, _)| floor).sum();
    let mut leftover = target - floor_total;

    // Largest remainder first; earlier claims win ties.
    shares.sort_by(|a, b| {
        b.2.cmp(&a.2)
            .then(a.0.claimed_date.cmp(&b.0.claimed_date))
            .then(a.0.character_id.cmp(&b.0.character_id))
    });
    for share in shares.iter_mut() {
        if leftover == 0 {
            break;
        }
        share.1 += 1;
        leftover -= 1;
    }

    shares
        .into_iter()
        .filter(|(record, new, _)| *new != u64::from(record.quantity_owned))
        .map(|(record, new, _)| Release {
            character_id: record.character_id,
            from: record.quantity_owned,
            to: new as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use hoard_types::{ItemCandidate, ItemCategory};

    use super::*;

    fn item(quantity: u32) -> InventoryItem {
        InventoryItem::from_candidate(
            ItemCandidate::new("Potion of Healing", ItemCategory::Consumable, quantity),
            Utc::now(),
        )
    }

    fn record(item: &InventoryItem, qty: u32, minutes_ago: i64) -> ItemOwnership {
        ItemOwnership::new(
            item.id,
            CharacterId::new(),
            qty,
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }

    #[test]
    fn assignment_within_unallocated_passes() {
        let potion = item(10);
        ConsistencyEnforcer::check_assignment(&potion, 4, 6).unwrap();
    }

    #[test]
    fn assignment_above_unallocated_fails() {
        let potion = item(10);
        let err = ConsistencyEnforcer::check_assignment(&potion, 4, 7).unwrap_err();
        assert_eq!(
            err,
            LedgerError::AllocationExceeded {
                item_id: potion.id,
                requested: 7,
                available: 6
            }
        );
    }

    #[test]
    fn zero_assignment_is_invalid() {
        let potion = item(10);
        let err = ConsistencyEnforcer::check_assignment(&potion, 0, 0).unwrap_err();
        assert_eq!(err, LedgerError::InvalidQuantity { requested: 0 });
    }

    #[test]
    fn set_does_not_double_count_own_allocation() {
        let potion = item(10);
        // The holder's own 4 units are released back before the cap is checked.
        ConsistencyEnforcer::check_set(&potion, 10, 4, 4).unwrap();
        ConsistencyEnforcer::check_set(&potion, 6, 4, 8).unwrap();
        assert!(ConsistencyEnforcer::check_set(&potion, 6, 4, 9).is_err());
    }

    #[test]
    fn shrink_that_fits_is_empty_plan() {
        let potion = item(10);
        let records = vec![record(&potion, 3, 1)];
        let plan =
            ConsistencyEnforcer::plan_shrink(&potion, &records, 5, ShrinkPolicy::Reject).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn reject_policy_refuses_shrink_below_allocation() {
        let potion = item(10);
        let records = vec![record(&potion, 4, 2), record(&potion, 6, 1)];
        let err =
            ConsistencyEnforcer::plan_shrink(&potion, &records, 5, ShrinkPolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            LedgerError::QuantityBelowAllocated {
                item_id: potion.id,
                requested: 5,
                allocated: 10
            }
        );
    }

    #[test]
    fn release_most_recent_takes_from_newest_claim_first() {
        let potion = item(10);
        let older = record(&potion, 4, 10);
        let newer = record(&potion, 6, 1);
        let plan = ConsistencyEnforcer::plan_shrink(
            &potion,
            &[older.clone(), newer.clone()],
            3,
            ShrinkPolicy::ReleaseMostRecent,
        )
        .unwrap();

        assert_eq!(plan.total_released(), 7);
        assert_eq!(plan.releases[0].character_id, newer.character_id);
        assert_eq!(plan.releases[0].to, 0);
        assert_eq!(plan.releases[1].character_id, older.character_id);
        assert_eq!(plan.releases[1].to, 3);
    }

    #[test]
    fn proportional_scales_to_exact_target() {
        let potion = item(10);
        let a = record(&potion, 6, 3);
        let b = record(&potion, 3, 2);
        let c = record(&potion, 1, 1);
        let records = vec![a.clone(), b.clone(), c.clone()];
        let plan =
            ConsistencyEnforcer::plan_shrink(&potion, &records, 5, ShrinkPolicy::Proportional)
                .unwrap();

        let mut after = records.clone();
        apply_plan(&mut after, &plan);
        let total: u32 = after.iter().map(|r| r.quantity_owned).sum();
        assert_eq!(total, 5);
        let a_after = after.iter().find(|r| r.character_id == a.character_id).unwrap();
        assert_eq!(a_after.quantity_owned, 3);
    }

    #[test]
    fn audit_reports_every_violation_kind() {
        let potion = item(5);
        let holder = CharacterId::new();
        let records = vec![
            ItemOwnership::new(potion.id, holder, 4, Utc::now()),
            ItemOwnership::new(potion.id, holder, 3, Utc::now()),
            ItemOwnership::new(potion.id, CharacterId::new(), 0, Utc::now()),
            ItemOwnership::new(ItemId::new(), CharacterId::new(), 1, Utc::now()),
        ];
        let report = ConsistencyEnforcer::audit(&[potion], &records);
        assert!(!report.is_consistent());
        assert_eq!(report.count(&ViolationKind::DuplicateRecord), 1);
        assert_eq!(report.count(&ViolationKind::NonPositiveRecord), 1);
        assert_eq!(report.count(&ViolationKind::OrphanedRecord), 1);
        assert_eq!(report.count(&ViolationKind::OverAllocated), 1);
    }

    #[test]
    fn audit_of_consistent_state_is_clean() {
        let potion = item(5);
        let records = vec![record(&potion, 2, 1), record(&potion, 3, 2)];
        let report = ConsistencyEnforcer::audit(&[potion], &records);
        assert!(report.is_consistent());
        assert_eq!(report.record_count, 2);
    }

    #[test]
    fn repair_restores_invariants() {
        let potion = item(5);
        let holder = CharacterId::new();
        let records = vec![
            ItemOwnership::new(potion.id, holder, 4, Utc::now() - Duration::minutes(5)),
            ItemOwnership::new(potion.id, holder, 3, Utc::now()),
            ItemOwnership::new(potion.id, CharacterId::new(), 0, Utc::now()),
            ItemOwnership::new(ItemId::new(), CharacterId::new(), 1, Utc::now()),
        ];
        let items = vec![potion.clone()];
        let (repaired, report) =
            ConsistencyEnforcer::repair(&items, records, ShrinkPolicy::Reject);

        assert!(!report.is_consistent());
        assert_eq!(repaired.len(), 1);
        assert_eq!(repaired[0].character_id, holder);
        assert_eq!(repaired[0].quantity_owned, 5);
        assert!(ConsistencyEnforcer::audit(&items, &repaired).is_consistent());
    }

    #[test]
    fn shrink_policy_parses_and_displays() {
        for policy in [
            ShrinkPolicy::Reject,
            ShrinkPolicy::ReleaseMostRecent,
            ShrinkPolicy::Proportional,
        ] {
            assert_eq!(policy.to_string().parse::<ShrinkPolicy>().unwrap(), policy);
        }
        assert!("scatter".parse::<ShrinkPolicy>().is_err());
    }
}
