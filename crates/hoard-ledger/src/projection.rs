//! Read-only views derived from items and the ledger.

use std::collections::BTreeMap;
use std::fmt;

use hoard_types::{CharacterId, InventoryItem, ItemId};
use serde::Serialize;

use crate::ledger::OwnershipLedger;

/// One character's share of an item.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderShare {
    pub character_id: CharacterId,
    pub name: String,
    pub quantity: u32,
}

/// Who holds how much of one item, plus the party-storage remainder.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationBreakdown {
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: u32,
    pub holders: Vec<HolderShare>,
    pub party_storage: i64,
}

impl AllocationBreakdown {
    pub fn party_storage(&self) -> i64 {
        self.party_storage
    }

    pub fn allocated(&self) -> u64 {
        self.holders.iter().map(|h| u64::from(h.quantity)).sum()
    }
}

impl fmt::Display for AllocationBreakdown {
    /// `Aria: 4, Bren: 3, Party Storage: 3`. Party storage is omitted when empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .holders
            .iter()
            .map(|h| format!("{}: {}", h.name, h.quantity))
            .collect();
        if self.party_storage != 0 {
            parts.push(format!("Party Storage: {}", self.party_storage));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Carried totals for one character.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterLoad {
    pub character_id: CharacterId,
    pub units: u64,
    pub weight: f64,
    pub value: f64,
}

/// Aggregate statistics over a group's inventory.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub item_count: usize,
    pub total_units: u64,
    pub total_weight: f64,
    pub total_value: f64,
    pub party_storage_units: u64,
    pub party_storage_weight: f64,
    pub per_character: Vec<CharacterLoad>,
}

pub struct ProjectionBuilder;

impl ProjectionBuilder {
    /// Build the breakdown of one item.
    ///
    /// `name_of` renders character names; unknown characters fall back to
    /// their short id.
    pub fn breakdown<F>(item: &InventoryItem, ledger: &OwnershipLedger, name_of: F) -> AllocationBreakdown
    where
        F: Fn(&CharacterId) -> Option<String>,
    {
        let mut holders: Vec<HolderShare> = ledger
            .ownerships_for_item(&item.id)
            .into_iter()
            .map(|r| HolderShare {
                name: name_of(&r.character_id).unwrap_or_else(|| r.character_id.short_id()),
                character_id: r.character_id,
                quantity: r.quantity_owned,
            })
            .collect();
        holders.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));

        AllocationBreakdown {
            item_id: item.id,
            item_name: item.name.clone(),
            quantity: item.quantity,
            holders,
            party_storage: ledger.unallocated(item),
        }
    }

    /// Totals over all items, split into party storage and per-character loads.
    pub fn summary(items: &[InventoryItem], ledger: &OwnershipLedger) -> InventorySummary {
        let mut summary = InventorySummary {
            item_count: items.len(),
            ..InventorySummary::default()
        };
        let mut loads: BTreeMap<CharacterId, CharacterLoad> = BTreeMap::new();

        for item in items {
            summary.total_units += u64::from(item.quantity);
            summary.total_weight += item.total_weight();
            summary.total_value += item.total_value();

            let stored = ledger.unallocated(item).max(0) as u64;
            summary.party_storage_units += stored;
            summary.party_storage_weight += stored as f64 * item.weight;

            for record in ledger.ownerships_for_item(&item.id) {
                let load = loads.entry(record.character_id).or_insert_with(|| CharacterLoad {
                    character_id: record.character_id,
                    units: 0,
                    weight: 0.0,
                    value: 0.0,
                });
                let units = u64::from(record.quantity_owned);
                load.units += units;
                load.weight += units as f64 * item.weight;
                load.value += units as f64 * item.value;
            }
        }

        summary.per_character = loads.into_values().collect();
        summary
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use hoard_types::{ItemCandidate, ItemCategory};

    use super::*;

    fn arrows() -> InventoryItem {
        InventoryItem::from_candidate(
            ItemCandidate::new("Arrow", ItemCategory::Ammunition, 10)
                .with_weight(0.1)
                .with_value(1.0),
            Utc::now(),
        )
    }

    #[test]
    fn breakdown_renders_holders_and_party_storage() {
        let item = arrows();
        let (aria, bren) = (CharacterId::new(), CharacterId::new());
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&item, aria, 4, None, Utc::now()).unwrap();
        ledger.assign(&item, bren, 3, None, Utc::now()).unwrap();

        let names = |id: &CharacterId| {
            if *id == aria {
                Some("Aria".to_string())
            } else if *id == bren {
                Some("Bren".to_string())
            } else {
                None
            }
        };
        let breakdown = ProjectionBuilder::breakdown(&item, &ledger, names);

        assert_eq!(breakdown.party_storage(), 3);
        assert_eq!(breakdown.allocated(), 7);
        assert_eq!(breakdown.to_string(), "Aria: 4, Bren: 3, Party Storage: 3");
    }

    #[test]
    fn breakdown_omits_empty_party_storage() {
        let item = arrows();
        let aria = CharacterId::new();
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&item, aria, 10, None, Utc::now()).unwrap();

        let breakdown = ProjectionBuilder::breakdown(&item, &ledger, |_| Some("Aria".into()));
        assert_eq!(breakdown.to_string(), "Aria: 10");
    }

    #[test]
    fn breakdown_falls_back_to_short_id() {
        let item = arrows();
        let ghost = CharacterId::new();
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&item, ghost, 1, None, Utc::now()).unwrap();

        let breakdown = ProjectionBuilder::breakdown(&item, &ledger, |_| None);
        assert_eq!(breakdown.holders[0].name, ghost.short_id());
    }

    #[test]
    fn summary_splits_party_storage_and_loads() {
        let item = arrows();
        let aria = CharacterId::new();
        let mut ledger = OwnershipLedger::new();
        ledger.assign(&item, aria, 4, None, Utc::now()).unwrap();

        let summary = ProjectionBuilder::summary(std::slice::from_ref(&item), &ledger);
        assert_eq!(summary.item_count, 1);
        assert_eq!(summary.total_units, 10);
        assert_eq!(summary.party_storage_units, 6);
        assert_eq!(summary.per_character.len(), 1);
        assert_eq!(summary.per_character[0].units, 4);
        assert!((summary.per_character[0].weight - 0.4).abs() < 1e-9);
        assert!((summary.total_value - 10.0).abs() < 1e-9);
    }
}
