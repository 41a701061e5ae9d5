use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, ItemId};

/// The share of one item held by one character.
///
/// A record only exists while `quantity_owned > 0`; reaching zero deletes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOwnership {
    pub item_id: ItemId,
    pub character_id: CharacterId,
    pub quantity_owned: u32,
    pub claimed_date: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

impl ItemOwnership {
    pub fn new(
        item_id: ItemId,
        character_id: CharacterId,
        quantity_owned: u32,
        claimed_date: DateTime<Utc>,
    ) -> Self {
        Self {
            item_id,
            character_id,
            quantity_owned,
            claimed_date,
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// The (item, character) pair identifying this record.
    pub fn key(&self) -> (ItemId, CharacterId) {
        (self.item_id, self.character_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_document_field_names() {
        let record = ItemOwnership::new(ItemId::new(), CharacterId::new(), 3, Utc::now())
            .with_notes("spare");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["quantityOwned"], 3);
        assert_eq!(json["notes"], "spare");
        assert!(json.get("claimedDate").is_some());

        let back: ItemOwnership = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
