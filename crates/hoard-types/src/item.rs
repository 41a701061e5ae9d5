use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::ItemId;

/// Closed set of inventory item categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemCategory {
    Armor,
    Weapon,
    Shield,
    Jewelry,
    Consumable,
    Tool,
    Book,
    Currency,
    MagicItem,
    Ammunition,
    Miscellaneous,
    QuestItem,
}

impl ItemCategory {
    /// Every category in declaration order.
    pub const ALL: [ItemCategory; 12] = [
        Self::Armor,
        Self::Weapon,
        Self::Shield,
        Self::Jewelry,
        Self::Consumable,
        Self::Tool,
        Self::Book,
        Self::Currency,
        Self::MagicItem,
        Self::Ammunition,
        Self::Miscellaneous,
        Self::QuestItem,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Armor => "Armor",
            Self::Weapon => "Weapon",
            Self::Shield => "Shield",
            Self::Jewelry => "Jewelry",
            Self::Consumable => "Consumable",
            Self::Tool => "Tool",
            Self::Book => "Book",
            Self::Currency => "Currency",
            Self::MagicItem => "Magic Item",
            Self::Ammunition => "Ammunition",
            Self::Miscellaneous => "Miscellaneous",
            Self::QuestItem => "Quest Item",
        }
    }
}

impl Default for ItemCategory {
    fn default() -> Self {
        Self::Miscellaneous
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ItemCategory {
    type Err = TypeError;

    /// Accepts the variant name or the label, ignoring case, spaces, `-` and `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|category| {
                let candidate: String = format!("{category:?}").to_lowercase();
                candidate == wanted
            })
            .ok_or_else(|| TypeError::UnknownCategory(s.to_string()))
    }
}

/// Normalized input for adding an item to a party inventory.
///
/// Produced by callers directly or converted from a catalog lookup result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemCandidate {
    pub name: String,
    pub category: ItemCategory,
    pub quantity: u32,
    pub weight: f64,
    pub value: f64,
    pub description: String,
    pub properties: BTreeMap<String, String>,
    pub owner: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl ItemCandidate {
    pub fn new(name: impl Into<String>, category: ItemCategory, quantity: u32) -> Self {
        Self {
            name: name.into(),
            category,
            quantity,
            weight: 0.0,
            value: 0.0,
            description: String::new(),
            properties: BTreeMap::new(),
            owner: None,
            thumbnail_url: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A shared inventory item.
///
/// `quantity` is the total number of units the party holds. How those units
/// are split between characters is tracked by the ownership ledger, never on
/// the item itself. `owner` is a legacy single-owner label kept for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub category: ItemCategory,
    pub quantity: u32,
    /// Weight of a single unit.
    #[serde(default)]
    pub weight: f64,
    /// Value of a single unit.
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl InventoryItem {
    /// Build a fresh item with a newly generated id.
    pub fn from_candidate(candidate: ItemCandidate, now: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            name: candidate.name.trim().to_string(),
            category: candidate.category,
            quantity: candidate.quantity,
            weight: candidate.weight,
            value: candidate.value,
            description: candidate.description,
            properties: candidate.properties,
            owner: candidate.owner,
            thumbnail_url: candidate.thumbnail_url,
            created_at: now,
            last_modified: now,
        }
    }

    /// Key used to detect duplicate items: trimmed, lower-cased name plus category.
    pub fn merge_key(&self) -> (String, ItemCategory) {
        merge_key(&self.name, self.category)
    }

    pub fn total_weight(&self) -> f64 {
        self.weight * f64::from(self.quantity)
    }

    pub fn total_value(&self) -> f64 {
        self.value * f64::from(self.quantity)
    }
}

/// Normalize a (name, category) pair for duplicate detection.
pub fn merge_key(name: &str, category: ItemCategory) -> (String, ItemCategory) {
    (name.trim().to_lowercase(), category)
}
