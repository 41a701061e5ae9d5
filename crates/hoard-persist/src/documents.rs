//! On-disk document shapes and the slice patches applied to them.

use chrono::{DateTime, Utc};
use hoard_types::{
    Group, GroupId, InventoryItem, ItemOwnership, PlayerCharacter, SessionUser, UserId, UserRecord,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A versioned top-level JSON document.
pub trait Document: Serialize + DeserializeOwned + Send + 'static {
    fn version(&self) -> u64;

    /// Bump the version and record the save time. Returns the new version.
    fn stamp(&mut self, now: DateTime<Utc>) -> u64;
}

macro_rules! versioned {
    ($doc:ty) => {
        impl Document for $doc {
            fn version(&self) -> u64 {
                self.version
            }

            fn stamp(&mut self, now: DateTime<Utc>) -> u64 {
                self.version += 1;
                self.last_saved = Some(now);
                self.version
            }
        }
    };
}

/// Inventory state of one group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDocument {
    pub group_id: GroupId,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub last_saved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<InventoryItem>,
    #[serde(default)]
    pub item_ownerships: Vec<ItemOwnership>,
    #[serde(default)]
    pub characters: Vec<PlayerCharacter>,
    #[serde(default)]
    pub users: Vec<SessionUser>,
}

impl GroupDocument {
    pub fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            ..Self::default()
        }
    }
}

versioned!(GroupDocument);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRegistryDocument {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub last_saved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl GroupRegistryDocument {
    pub fn find(&self, id: &GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| &g.id == id)
    }
}

versioned!(GroupRegistryDocument);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistryDocument {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub last_saved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

impl UserRegistryDocument {
    pub fn find(&self, id: &UserId) -> Option<&UserRecord> {
        self.users.iter().find(|u| &u.id == id)
    }
}

versioned!(UserRegistryDocument);

/// The part of a group document a save replaces. Everything else on disk is
/// kept as it was.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupSlice {
    Name(String),
    Items(Vec<InventoryItem>),
    Ownerships(Vec<ItemOwnership>),
    /// Items and ownerships together, for changes that touch both.
    Inventory {
        items: Vec<InventoryItem>,
        ownerships: Vec<ItemOwnership>,
    },
    Characters(Vec<PlayerCharacter>),
    Users(Vec<SessionUser>),
}

impl GroupSlice {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::Items(_) => "items",
            Self::Ownerships(_) => "ownerships",
            Self::Inventory { .. } => "inventory",
            Self::Characters(_) => "characters",
            Self::Users(_) => "users",
        }
    }

    pub fn apply(self, doc: &mut GroupDocument) {
        match self {
            Self::Name(name) => doc.group_name = name,
            Self::Items(items) => doc.items = items,
            Self::Ownerships(ownerships) => doc.item_ownerships = ownerships,
            Self::Inventory { items, ownerships } => {
                doc.items = items;
                doc.item_ownerships = ownerships;
            }
            Self::Characters(characters) => doc.characters = characters,
            Self::Users(users) => doc.users = users,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GroupRegistryPatch {
    /// Insert a group, or replace the entry with the same id.
    Upsert(Group),
    Remove(GroupId),
}

impl GroupRegistryPatch {
    pub fn apply(self, doc: &mut GroupRegistryDocument) {
        match self {
            Self::Upsert(group) => match doc.groups.iter_mut().find(|g| g.id == group.id) {
                Some(existing) => *existing = group,
                None => doc.groups.push(group),
            },
            Self::Remove(id) => doc.groups.retain(|g| g.id != id),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UserRegistryPatch {
    Upsert(UserRecord),
    Remove(UserId),
}

impl UserRegistryPatch {
    pub fn apply(self, doc: &mut UserRegistryDocument) {
        match self {
            Self::Upsert(user) => match doc.users.iter_mut().find(|u| u.id == user.id) {
                Some(existing) => *existing = user,
                None => doc.users.push(user),
            },
            Self::Remove(id) => doc.users.retain(|u| u.id != id),
        }
    }
}
