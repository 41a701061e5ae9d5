//! Records owned by sibling subsystems.
//!
//! Characters, groups, and users are managed elsewhere. The inventory engine
//! only reads them (to validate a claimant or render a name) and stores
//! denormalized snapshots of them inside group documents.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{CharacterId, GroupId, UserId};

/// A player character. Belongs to exactly one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCharacter {
    pub id: CharacterId,
    pub name: String,
    pub owner_user_id: UserId,
    #[serde(rename = "class", default)]
    pub character_class: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_level() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

impl PlayerCharacter {
    pub fn new(name: impl Into<String>, owner_user_id: UserId) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            owner_user_id,
            character_class: String::new(),
            level: default_level(),
            avatar: None,
            notes: String::new(),
            date_created: Utc::now(),
            last_played: None,
            is_active: true,
        }
    }

    pub fn with_class(mut self, class: impl Into<String>, level: u32) -> Self {
        self.character_class = class.into();
        self.level = level;
        self
    }
}

/// Access level of a group member, ordered from least to most privileged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionLevel {
    Viewer,
    Member,
    Admin,
    Owner,
}

impl PermissionLevel {
    /// Whether the level allows changing inventory contents.
    pub fn can_edit(&self) -> bool {
        *self >= Self::Member
    }
}

impl Default for PermissionLevel {
    fn default() -> Self {
        Self::Member
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl FromStr for PermissionLevel {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            _ => Err(TypeError::UnknownPermission(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub user_id: UserId,
    pub permission: PermissionLevel,
}

/// A campaign group sharing one inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: Vec<GroupMember>,
    #[serde(default)]
    pub character_ids: Vec<CharacterId>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(),
            name: name.into(),
            description: String::new(),
            members: Vec::new(),
            character_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn permission_of(&self, user: &UserId) -> Option<PermissionLevel> {
        self.members
            .iter()
            .find(|m| &m.user_id == user)
            .map(|m| m.permission)
    }

    pub fn has_character(&self, character: &CharacterId) -> bool {
        self.character_ids.contains(character)
    }
}

/// Entry of the global user registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            created_at: Utc::now(),
            last_seen: None,
        }
    }
}

/// A user connected to a group session, as snapshotted in a group document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub client_id: String,
    pub user_id: UserId,
    pub name: String,
    pub permission: PermissionLevel,
    pub connection_time: DateTime<Utc>,
    #[serde(default)]
    pub is_online: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_ordering() {
        assert!(PermissionLevel::Owner > PermissionLevel::Admin);
        assert!(PermissionLevel::Member.can_edit());
        assert!(!PermissionLevel::Viewer.can_edit());
    }

    #[test]
    fn permission_parse() {
        assert_eq!("Admin".parse::<PermissionLevel>().unwrap(), PermissionLevel::Admin);
        assert!("root".parse::<PermissionLevel>().is_err());
    }

    #[test]
    fn character_class_serializes_as_class() {
        let c = PlayerCharacter::new("Aria", UserId::new()).with_class("Rogue", 3);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["class"], "Rogue");
        assert_eq!(json["ownerUserId"], c.owner_user_id.to_string());
        assert_eq!(json["isActive"], true);
    }

    #[test]
    fn group_membership_lookup() {
        let owner = UserId::new();
        let mut group = Group::new("Company of the Lantern");
        group.members.push(GroupMember {
            user_id: owner,
            permission: PermissionLevel::Owner,
        });
        assert_eq!(group.permission_of(&owner), Some(PermissionLevel::Owner));
        assert_eq!(group.permission_of(&UserId::new()), None);
    }
}
