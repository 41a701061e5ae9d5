//! Read-only views of characters, groups, and users.
//!
//! These records belong to sibling subsystems. The inventory engine only
//! reads them, so the traits take `&self` and return owned clones.

use std::collections::HashMap;
use std::sync::RwLock;

use hoard_types::{CharacterId, Group, GroupId, PlayerCharacter, SessionUser, UserId, UserRecord};

pub trait CharacterDirectory: Send + Sync {
    fn character(&self, id: &CharacterId) -> Option<PlayerCharacter>;

    /// Characters listed on the group, in the group's order.
    fn characters_for_group(&self, group: &GroupId) -> Vec<PlayerCharacter>;
}

pub trait GroupDirectory: Send + Sync {
    fn group(&self, id: &GroupId) -> Option<Group>;

    fn groups(&self) -> Vec<Group>;
}

pub trait UserDirectory: Send + Sync {
    fn user(&self, id: &UserId) -> Option<UserRecord>;

    /// Users currently connected to the group's session.
    fn session_users(&self, group: &GroupId) -> Vec<SessionUser>;
}

#[derive(Default)]
struct Records {
    characters: HashMap<CharacterId, PlayerCharacter>,
    groups: HashMap<GroupId, Group>,
    users: HashMap<UserId, UserRecord>,
    sessions: HashMap<GroupId, Vec<SessionUser>>,
}

/// A directory kept in memory, for tests and the command line.
#[derive(Default)]
pub struct InMemoryDirectory {
    records: RwLock<Records>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_character(&self, character: PlayerCharacter) {
        self.write().characters.insert(character.id, character);
    }

    pub fn insert_group(&self, group: Group) {
        self.write().groups.insert(group.id, group);
    }

    pub fn remove_group(&self, id: &GroupId) -> Option<Group> {
        let mut records = self.write();
        records.sessions.remove(id);
        records.groups.remove(id)
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.write().users.insert(user.id, user);
    }

    pub fn set_session_users(&self, group: GroupId, users: Vec<SessionUser>) {
        self.write().sessions.insert(group, users);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Records> {
        self.records.read().expect("directory lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Records> {
        self.records.write().expect("directory lock poisoned")
    }
}

impl CharacterDirectory for InMemoryDirectory {
    fn character(&self, id: &CharacterId) -> Option<PlayerCharacter> {
        self.read().characters.get(id).cloned()
    }

    fn characters_for_group(&self, group: &GroupId) -> Vec<PlayerCharacter> {
        let records = self.read();
        records
            .groups
            .get(group)
            .map(|g| {
                g.character_ids
                    .iter()
                    .filter_map(|id| records.characters.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl GroupDirectory for InMemoryDirectory {
    fn group(&self, id: &GroupId) -> Option<Group> {
        self.read().groups.get(id).cloned()
    }

    fn groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = self.read().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        groups
    }
}

impl UserDirectory for InMemoryDirectory {
    fn user(&self, id: &UserId) -> Option<UserRecord> {
        self.read().users.get(id).cloned()
    }

    fn session_users(&self, group: &GroupId) -> Vec<SessionUser> {
        self.read().sessions.get(group).cloned().unwrap_or_default()
    }
}
