use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use hoard_events::{EventBus, EventFilter, EventPayload, Subscription, SubscriptionId};
use hoard_persist::{
    DocumentKey, DocumentStore, FailureHook, GroupRegistryPatch, GroupSlice, PersistError,
    SaveHandle, UserRegistryPatch,
};
use hoard_types::{Group, GroupId, UserRecord};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::HoardConfig;
use crate::directory::{CharacterDirectory, GroupDirectory, InMemoryDirectory, UserDirectory};
use crate::error::{SdkError, SdkResult};
use crate::inventory::{PartyInventory, Services};

/// Process-level entry point: owns persistence, the event bus, and every
/// open group.
pub struct Hoard {
    config: HoardConfig,
    persist: Arc<DocumentStore>,
    events: Arc<EventBus>,
    characters: Arc<dyn CharacterDirectory>,
    groups: Arc<dyn GroupDirectory>,
    users: Arc<dyn UserDirectory>,
    local: Option<Arc<InMemoryDirectory>>,
    open: Mutex<HashMap<GroupId, Arc<PartyInventory>>>,
}

impl Hoard {
    /// Open with a built-in directory seeded from the persisted group and
    /// user registries. Characters are seeded from each group's snapshot as
    /// the group is opened.
    pub async fn open(config: HoardConfig) -> SdkResult<Self> {
        let (persist, events) = Self::services(&config).await?;

        let local = Arc::new(InMemoryDirectory::new());
        for group in persist.load_group_registry().await?.groups {
            local.insert_group(group);
        }
        for user in persist.load_user_registry().await?.users {
            local.insert_user(user);
        }

        Ok(Self {
            config,
            persist,
            events,
            characters: local.clone(),
            groups: local.clone(),
            users: local.clone(),
            local: Some(local),
            open: Mutex::new(HashMap::new()),
        })
    }

    /// Open with directories provided by the embedding application.
    pub async fn with_directories(
        config: HoardConfig,
        characters: Arc<dyn CharacterDirectory>,
        groups: Arc<dyn GroupDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> SdkResult<Self> {
        let (persist, events) = Self::services(&config).await?;
        Ok(Self {
            config,
            persist,
            events,
            characters,
            groups,
            users,
            local: None,
            open: Mutex::new(HashMap::new()),
        })
    }

    async fn services(config: &HoardConfig) -> SdkResult<(Arc<DocumentStore>, Arc<EventBus>)> {
        let events = Arc::new(EventBus::new(config.events.clone()));

        let bus = events.clone();
        let hook: FailureHook = Arc::new(move |key: &DocumentKey, err: &PersistError| {
            if let DocumentKey::Group(group_id) = key {
                bus.publish(
                    *group_id,
                    EventPayload::PersistFailed {
                        document: key.to_string(),
                        error: err.to_string(),
                    },
                );
            }
        });

        let persist = DocumentStore::open(config.storage.clone())
            .await?
            .with_failure_hook(hook);
        Ok((Arc::new(persist), events))
    }

    pub fn config(&self) -> &HoardConfig {
        &self.config
    }

    /// The built-in directory, when the service was started with [`Hoard::open`].
    pub fn local_directory(&self) -> Option<&Arc<InMemoryDirectory>> {
        self.local.as_ref()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.events.subscribe(filter)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn groups(&self) -> Vec<Group> {
        self.groups.groups()
    }

    /// Open a group's inventory, loading it on first use.
    ///
    /// Later calls return the same instance. Fails with
    /// [`SdkError::GroupNotFound`] when the group is neither known to the
    /// directory nor stored on disk.
    pub async fn open_group(&self, group_id: GroupId) -> SdkResult<Arc<PartyInventory>> {
        let mut open = self.open.lock().await;
        if let Some(inventory) = open.get(&group_id) {
            return Ok(inventory.clone());
        }

        let group = self.groups.group(&group_id);
        let doc = self.persist.load_group(group_id).await?;
        if group.is_none() && doc.version == 0 {
            return Err(SdkError::GroupNotFound(group_id));
        }

        if let Some(local) = &self.local {
            for character in &doc.characters {
                if local.character(&character.id).is_none() {
                    local.insert_character(character.clone());
                }
            }
        }

        let name = match group {
            Some(group) => group.name,
            None => doc.group_name.clone(),
        };
        let items = doc.items.len();
        let inventory = Arc::new(PartyInventory::from_document(doc, name, self.group_services())?);
        open.insert(group_id, inventory.clone());
        info!(group = %group_id, items, "opened group");
        Ok(inventory)
    }

    /// Register a new group and open its (empty) inventory.
    pub async fn create_group(&self, group: Group) -> SdkResult<Arc<PartyInventory>> {
        let group_id = group.id;
        let name = group.name.clone();
        self.register_group(group).await?;
        self.persist
            .save_group(group_id, GroupSlice::Name(name))
            .await?;
        self.open_group(group_id).await
    }

    /// Insert or replace a group in the registry.
    pub fn register_group(&self, group: Group) -> SaveHandle {
        if let Some(local) = &self.local {
            local.insert_group(group.clone());
        }
        self.persist
            .save_group_registry(GroupRegistryPatch::Upsert(group))
    }

    pub fn register_user(&self, user: UserRecord) -> SaveHandle {
        if let Some(local) = &self.local {
            local.insert_user(user.clone());
        }
        self.persist.save_user_registry(UserRegistryPatch::Upsert(user))
    }

    /// Copy a group's document into the backup directory.
    pub async fn backup_group(&self, group_id: GroupId) -> SdkResult<Option<PathBuf>> {
        Ok(self.persist.backup_group(group_id).await?)
    }

    /// Close a group, back up its document, and remove it from disk and the
    /// registry. Returns the backup path.
    ///
    /// Inventory handles still held by callers are closed: their mutations
    /// fail with [`SdkError::GroupNotFound`] and never recreate the document.
    pub async fn delete_group(&self, group_id: GroupId) -> SdkResult<Option<PathBuf>> {
        if let Some(inventory) = self.open.lock().await.remove(&group_id) {
            inventory.close();
        }
        let backup = self.persist.delete_group(group_id).await?;
        self.persist
            .save_group_registry(GroupRegistryPatch::Remove(group_id))
            .await?;
        if let Some(local) = &self.local {
            local.remove_group(&group_id);
        }
        info!(group = %group_id, backup = ?backup, "deleted group");
        Ok(backup)
    }

    /// Wait for every queued save and stop accepting new ones.
    pub async fn shutdown(&self) {
        self.open.lock().await.clear();
        self.persist.shutdown().await;
        info!("hoard shut down");
    }

    fn group_services(&self) -> Services {
        Services {
            persist: self.persist.clone(),
            events: self.events.clone(),
            characters: self.characters.clone(),
            users: self.users.clone(),
            shrink_policy: self.config.ledger.shrink_policy,
        }
    }
}
