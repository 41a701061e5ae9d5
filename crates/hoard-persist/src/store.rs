use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use hoard_types::GroupId;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::documents::{
    GroupDocument, GroupRegistryDocument, GroupRegistryPatch, GroupSlice, UserRegistryDocument,
    UserRegistryPatch,
};
use crate::error::{PersistError, PersistResult};
use crate::files;
use crate::keys::sanitize_key;
use crate::writer::{FailureHook, Job, Patch, Writer};

/// Identifies one document file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    Group(GroupId),
    GroupRegistry,
    UserRegistry,
}

impl DocumentKey {
    pub fn file_name(&self, max_key_len: usize) -> String {
        match self {
            Self::Group(id) => format!("group-{}.json", sanitize_key(&id.to_string(), max_key_len)),
            Self::GroupRegistry => "groups.json".to_string(),
            Self::UserRegistry => "users.json".to_string(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(id) => write!(f, "group:{}", id.short_id()),
            Self::GroupRegistry => f.write_str("groups"),
            Self::UserRegistry => f.write_str("users"),
        }
    }
}

enum HandleState {
    Pending(oneshot::Receiver<PersistResult<u64>>),
    Failed(Option<PersistError>),
}

/// Completion of a queued save. Resolves to the committed document version.
///
/// The save happens whether or not the handle is awaited.
pub struct SaveHandle {
    document: String,
    state: HandleState,
}

impl SaveHandle {
    fn pending(key: &DocumentKey, reply: oneshot::Receiver<PersistResult<u64>>) -> Self {
        Self {
            document: key.to_string(),
            state: HandleState::Pending(reply),
        }
    }

    fn failed(key: &DocumentKey, error: PersistError) -> Self {
        Self {
            document: key.to_string(),
            state: HandleState::Failed(Some(error)),
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }
}

impl Future for SaveHandle {
    type Output = PersistResult<u64>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            HandleState::Pending(reply) => Pin::new(reply)
                .poll(cx)
                .map(|r| r.unwrap_or_else(|_| Err(PersistError::WriterGone(this.document.clone())))),
            HandleState::Failed(error) => Poll::Ready(Err(error
                .take()
                .unwrap_or_else(|| PersistError::WriterGone(this.document.clone())))),
        }
    }
}

impl fmt::Debug for SaveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveHandle")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

struct WriterHandle {
    jobs: UnboundedSender<Job>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct WriterSet {
    closed: bool,
    writers: HashMap<DocumentKey, WriterHandle>,
    /// Documents with a queued delete. Later saves to them are refused.
    deleted: HashSet<DocumentKey>,
}

/// Loads documents and routes every write through the document's single
/// writer task.
///
/// Save methods are synchronous: the patch is queued before the method
/// returns, so patches issued in some order are applied in that order.
/// They must be called from within a tokio runtime.
pub struct DocumentStore {
    config: StorageConfig,
    state: Mutex<WriterSet>,
    on_failure: Option<FailureHook>,
}

impl DocumentStore {
    /// Open the store, creating the data directory if needed.
    pub async fn open(config: StorageConfig) -> PersistResult<Self> {
        files::bounded(
            config.io_timeout(),
            "create data dir",
            tokio::fs::create_dir_all(&config.data_dir),
        )
        .await?;
        info!(data_dir = %config.data_dir.display(), "document store opened");
        Ok(Self {
            config,
            state: Mutex::new(WriterSet::default()),
            on_failure: None,
        })
    }

    /// Install a hook run by writers after a failed save. Writers spawned
    /// before the call keep the previous hook.
    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.on_failure = Some(hook);
        self
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn path_of(&self, key: &DocumentKey) -> PathBuf {
        self.config.data_dir.join(key.file_name(self.config.max_key_len))
    }

    pub fn group_path(&self, group_id: GroupId) -> PathBuf {
        self.path_of(&DocumentKey::Group(group_id))
    }

    // ── Loads ─────────────────────────────────────────────────────

    /// Load a group document, or a fresh one if none exists or it is corrupt.
    pub async fn load_group(&self, group_id: GroupId) -> PersistResult<GroupDocument> {
        let path = self.group_path(group_id);
        Ok(files::read_document(&path, self.config.io_timeout())
            .await?
            .unwrap_or_else(|| GroupDocument::new(group_id)))
    }

    pub async fn load_group_registry(&self) -> PersistResult<GroupRegistryDocument> {
        let path = self.path_of(&DocumentKey::GroupRegistry);
        Ok(files::read_document(&path, self.config.io_timeout())
            .await?
            .unwrap_or_default())
    }

    pub async fn load_user_registry(&self) -> PersistResult<UserRegistryDocument> {
        let path = self.path_of(&DocumentKey::UserRegistry);
        Ok(files::read_document(&path, self.config.io_timeout())
            .await?
            .unwrap_or_default())
    }

    // ── Saves ─────────────────────────────────────────────────────

    /// Replace one slice of a group document.
    pub fn save_group(&self, group_id: GroupId, slice: GroupSlice) -> SaveHandle {
        self.submit(DocumentKey::Group(group_id), Patch::Group { group_id, slice })
    }

    pub fn save_group_registry(&self, patch: GroupRegistryPatch) -> SaveHandle {
        self.submit(DocumentKey::GroupRegistry, Patch::GroupRegistry(patch))
    }

    pub fn save_user_registry(&self, patch: UserRegistryPatch) -> SaveHandle {
        self.submit(DocumentKey::UserRegistry, Patch::UserRegistry(patch))
    }

    /// Copy the group's on-disk document into the backup directory.
    ///
    /// Ordered after every save queued before it. Returns `None` when the
    /// group has no document on disk.
    pub async fn backup_group(&self, group_id: GroupId) -> PersistResult<Option<PathBuf>> {
        let key = DocumentKey::Group(group_id);
        let (tx, rx) = oneshot::channel();
        self.enqueue(&key, Job::Backup { reply: tx })?;
        rx.await.map_err(|_| PersistError::WriterGone(key.to_string()))?
    }

    /// Back up and then remove the group's document. Returns the backup path.
    ///
    /// Saves to the group issued after this call fail with
    /// [`PersistError::Deleted`].
    pub async fn delete_group(&self, group_id: GroupId) -> PersistResult<Option<PathBuf>> {
        let key = DocumentKey::Group(group_id);
        let (tx, rx) = oneshot::channel();
        self.enqueue(&key, Job::Delete { reply: tx })?;
        rx.await.map_err(|_| PersistError::WriterGone(key.to_string()))?
    }

    /// Stop accepting writes and wait for every queued write to finish.
    pub async fn shutdown(&self) {
        let writers: Vec<(DocumentKey, WriterHandle)> = {
            let mut state = self.state.lock().expect("document store lock poisoned");
            state.closed = true;
            state.writers.drain().collect()
        };

        for (key, writer) in writers {
            drop(writer.jobs);
            if let Err(e) = writer.task.await {
                warn!(document = %key, error = %e, "writer task ended abnormally");
            }
        }
        info!("document store shut down");
    }

    fn submit(&self, key: DocumentKey, patch: Patch) -> SaveHandle {
        let (tx, rx) = oneshot::channel();
        match self.enqueue(&key, Job::Save { patch, reply: tx }) {
            Ok(()) => SaveHandle::pending(&key, rx),
            Err(e) => SaveHandle::failed(&key, e),
        }
    }

    fn enqueue(&self, key: &DocumentKey, job: Job) -> PersistResult<()> {
        let mut state = self.state.lock().expect("document store lock poisoned");
        if state.closed {
            return Err(PersistError::ShutDown);
        }
        match &job {
            Job::Save { .. } if state.deleted.contains(key) => {
                return Err(PersistError::Deleted(key.to_string()));
            }
            Job::Delete { .. } => {
                state.deleted.insert(key.clone());
            }
            _ => {}
        }
        let writer = state
            .writers
            .entry(key.clone())
            .or_insert_with(|| self.spawn_writer(key.clone()));
        writer
            .jobs
            .send(job)
            .map_err(|_| PersistError::WriterGone(key.to_string()))
    }

    fn spawn_writer(&self, key: DocumentKey) -> WriterHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = Writer {
            path: self.path_of(&key),
            backup_dir: self.config.backup_dir(),
            timeout: self.config.io_timeout(),
            on_failure: self.on_failure.clone(),
            key,
        };
        WriterHandle {
            jobs: tx,
            task: tokio::spawn(writer.run(rx)),
        }
    }
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("data_dir", &self.config.data_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_file_names_are_sanitized() {
        let id = GroupId::new();
        let name = DocumentKey::Group(id).file_name(64);
        assert_eq!(name, format!("group-{id}.json"));
        assert_eq!(DocumentKey::GroupRegistry.file_name(64), "groups.json");
        assert_eq!(DocumentKey::UserRegistry.file_name(64), "users.json");
    }

    #[tokio::test]
    async fn save_after_shutdown_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(StorageConfig::new(dir.path())).await.unwrap();
        store.shutdown().await;

        let err = store
            .save_group(GroupId::new(), GroupSlice::Name("late".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::ShutDown));
    }

    #[tokio::test]
    async fn save_after_delete_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(StorageConfig::new(dir.path())).await.unwrap();
        let id = GroupId::new();
        store.save_group(id, GroupSlice::Name("Lantern".into())).await.unwrap();

        store.delete_group(id).await.unwrap();
        let err = store
            .save_group(id, GroupSlice::Name("again".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::Deleted(_)));

        store.shutdown().await;
        assert!(!store.group_path(id).exists());
    }
}
