//! The single writer task owning one document file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hoard_types::GroupId;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::documents::{
    Document, GroupDocument, GroupRegistryDocument, GroupRegistryPatch, GroupSlice,
    UserRegistryDocument, UserRegistryPatch,
};
use crate::error::{PersistError, PersistResult};
use crate::files;
use crate::store::DocumentKey;

/// Called by a writer whenever a save fails.
pub type FailureHook = Arc<dyn Fn(&DocumentKey, &PersistError) + Send + Sync>;

pub(crate) enum Patch {
    Group { group_id: GroupId, slice: GroupSlice },
    GroupRegistry(GroupRegistryPatch),
    UserRegistry(UserRegistryPatch),
}

impl Patch {
    fn label(&self) -> &'static str {
        match self {
            Self::Group { slice, .. } => slice.label(),
            Self::GroupRegistry(_) => "groups",
            Self::UserRegistry(_) => "users",
        }
    }
}

pub(crate) enum Job {
    Save {
        patch: Patch,
        reply: oneshot::Sender<PersistResult<u64>>,
    },
    Backup {
        reply: oneshot::Sender<PersistResult<Option<PathBuf>>>,
    },
    /// Back up, then remove the file.
    Delete {
        reply: oneshot::Sender<PersistResult<Option<PathBuf>>>,
    },
}

/// Applies jobs for one document strictly in arrival order.
pub(crate) struct Writer {
    pub(crate) key: DocumentKey,
    pub(crate) path: PathBuf,
    pub(crate) backup_dir: PathBuf,
    pub(crate) timeout: Duration,
    pub(crate) on_failure: Option<FailureHook>,
}

impl Writer {
    pub(crate) async fn run(self, mut jobs: UnboundedReceiver<Job>) {
        debug!(document = %self.key, "writer started");
        while let Some(job) = jobs.recv().await {
            match job {
                Job::Save { patch, reply } => {
                    let slice = patch.label();
                    let result = self.save(patch).await;
                    match &result {
                        Ok(version) => debug!(document = %self.key, slice, version, "saved"),
                        Err(e) => {
                            error!(document = %self.key, slice, error = %e, "save failed");
                            if let Some(hook) = &self.on_failure {
                                hook(&self.key, e);
                            }
                        }
                    }
                    let _ = reply.send(result);
                }
                Job::Backup { reply } => {
                    let result = files::backup_file(&self.path, &self.backup_dir, self.timeout).await;
                    let _ = reply.send(result);
                }
                Job::Delete { reply } => {
                    let _ = reply.send(self.delete().await);
                }
            }
        }
        debug!(document = %self.key, "writer stopped");
    }

    async fn save(&self, patch: Patch) -> PersistResult<u64> {
        match patch {
            Patch::Group { group_id, slice } => {
                self.cycle(
                    || GroupDocument::new(group_id),
                    |doc: &mut GroupDocument| {
                        doc.group_id = group_id;
                        slice.apply(doc);
                    },
                )
                .await
            }
            Patch::GroupRegistry(patch) => {
                self.cycle(GroupRegistryDocument::default, |doc| patch.apply(doc))
                    .await
            }
            Patch::UserRegistry(patch) => {
                self.cycle(UserRegistryDocument::default, |doc| patch.apply(doc))
                    .await
            }
        }
    }

    /// Load the current document (or a default), apply the patch, bump the
    /// version and write the whole document back.
    async fn cycle<D, I, P>(&self, init: I, patch: P) -> PersistResult<u64>
    where
        D: Document,
        I: FnOnce() -> D,
        P: FnOnce(&mut D),
    {
        let mut doc = files::read_document::<D>(&self.path, self.timeout)
            .await?
            .unwrap_or_else(init);
        patch(&mut doc);
        let version = doc.stamp(Utc::now());
        files::write_document(&self.path, &doc, self.timeout).await?;
        Ok(version)
    }

    async fn delete(&self) -> PersistResult<Option<PathBuf>> {
        let backup = files::backup_file(&self.path, &self.backup_dir, self.timeout).await?;
        if files::remove_file(&self.path, self.timeout).await? {
            debug!(document = %self.key, "deleted");
        }
        Ok(backup)
    }
}
