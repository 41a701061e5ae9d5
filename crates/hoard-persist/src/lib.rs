//! Persistence gateway for Hoard.
//!
//! Documents are JSON files under one data directory:
//!
//! ```text
//! <data_dir>/groups.json              group registry
//! <data_dir>/users.json               user registry
//! <data_dir>/group-<key>.json         one inventory document per group
//! <data_dir>/backups/<name>-<ts>.json copies taken before destructive deletes
//! ```
//!
//! Every document has exactly one writer task. A save is a patch applied by
//! that writer as a full load-merge-write cycle, so concurrent saves of
//! different slices of the same document never lose each other's data.
//! Writes go to a temporary file which is fsynced and renamed over the
//! target.

pub mod config;
pub mod documents;
pub mod error;
mod files;
pub mod keys;
pub mod store;
mod writer;

pub use config::StorageConfig;
pub use documents::{
    Document, GroupDocument, GroupRegistryDocument, GroupRegistryPatch, GroupSlice,
    UserRegistryDocument, UserRegistryPatch,
};
pub use error::{PersistError, PersistResult};
pub use keys::{sanitize_key, MIN_KEY_LEN};
pub use store::{DocumentKey, DocumentStore, SaveHandle};
pub use writer::FailureHook;
