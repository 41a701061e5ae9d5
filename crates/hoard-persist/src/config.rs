use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where documents live and how I/O against them is bounded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Longest file-name key derived from an identifier.
    pub max_key_len: usize,
    /// Upper bound for a single file operation, in milliseconds.
    pub io_timeout_ms: u64,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms.max(1))
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("hoard-data"),
            max_key_len: 64,
            io_timeout_ms: 5_000,
        }
    }
}
