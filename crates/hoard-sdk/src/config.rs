use std::path::Path;

use hoard_events::EventConfig;
use hoard_ledger::ShrinkPolicy;
use hoard_persist::{StorageConfig, MIN_KEY_LEN};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Top-level configuration, usually read from `hoard.toml`.
///
/// ```toml
/// [storage]
/// data_dir = "campaign-data"
/// io_timeout_ms = 5000
///
/// [ledger]
/// shrink_policy = "release-most-recent"
///
/// [events]
/// channel_capacity = 256
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HoardConfig {
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub events: EventConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// What happens to allocations when an item's quantity is reduced below
    /// the units characters hold.
    pub shrink_policy: ShrinkPolicy,
}

impl HoardConfig {
    /// Defaults with documents under `data_dir`.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            storage: StorageConfig::new(data_dir.as_ref()),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> SdkResult<()> {
        if self.storage.max_key_len < MIN_KEY_LEN {
            return Err(SdkError::Config(format!(
                "storage.max_key_len must be at least {MIN_KEY_LEN}, got {}",
                self.storage.max_key_len
            )));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }
}
