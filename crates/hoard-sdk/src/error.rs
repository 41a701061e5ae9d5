use hoard_types::{CharacterId, GroupId, ItemId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("character not found: {0}")]
    CharacterNotFound(CharacterId),

    #[error("group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("catalog lookup failed: {0}")]
    Catalog(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] hoard_store::StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] hoard_ledger::LedgerError),

    #[error("persistence error: {0}")]
    Persist(#[from] hoard_persist::PersistError),
}

pub type SdkResult<T> = Result<T, SdkError>;
