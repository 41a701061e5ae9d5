use hoard_types::ItemId;

/// Errors from item store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The candidate item is malformed.
    #[error("invalid item: {reason}")]
    InvalidItem { reason: String },

    /// The requested quantity is zero or would overflow.
    #[error("invalid quantity {requested}: {reason}")]
    InvalidQuantity { requested: u64, reason: String },

    /// Two items with the same id were supplied.
    #[error("duplicate item id: {0}")]
    DuplicateItem(ItemId),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
