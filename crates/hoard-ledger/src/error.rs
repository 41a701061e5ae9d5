use hoard_types::ItemId;

/// Errors produced by ledger operations.
///
/// Every variant is raised before any mutation; the ledger is unchanged when
/// one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("cannot allocate {requested} of item {item_id}: only {available} unallocated")]
    AllocationExceeded {
        item_id: ItemId,
        requested: u32,
        available: u64,
    },

    #[error("invalid quantity {requested}: allocations must be at least 1")]
    InvalidQuantity { requested: u32 },

    #[error("cannot reduce item {item_id} to {requested}: {allocated} units are allocated to characters")]
    QuantityBelowAllocated {
        item_id: ItemId,
        requested: u32,
        allocated: u64,
    },
}

pub type LedgerResult<T> = Result<T, LedgerError>;
