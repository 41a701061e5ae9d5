//! Ownership ledger for Hoard.
//!
//! This crate is the heart of Hoard. It provides:
//! - [`OwnershipLedger`]: (item, character) -> quantity-owned records
//! - [`ConsistencyEnforcer`]: pure validation run before every ledger mutation,
//!   plus audit and repair of loaded state
//! - [`ShrinkPolicy`]: what happens to allocations when an item's quantity
//!   drops below the allocated sum
//! - Projections for display ([`AllocationBreakdown`]) and stats
//!   ([`InventorySummary`])
//!
//! The allocation invariant holds after every committed mutation:
//!
//! ```text
//! for every item i: sum(quantity_owned of records for i) <= i.quantity
//! ```
//!
//! Anything not allocated to a character is "party storage". It is computed,
//! never stored.

pub mod enforcer;
pub mod error;
pub mod ledger;
pub mod projection;

pub use enforcer::{
    ConsistencyEnforcer, ConsistencyReport, Release, ShrinkPlan, ShrinkPolicy, Violation,
    ViolationKind,
};
pub use error::{LedgerError, LedgerResult};
pub use ledger::OwnershipLedger;
pub use projection::{AllocationBreakdown, CharacterLoad, HolderShare, InventorySummary, ProjectionBuilder};
