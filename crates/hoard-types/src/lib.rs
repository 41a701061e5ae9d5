//! Foundation types for Hoard, a shared party-inventory engine.
//!
//! This crate provides the identity and record types used throughout the
//! workspace. Every other Hoard crate depends on `hoard-types`.
//!
//! # Key Types
//!
//! - [`ItemId`], [`CharacterId`], [`GroupId`], [`UserId`]: UUID-backed identifiers
//! - [`InventoryItem`]: a shared item with a total quantity
//! - [`ItemCandidate`]: normalized input for adding an item
//! - [`ItemOwnership`]: the share of an item claimed by one character
//! - [`PlayerCharacter`], [`Group`], [`UserRecord`], [`SessionUser`]: records
//!   owned by sibling subsystems and referenced here by id

pub mod directory;
pub mod error;
pub mod ids;
pub mod item;
pub mod ownership;

pub use directory::{Group, GroupMember, PermissionLevel, PlayerCharacter, SessionUser, UserRecord};
pub use error::TypeError;
pub use ids::{CharacterId, GroupId, ItemId, UserId};
pub use item::{InventoryItem, ItemCandidate, ItemCategory};
pub use ownership::ItemOwnership;
