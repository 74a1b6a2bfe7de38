//! Domain records persisted by the store.
//!
//! # Responsibility
//! - Define canonical data structures used by repositories and managers.
//!
//! # Invariants
//! - Note identity is assigned by the store and stable afterwards.
//! - Deletion is a hard delete; there are no tombstones.

pub mod note;
