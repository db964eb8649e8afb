//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record persisted and rendered by callers.
//! - Own field-level validation so no partially valid task enters the store.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId` that is never reused.
//! - Deletion is a hard removal from the collection; there is no tombstone.

pub mod tags;
pub mod task;
pub mod wire;
