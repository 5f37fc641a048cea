//! # sigil-store — Persistence and the Entity Store
//!
//! Two layers:
//!
//! - [`kv`]: the durable key/value contract ([`KeyValueStore`]) with an
//!   in-memory implementation for tests and a JSON-file-per-key
//!   implementation for real use. Values are JSON documents; writes are
//!   synchronous and atomic at the granularity of one key.
//! - [`entity`]: the [`EntityStore`], the canonical persisted mapping
//!   from identifier to group/identity record. Every mutating operation
//!   writes the full updated document through before returning — no
//!   write-back caching, no batching.
//!
//! Consumers never receive `&mut` access to a stored record; mutation
//! goes through the store's operations so the root invariant
//! (`root == backend digest of (depth, members)`) is re-established on
//! every change.

pub mod entity;
pub mod kv;

// Re-export primary types.
pub use entity::{
    EntityStore, MembershipRow, StoreError, StoreStats, GROUPS_KEY, IDENTITIES_KEY,
};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore, StorageError};
