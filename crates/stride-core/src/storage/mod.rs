//! # Snapshot Storage
//!
//! The [`SnapshotStore`] contract and its backends:
//! - [`MemoryStore`]: `BTreeMap` behind a mutex, volatile
//! - [`FileStore`]: one JSON document per profile in a directory
//! - [`RedbStore`]: binary snapshots in a redb table
//!
//! Stores are keyed by [`ProfileId`] and are last-write-wins.

use crate::{ProfileId, ProgressionSnapshot, StrideError};
use std::fmt::Debug;

pub mod file_store;
pub mod memory;
pub mod redb_store;

pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

/// Durable home of progression snapshots.
pub trait SnapshotStore: Debug + Send + Sync {
    /// Load the snapshot for `profile`, if one was saved.
    ///
    /// A document that exists but cannot be decoded is reported as
    /// `StrideError::Deserialization`.
    fn load(&self, profile: &ProfileId) -> Result<Option<ProgressionSnapshot>, StrideError>;

    /// Replace the snapshot for `profile`.
    fn save(&self, profile: &ProfileId, snapshot: &ProgressionSnapshot) -> Result<(), StrideError>;

    /// Delete the snapshot for `profile`. Returns whether one existed.
    fn remove(&self, profile: &ProfileId) -> Result<bool, StrideError>;

    /// Profiles with a stored snapshot, in id order.
    fn profiles(&self) -> Result<Vec<ProfileId>, StrideError>;

    /// Move an undecodable document for `profile` out of the way.
    ///
    /// The document is kept where it can be inspected but is no longer
    /// loaded, so the next `save` cannot overwrite it. Returns whether
    /// anything was moved.
    fn quarantine(&self, profile: &ProfileId) -> Result<bool, StrideError>;
}
