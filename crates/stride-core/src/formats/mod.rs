//! # Snapshot Formats
//!
//! Pure byte transformations for [`ProgressionSnapshot`](crate::ProgressionSnapshot).
//! File and database I/O live in the `storage` module.

pub mod persistence;

pub use persistence::{
    MAX_SNAPSHOT_SIZE, PersistenceHeader, snapshot_from_bytes, snapshot_from_json,
    snapshot_from_json_lossy, snapshot_to_bytes, snapshot_to_json,
};
