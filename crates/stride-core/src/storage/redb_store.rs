//! # redb Store
//!
//! Snapshots in an embedded redb database.
//!
//! - ACID transactions, crash safety via copy-on-write B-trees
//! - `snapshots`: profile id -> binary snapshot (`STRD` header + postcard)
//! - `quarantine`: undecodable snapshots moved out of `snapshots`, kept as-is

use super::SnapshotStore;
use crate::formats::{snapshot_from_bytes, snapshot_to_bytes};
use crate::{ProfileId, ProgressionSnapshot, StrideError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for snapshots: profile id -> encoded snapshot bytes
const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Table for quarantined snapshots: profile id -> original bytes
const QUARANTINE: TableDefinition<&str, &[u8]> = TableDefinition::new("quarantine");

fn io_err(e: impl std::fmt::Display) -> StrideError {
    StrideError::Io(e.to_string())
}

/// Snapshot store backed by a single redb file.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StrideError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Create the table so read transactions never see it missing.
        let write_txn = db.begin_write().map_err(io_err)?;
        let _ = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
        write_txn.commit().map_err(io_err)?;

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<bool, StrideError> {
        self.db.compact().map_err(io_err)
    }
}

impl SnapshotStore for RedbStore {
    fn load(&self, profile: &ProfileId) -> Result<Option<ProgressionSnapshot>, StrideError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SNAPSHOTS).map_err(io_err)?;

        match table.get(profile.as_str()).map_err(io_err)? {
            Some(data) => snapshot_from_bytes(data.value()).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, profile: &ProfileId, snapshot: &ProgressionSnapshot) -> Result<(), StrideError> {
        let bytes = snapshot_to_bytes(snapshot)?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            table
                .insert(profile.as_str(), bytes.as_slice())
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)
    }

    fn remove(&self, profile: &ProfileId) -> Result<bool, StrideError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let existed = {
            let mut table = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            table.remove(profile.as_str()).map_err(io_err)?.is_some()
        };
        write_txn.commit().map_err(io_err)?;
        Ok(existed)
    }

    fn quarantine(&self, profile: &ProfileId) -> Result<bool, StrideError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let bytes = {
            let mut table = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            let removed = table.remove(profile.as_str()).map_err(io_err)?;
            removed.map(|data| data.value().to_vec())
        };
        let Some(bytes) = bytes else {
            write_txn.abort().map_err(io_err)?;
            return Ok(false);
        };
        {
            let mut quarantine = write_txn.open_table(QUARANTINE).map_err(io_err)?;
            quarantine
                .insert(profile.as_str(), bytes.as_slice())
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(true)
    }

    fn profiles(&self) -> Result<Vec<ProfileId>, StrideError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SNAPSHOTS).map_err(io_err)?;

        let mut profiles = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, _) = entry.map_err(io_err)?;
            profiles.push(ProfileId::new(key.value())?);
        }
        Ok(profiles)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Streak;
    use tempfile::tempdir;

    #[test]
    fn recovery_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("stride.redb");
        let id = ProfileId::new("ada").expect("id");
        let snapshot = ProgressionSnapshot {
            xp: 1_000,
            streak: Streak {
                current: 3,
                longest: 3,
                last_check_in: None,
            },
            ..ProgressionSnapshot::default()
        };

        {
            let store = RedbStore::open(&db_path).expect("open db");
            store.save(&id, &snapshot).expect("save");
        }

        let store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.load(&id).expect("load"), Some(snapshot));
    }

    #[test]
    fn last_write_wins() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("stride.redb")).expect("open db");
        let id = ProfileId::new("ada").expect("id");

        for xp in [10, 20, 30] {
            let snapshot = ProgressionSnapshot {
                xp,
                ..ProgressionSnapshot::default()
            };
            store.save(&id, &snapshot).expect("save");
        }
        assert_eq!(store.load(&id).expect("load").map(|s| s.xp), Some(30));
    }

    #[test]
    fn remove_and_list() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("stride.redb")).expect("open db");
        let a = ProfileId::new("a").expect("id");
        let b = ProfileId::new("b").expect("id");
        store.save(&b, &ProgressionSnapshot::default()).expect("save");
        store.save(&a, &ProgressionSnapshot::default()).expect("save");

        assert_eq!(store.profiles().expect("list"), vec![a.clone(), b.clone()]);
        assert!(store.remove(&a).expect("remove"));
        assert!(!store.remove(&a).expect("remove"));
        assert_eq!(store.profiles().expect("list"), vec![b]);
    }

    #[test]
    fn quarantine_keeps_undecodable_bytes() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("stride.redb")).expect("open db");
        let id = ProfileId::new("ada").expect("id");

        let write_txn = store.db.begin_write().expect("begin");
        {
            let mut table = write_txn.open_table(SNAPSHOTS).expect("table");
            table.insert("ada", b"garbage".as_slice()).expect("insert");
        }
        write_txn.commit().expect("commit");

        assert!(matches!(store.load(&id), Err(StrideError::Deserialization(_))));
        assert!(store.quarantine(&id).expect("quarantine"));
        assert_eq!(store.load(&id).expect("load"), None);
        assert!(!store.quarantine(&id).expect("quarantine again"));

        let read_txn = store.db.begin_read().expect("read");
        let table = read_txn.open_table(QUARANTINE).expect("table");
        let kept = table.get("ada").expect("get").map(|data| data.value().to_vec());
        assert_eq!(kept.as_deref(), Some(b"garbage".as_slice()));
    }

    #[test]
    fn compact_keeps_data() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("stride.redb")).expect("open db");
        let id = ProfileId::new("ada").expect("id");
        store.save(&id, &ProgressionSnapshot::default()).expect("save");

        store.compact().expect("compact");
        assert!(store.load(&id).expect("load").is_some());
    }
}
