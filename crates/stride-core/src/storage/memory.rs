//! # In-Memory Store
//!
//! Volatile [`SnapshotStore`] for tests and the `memory` backend.

use super::SnapshotStore;
use crate::{ProfileId, ProgressionSnapshot, StrideError};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Snapshots kept in a `BTreeMap`. Lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: Mutex<BTreeMap<ProfileId, ProgressionSnapshot>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ProfileId, ProgressionSnapshot>> {
        // A poisoned map is still a valid map: every write is a single insert.
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, profile: &ProfileId) -> Result<Option<ProgressionSnapshot>, StrideError> {
        Ok(self.lock().get(profile).cloned())
    }

    fn save(&self, profile: &ProfileId, snapshot: &ProgressionSnapshot) -> Result<(), StrideError> {
        self.lock().insert(profile.clone(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, profile: &ProfileId) -> Result<bool, StrideError> {
        Ok(self.lock().remove(profile).is_some())
    }

    fn profiles(&self) -> Result<Vec<ProfileId>, StrideError> {
        Ok(self.lock().keys().cloned().collect())
    }

    /// Stored snapshots are already decoded, so there is never anything to move.
    fn quarantine(&self, _profile: &ProfileId) -> Result<bool, StrideError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_remove() {
        let store = MemoryStore::new();
        let id = ProfileId::new("ada").expect("id");
        let snapshot = ProgressionSnapshot {
            xp: 42,
            ..ProgressionSnapshot::default()
        };

        assert_eq!(store.load(&id).expect("load"), None);
        store.save(&id, &snapshot).expect("save");
        assert_eq!(store.load(&id).expect("load"), Some(snapshot));
        assert_eq!(store.profiles().expect("profiles"), vec![id.clone()]);
        assert!(store.remove(&id).expect("remove"));
        assert!(!store.remove(&id).expect("remove"));
    }
}
