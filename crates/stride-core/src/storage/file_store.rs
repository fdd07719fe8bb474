//! # File Store
//!
//! One pretty-printed JSON document per profile: `<dir>/<profile>.json`.
//!
//! Profile ids are restricted to `[A-Za-z0-9_-]`, so they are safe to use as
//! file names. Writes go to a temporary sibling first and are renamed into
//! place.
//!
//! A document that only partly decodes is copied to `<profile>.json.corrupt`
//! before it is handed out, so the dropped fields survive the next write. A
//! quarantined document is renamed to the same name.

use super::SnapshotStore;
use crate::formats::{snapshot_from_json_lossy, snapshot_to_json};
use crate::{ProfileId, ProgressionSnapshot, StrideError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";
const CORRUPT_EXTENSION: &str = "json.corrupt";

/// JSON files in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StrideError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StrideError::Io(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, profile: &ProfileId) -> PathBuf {
        self.dir.join(format!("{}.{}", profile.as_str(), EXTENSION))
    }
}

impl SnapshotStore for FileStore {
    fn load(&self, profile: &ProfileId) -> Result<Option<ProgressionSnapshot>, StrideError> {
        let path = self.path_for(profile);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StrideError::Io(format!("{}: {}", path.display(), e))),
        };
        let (snapshot, dropped) = snapshot_from_json_lossy(&json)?;
        if !dropped.is_empty() {
            let backup = path.with_extension(CORRUPT_EXTENSION);
            fs::copy(&path, &backup)
                .map_err(|e| StrideError::Io(format!("{}: {}", backup.display(), e)))?;
            tracing::warn!(
                %profile,
                ?dropped,
                backup = %backup.display(),
                "snapshot partly unreadable, original kept"
            );
        }
        Ok(Some(snapshot))
    }

    fn save(&self, profile: &ProfileId, snapshot: &ProgressionSnapshot) -> Result<(), StrideError> {
        let path = self.path_for(profile);
        let tmp = path.with_extension("json.tmp");
        let json = snapshot_to_json(snapshot)?;

        fs::write(&tmp, json).map_err(|e| StrideError::Io(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path).map_err(|e| StrideError::Io(format!("{}: {}", path.display(), e)))
    }

    fn remove(&self, profile: &ProfileId) -> Result<bool, StrideError> {
        let path = self.path_for(profile);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StrideError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    fn quarantine(&self, profile: &ProfileId) -> Result<bool, StrideError> {
        let path = self.path_for(profile);
        let backup = path.with_extension(CORRUPT_EXTENSION);
        match fs::rename(&path, &backup) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StrideError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    fn profiles(&self) -> Result<Vec<ProfileId>, StrideError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StrideError::Io(format!("{}: {}", self.dir.display(), e)))?;

        let mut profiles = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StrideError::Io(e.to_string()))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            // Stray files with unusable names are skipped.
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| ProfileId::new(s).ok())
            {
                profiles.push(id);
            }
        }
        profiles.sort();
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persists_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let id = ProfileId::new("grace").expect("id");
        let snapshot = ProgressionSnapshot {
            xp: 300,
            is_onboarded: true,
            ..ProgressionSnapshot::default()
        };

        FileStore::open(temp.path())
            .expect("open")
            .save(&id, &snapshot)
            .expect("save");

        let reopened = FileStore::open(temp.path()).expect("reopen");
        assert_eq!(reopened.load(&id).expect("load"), Some(snapshot));
        assert_eq!(reopened.profiles().expect("profiles"), vec![id]);
    }

    #[test]
    fn missing_profile_loads_none() {
        let temp = tempdir().expect("temp dir");
        let store = FileStore::open(temp.path()).expect("open");
        let id = ProfileId::new("nobody").expect("id");
        assert_eq!(store.load(&id).expect("load"), None);
        assert!(!store.remove(&id).expect("remove"));
    }

    #[test]
    fn malformed_document_is_a_deserialization_error() {
        let temp = tempdir().expect("temp dir");
        let store = FileStore::open(temp.path()).expect("open");
        let id = ProfileId::new("broken").expect("id");
        fs::write(temp.path().join("broken.json"), "\"lots\"").expect("write");

        assert!(matches!(
            store.load(&id),
            Err(StrideError::Deserialization(_))
        ));
    }

    #[test]
    fn partly_readable_document_is_backed_up() {
        let temp = tempdir().expect("temp dir");
        let store = FileStore::open(temp.path()).expect("open");
        let id = ProfileId::new("ada").expect("id");
        let original = r#"{"xp": 5000, "saved": ["a"], "streak": {"current": "oops"}}"#;
        fs::write(temp.path().join("ada.json"), original).expect("write");

        let snapshot = store.load(&id).expect("load").expect("snapshot");
        assert_eq!(snapshot.xp, 5000);
        assert_eq!(snapshot.saved.len(), 1);

        store.save(&id, &snapshot).expect("save");
        let backup = fs::read_to_string(temp.path().join("ada.json.corrupt")).expect("backup");
        assert_eq!(backup, original);
        assert_eq!(store.profiles().expect("profiles"), vec![id]);
    }

    #[test]
    fn quarantine_moves_document_aside() {
        let temp = tempdir().expect("temp dir");
        let store = FileStore::open(temp.path()).expect("open");
        let id = ProfileId::new("broken").expect("id");
        fs::write(temp.path().join("broken.json"), "[1, 2, 3]").expect("write");

        assert!(store.quarantine(&id).expect("quarantine"));
        assert_eq!(store.load(&id).expect("load"), None);
        assert!(!store.quarantine(&id).expect("quarantine again"));
        assert_eq!(
            fs::read_to_string(temp.path().join("broken.json.corrupt")).expect("read"),
            "[1, 2, 3]"
        );
    }

    #[test]
    fn profiles_skip_foreign_files() {
        let temp = tempdir().expect("temp dir");
        let store = FileStore::open(temp.path()).expect("open");
        fs::write(temp.path().join("notes.txt"), "hello").expect("write");
        fs::write(temp.path().join("bad name.json"), "{}").expect("write");
        store
            .save(&ProfileId::new("b").expect("id"), &ProgressionSnapshot::default())
            .expect("save");
        store
            .save(&ProfileId::new("a").expect("id"), &ProgressionSnapshot::default())
            .expect("save");

        let ids: Vec<String> = store
            .profiles()
            .expect("profiles")
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
