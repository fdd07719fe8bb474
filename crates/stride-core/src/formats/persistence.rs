//! # Persistence Format
//!
//! Serialization for progression snapshots.
//!
//! Two encodings are supported:
//!
//! - **Binary**: Header (5 bytes) + postcard-serialized snapshot.
//!   - 4 bytes: Magic ("STRD")
//!   - 1 byte: Version
//! - **JSON**: a plain serde_json document. Every field is defaulted, so a
//!   partial or older document still hydrates, and a field of the wrong type
//!   is dropped without losing the others.
//!
//! Both are pure transformations. Size and header are validated before the
//! payload is decoded.

use crate::{ProgressionSnapshot, StrideError, primitives};
use serde_json::{Map, Value};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted size of an encoded snapshot.
///
/// A snapshot is a handful of counters plus three id sets; 16 MiB is far
/// beyond any legitimate profile.
pub const MAX_SNAPSHOT_SIZE: usize = 16 * 1024 * 1024;

/// Header length in bytes.
const HEADER_SIZE: usize = 5;

// =============================================================================
// BINARY HEADER
// =============================================================================

/// The header that precedes every binary snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Check magic bytes and version.
    pub fn validate(&self) -> Result<(), StrideError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(StrideError::Deserialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(StrideError::Deserialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StrideError> {
        let Some(header) = bytes.get(..HEADER_SIZE) else {
            return Err(StrideError::Deserialization(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// BINARY
// =============================================================================

/// Encode a snapshot as header + postcard payload.
pub fn snapshot_to_bytes(snapshot: &ProgressionSnapshot) -> Result<Vec<u8>, StrideError> {
    let payload =
        postcard::to_stdvec(snapshot).map_err(|e| StrideError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&PersistenceHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a binary snapshot.
///
/// Rejects, before touching the payload: inputs shorter than the header,
/// inputs over [`MAX_SNAPSHOT_SIZE`], and unknown magic or version.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<ProgressionSnapshot, StrideError> {
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(StrideError::Deserialization(format!(
            "Snapshot size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        StrideError::Deserialization(format!("Failed to decode snapshot payload: {}", e))
    })
}

// =============================================================================
// JSON
// =============================================================================

/// Encode a snapshot as pretty-printed JSON.
pub fn snapshot_to_json(snapshot: &ProgressionSnapshot) -> Result<String, StrideError> {
    serde_json::to_string_pretty(snapshot).map_err(|e| StrideError::Serialization(e.to_string()))
}

/// Decode a JSON snapshot. Missing or unreadable fields take their zero value.
pub fn snapshot_from_json(json: &str) -> Result<ProgressionSnapshot, StrideError> {
    snapshot_from_json_lossy(json).map(|(snapshot, _)| snapshot)
}

/// Decode a JSON snapshot field by field.
///
/// A top-level field that fails to decode is dropped and reported by name;
/// the remaining fields still hydrate. Only input that is not a JSON object
/// at all is an error.
pub fn snapshot_from_json_lossy(
    json: &str,
) -> Result<(ProgressionSnapshot, Vec<String>), StrideError> {
    if json.len() > MAX_SNAPSHOT_SIZE {
        return Err(StrideError::Deserialization(format!(
            "Snapshot size {} bytes exceeds maximum allowed {} bytes",
            json.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let value: Value =
        serde_json::from_str(json).map_err(|e| StrideError::Deserialization(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(StrideError::Deserialization(
            "Snapshot document is not a JSON object".to_string(),
        ));
    };

    let mut accepted = Map::new();
    let mut dropped = Vec::new();
    for (key, field) in fields {
        let single = Value::Object(Map::from_iter([(key.clone(), field.clone())]));
        match serde_json::from_value::<ProgressionSnapshot>(single) {
            Ok(_) => {
                accepted.insert(key, field);
            }
            Err(e) => {
                tracing::warn!(field = %key, error = %e, "dropping unreadable snapshot field");
                dropped.push(key);
            }
        }
    }

    let snapshot = serde_json::from_value(Value::Object(accepted))
        .map_err(|e| StrideError::Deserialization(e.to_string()))?;
    Ok((snapshot, dropped))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BadgeId, OpportunityId, Streak, UnlockedBadge};
    use chrono::{TimeZone, Utc};

    fn sample() -> ProgressionSnapshot {
        let at = Utc
            .with_ymd_and_hms(2026, 6, 3, 9, 15, 0)
            .single()
            .expect("valid instant");
        let mut snapshot = ProgressionSnapshot {
            is_onboarded: true,
            xp: 480,
            level: 4,
            xp_to_next_level: 337,
            streak: Streak {
                current: 2,
                longest: 5,
                last_check_in: Some(at),
            },
            unlocked_badges: vec![UnlockedBadge {
                id: BadgeId::new("first-login"),
                unlocked_at: at,
            }],
            ..ProgressionSnapshot::default()
        };
        snapshot
            .saved
            .insert(OpportunityId::new("robotics-camp").expect("id"));
        snapshot
    }

    #[test]
    fn header_layout() {
        let bytes = PersistenceHeader::new().to_bytes();
        assert_eq!(&bytes[0..4], b"STRD");
        assert_eq!(bytes[4], primitives::FORMAT_VERSION);
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let bytes1 = snapshot_to_bytes(&sample()).expect("encode");
        let restored = snapshot_from_bytes(&bytes1).expect("decode");
        let bytes2 = snapshot_to_bytes(&restored).expect("re-encode");

        assert_eq!(restored, sample());
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("encode");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            snapshot_from_bytes(&bytes),
            Err(StrideError::Deserialization(_))
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("encode");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(snapshot_from_bytes(&bytes).is_err());
    }

    #[test]
    fn short_input_rejected() {
        assert!(snapshot_from_bytes(b"STR").is_err());
    }

    #[test]
    fn partial_json_defaults_missing_fields() {
        let snapshot = snapshot_from_json(r#"{"xp": 250, "saved": ["a", "b"]}"#).expect("decode");
        assert_eq!(snapshot.xp, 250);
        assert_eq!(snapshot.saved.len(), 2);
        assert!(!snapshot.is_onboarded);
        assert_eq!(snapshot.streak, Streak::default());
        assert!(snapshot.unlocked_badges.is_empty());
    }

    #[test]
    fn unknown_badge_ids_survive_json() {
        let json = r#"{"unlocked_badges":[{"id":"retired-badge","unlocked_at":"2025-01-01T00:00:00Z"}]}"#;
        let snapshot = snapshot_from_json(json).expect("decode");
        assert_eq!(snapshot.unlocked_badges[0].id, BadgeId::new("retired-badge"));
    }

    #[test]
    fn wrong_typed_field_is_dropped_alone() {
        let json = r#"{"xp": 5000, "is_onboarded": true, "saved": ["a", "b", "c"], "streak": {"current": "oops"}}"#;
        let (snapshot, dropped) = snapshot_from_json_lossy(json).expect("decode");
        assert_eq!(dropped, vec!["streak".to_string()]);
        assert_eq!(snapshot.xp, 5000);
        assert!(snapshot.is_onboarded);
        assert_eq!(snapshot.saved.len(), 3);
        assert_eq!(snapshot.streak, Streak::default());
    }

    #[test]
    fn clean_json_drops_nothing() {
        let (_, dropped) = snapshot_from_json_lossy(r#"{"xp": 10}"#).expect("decode");
        assert!(dropped.is_empty());
    }

    #[test]
    fn non_object_json_is_an_error() {
        assert!(matches!(
            snapshot_from_json("[1, 2, 3]"),
            Err(StrideError::Deserialization(_))
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            snapshot_from_json("{not json"),
            Err(StrideError::Deserialization(_))
        ));
    }
}
