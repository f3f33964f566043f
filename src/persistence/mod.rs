use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::models::Position;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PositionSnapshot {
    schema_version: u32,
    saved_at: chrono::DateTime<chrono::Utc>,
    positions: Vec<Position>,
}

/// Persists open positions to a JSON file so a restart can resume with
/// the same state it shut down with.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot atomically: serialize to a sibling temp file,
    /// then rename over the target so a crash mid-write never leaves a
    /// truncated snapshot behind.
    pub fn save(&self, positions: &[Position]) -> crate::Result<()> {
        let snapshot = PositionSnapshot {
            schema_version: SCHEMA_VERSION,
            saved_at: chrono::Utc::now(),
            positions: positions.to_vec(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), count = positions.len(), "snapshot saved");
        Ok(())
    }

    /// Load persisted positions. A missing file is a fresh start, not an
    /// error; a version mismatch is fatal so state is never misread.
    pub fn load(&self) -> crate::Result<Vec<Position>> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no snapshot found, starting fresh");
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path)?;
        let snapshot: PositionSnapshot = serde_json::from_str(&raw)?;

        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(BotError::Config(format!(
                "snapshot schema version {} unsupported, expected {}",
                snapshot.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(snapshot.positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_position() -> Position {
        Position {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Long,
            entry_price: 100.0,
            quantity: 1.5,
            stop_loss_price: 95.0,
            trailing_stop_price: Some(101.0),
            activation_price: 105.0,
            entry_time: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("positions.json"));

        let positions = vec![sample_position(), sample_position()];
        store.save(&positions).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, positions[0].id);
        assert_eq!(loaded[0].trailing_stop_price, Some(101.0));
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");
        std::fs::write(
            &path,
            r#"{"schema_version": 99, "saved_at": "2025-01-01T00:00:00Z", "positions": []}"#,
        )
        .unwrap();

        let store = SnapshotStore::new(path);
        assert!(store.load().is_err());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("positions.json"));
        store.save(&[sample_position()]).unwrap();

        assert!(!dir.path().join("positions.json.tmp").exists());
    }
}
