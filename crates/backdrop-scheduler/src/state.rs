use std::path::{Path, PathBuf};

use backdrop_core::fsutil::atomic_write;
use backdrop_core::{BackdropError, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::GenerationState;

/// Durable home of the [`GenerationState`].
pub trait StateStore: Send + Sync {
    /// Absent record → `Ok(GenerationState::default())`.
    /// Unreadable record → `Err(BackdropError::Parse)`.
    fn load(&self) -> Result<GenerationState>;

    /// Fully replace the record. Must not return `Ok` unless the new value is
    /// what the next `load` will see.
    fn save(&self, state: &GenerationState) -> Result<()>;
}

/// On-disk shape: `{"last_generation": "<timestamp>"}`.
#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    last_generation: Option<String>,
}

/// JSON file store, e.g. `last_generation.json`.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_error(&self, reason: impl Into<String>) -> BackdropError {
        BackdropError::Parse {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<GenerationState> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state record yet");
                return Ok(GenerationState::default());
            }
            Err(e) => return Err(BackdropError::io(&self.path, e)),
        };

        let record: StateRecord =
            serde_json::from_str(&raw).map_err(|e| self.parse_error(e.to_string()))?;

        let last_generation = match record.last_generation.as_deref() {
            Some(ts) => Some(
                parse_timestamp(ts)
                    .ok_or_else(|| self.parse_error(format!("invalid timestamp '{ts}'")))?,
            ),
            None => None,
        };

        Ok(GenerationState { last_generation })
    }

    fn save(&self, state: &GenerationState) -> Result<()> {
        let record = StateRecord {
            last_generation: state.last_generation.map(|t| t.to_rfc3339()),
        };
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| BackdropError::io(&self.path, std::io::Error::from(e)))?;
        atomic_write(&self.path, &json)?;
        debug!(path = %self.path.display(), "state record saved");
        Ok(())
    }
}

/// RFC 3339 first; otherwise a naive ISO-8601 local time as written by
/// older deployments (`2025-01-01T10:00:00.123456`).
fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store_in(dir: &tempfile::TempDir) -> JsonStateStore {
        JsonStateStore::new(dir.path().join("last_generation.json"))
    }

    #[test]
    fn absent_record_is_never_generated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = store_in(&dir).load().expect("load");
        assert_eq!(state, GenerationState::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        // Sub-second precision survives RFC 3339 text unchanged.
        let at = DateTime::parse_from_rfc3339("2025-03-04T05:06:07.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        let state = GenerationState::generated_at(at);
        store.save(&state).expect("save");
        assert_eq!(store.load().expect("load"), state);
    }

    #[test]
    fn save_fully_replaces_previous_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"last_generation": "2020-01-01T00:00:00Z", "extra": "junk that is long"}"#,
        )
        .expect("seed");

        let at = Utc::now();
        store.save(&GenerationState::generated_at(at)).expect("save");

        let raw = std::fs::read_to_string(store.path()).expect("read");
        assert!(!raw.contains("extra"));
        assert_eq!(store.load().expect("load").last_generation, Some(at));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").expect("seed");
        let err = store.load().unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
    }

    #[test]
    fn bad_timestamp_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"last_generation": "yesterday"}"#).expect("seed");
        let err = store.load().unwrap_err();
        assert!(matches!(err, BackdropError::Parse { .. }));
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn naive_local_timestamp_is_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let local = Local::now() - Duration::hours(3);
        let naive = local.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        std::fs::write(store.path(), format!(r#"{{"last_generation": "{naive}"}}"#))
            .expect("seed");

        let loaded = store.load().expect("load").last_generation.expect("ts");
        let drift = (loaded - local.with_timezone(&Utc)).num_seconds().abs();
        assert!(drift <= 1, "drift {drift}s");
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Parent "directory" is a regular file.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").expect("seed");
        let store = JsonStateStore::new(blocker.join("state.json"));
        let err = store
            .save(&GenerationState::generated_at(Utc::now()))
            .unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
