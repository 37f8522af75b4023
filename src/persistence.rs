use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Key under which the usage counters are stored
pub const STATS_KEY: &str = "compilerStats";

/// Small string key-value storage port
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Stores all keys in a single JSON object on disk
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        debug!("Loading state from {}", self.path.display());
        let json = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&json) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // The next `set` rewrites the file from scratch
                warn!("Discarding unreadable state file {}: {}", self.path.display(), e);
                Ok(BTreeMap::new())
            }
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Saving state to {}", self.path.display());
        let json = serde_json::to_string_pretty(&entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory store, for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Usage counters kept across runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub total_analyses: u64,
    pub total_corrections: u64,
    pub last_used: Option<DateTime<Utc>>,
}

impl Stats {
    /// Read the counters, starting fresh when absent or unreadable
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let json = match store.get(STATS_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return Ok(Self::default()),
            Err(e) => {
                warn!("Failed to read statistics: {}", e);
                return Ok(Self::default());
            }
        };
        match serde_json::from_str(&json) {
            Ok(stats) => Ok(stats),
            Err(e) => {
                warn!("Ignoring corrupt statistics: {}", e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        store.set(STATS_KEY, &serde_json::to_string(self)?)
    }

    pub fn record_analysis(&mut self, now: DateTime<Utc>) {
        self.total_analyses += 1;
        self.last_used = Some(now);
    }

    pub fn record_correction(&mut self, now: DateTime<Utc>) {
        self.total_corrections += 1;
        self.last_used = Some(now);
    }

    /// Share of analyses whose fix was applied, in percent
    pub fn accuracy(&self) -> u32 {
        if self.total_analyses == 0 {
            return 0;
        }
        (self.total_corrections as f64 / self.total_analyses as f64 * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_missing_stats_start_at_zero() {
        let store = MemoryStore::new();
        assert_eq!(Stats::load(&store).unwrap(), Stats::default());
    }

    #[test]
    fn test_stats_use_camel_case_keys() {
        let mut store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut stats = Stats::default();
        stats.record_analysis(now);
        stats.save(&mut store).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&store.get(STATS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(raw["totalAnalyses"], 1);
        assert_eq!(raw["totalCorrections"], 0);
        assert_eq!(raw["lastUsed"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_reads_browser_style_payload() {
        let mut store = MemoryStore::new();
        store
            .set(
                STATS_KEY,
                r#"{"totalAnalyses":4,"totalCorrections":3,"lastUsed":null}"#,
            )
            .unwrap();
        let stats = Stats::load(&store).unwrap();
        assert_eq!(stats.total_analyses, 4);
        assert_eq!(stats.accuracy(), 75);
        assert!(stats.last_used.is_none());
    }

    #[test]
    fn test_corrupt_stats_fall_back_to_default() {
        let mut store = MemoryStore::new();
        store.set(STATS_KEY, "not json").unwrap();
        assert_eq!(Stats::load(&store).unwrap(), Stats::default());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = JsonFileStore::new(path.clone());
        assert!(store.get("anything").unwrap().is_none());
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        let reopened = JsonFileStore::new(path);
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_truncated_state_file_starts_fresh_and_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"compilerStats": "{\"totalAn"#).unwrap();

        let mut store = JsonFileStore::new(path.clone());
        assert_eq!(Stats::load(&store).unwrap(), Stats::default());

        let stats = Stats {
            total_analyses: 1,
            ..Stats::default()
        };
        stats.save(&mut store).unwrap();

        let reopened = JsonFileStore::new(path);
        assert_eq!(Stats::load(&reopened).unwrap(), stats);
    }

    #[test]
    fn test_accuracy_without_analyses_is_zero() {
        let stats = Stats {
            total_corrections: 2,
            ..Stats::default()
        };
        assert_eq!(stats.accuracy(), 0);
    }
}
