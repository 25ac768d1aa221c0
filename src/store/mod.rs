//! Local state store.
//!
//! Every piece of client-side state is a named JSON document in one
//! directory. Writes go to a sibling temp file and are renamed over the
//! target so a crash mid-write never tears the original. Reads that fail to
//! parse return the caller's default; freshness comes from re-reading, there
//! is no in-memory cache.

pub mod documents;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

pub const ACTIVE_TASK_FILE: &str = "active_task.json";
pub const FILTERS_FILE: &str = "filters.json";
pub const COMPLETION_LOG_FILE: &str = "completed_tasks.json";
pub const DAY_COUNT_FILE: &str = "day_count.json";
pub const REGULAR_HIDE_FILE: &str = "hidden_tasks.json";
pub const LONG_HIDE_FILE: &str = "hidden_long_tasks.json";
pub const DIARY_FILE: &str = "diary.json";
pub const GRAFT_FILE: &str = "grafted_tasks.json";
pub const OPTIONS_FILE: &str = "options.json";
pub const ANOMALY_FILE: &str = "recurring_anomalies.json";

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskdeck")
            .join("state");
        Self::open(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Read a document, falling back to the supplied default when the file
    /// is absent, unreadable, or fails to parse. Corruption is a warning,
    /// never an error, so one bad file cannot brick the console.
    pub fn read_or<T: DeserializeOwned>(&self, name: &str, default: impl FnOnce() -> T) -> T {
        match self.read_strict(name) {
            Ok(Some(value)) => value,
            Ok(None) => default(),
            Err(error) => {
                warn!(
                    "failed to read state file '{}': {error}; using default",
                    name
                );
                default()
            }
        }
    }

    /// Read a document, distinguishing "absent" from "present but corrupt".
    /// The active-task handle needs the distinction to delete corrupt files.
    pub fn read_strict<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read state file '{}'", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse state file '{}'", path.display()))?;
        Ok(Some(value))
    }

    /// Atomic write-replace: serialize, write a sibling temp file, rename.
    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create state directory '{}'", self.dir.display())
        })?;

        let path = self.path(name);
        let contents = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialize state file '{name}'"))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("invalid state file name '{name}'"))?
            .to_string_lossy()
            .to_string();
        let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, contents).with_context(|| {
            format!("failed to write temporary state file '{}'", tmp_path.display())
        })?;
        fs::rename(&tmp_path, &path).with_context(|| {
            format!(
                "failed to atomically rename state file '{}' to '{}'",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path)
            .with_context(|| format!("failed to delete state file '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    fn sample() -> Doc {
        Doc {
            name: "probe".to_string(),
            count: 3,
        }
    }

    #[test]
    fn read_missing_returns_default() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());

        let doc = store.read_or("missing.json", sample);
        assert_eq!(doc, sample());
    }

    #[test]
    fn write_then_read_roundtrip() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());

        store.write("doc.json", &sample()).expect("write doc");
        let loaded: Doc = store.read_or("doc.json", || panic!("should exist"));
        assert_eq!(loaded, sample());
    }

    #[test]
    fn corrupt_file_returns_default_and_keeps_file() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());
        fs::create_dir_all(temp.path()).unwrap();
        fs::write(store.path("doc.json"), "{not json").expect("write corrupt file");

        let doc = store.read_or("doc.json", sample);
        assert_eq!(doc, sample());
        assert!(store.exists("doc.json"));
    }

    #[test]
    fn read_strict_reports_corruption() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());
        fs::write(store.path("doc.json"), "][").expect("write corrupt file");

        let result: Result<Option<Doc>> = store.read_strict("doc.json");
        assert!(result.is_err());
    }

    #[test]
    fn write_is_atomic_no_temp_left_behind() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());

        store.write("doc.json", &sample()).expect("write doc");
        store
            .write("doc.json", &Doc {
                name: "probe".to_string(),
                count: 4,
            })
            .expect("overwrite doc");

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let loaded: Doc = store.read_or("doc.json", || panic!("should exist"));
        assert_eq!(loaded.count, 4);
    }

    #[test]
    fn delete_missing_is_ok() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());
        assert!(store.delete("nope.json").is_ok());
    }
}
