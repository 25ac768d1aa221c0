//! The active-task handle: the one task currently selected to work on.
//!
//! The handle lives in a single state document. Absent file means no active
//! task; a present file always carries a non-empty `task_id`. A corrupt file
//! is deleted on read so the console recovers by reselecting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::device;
use crate::store::{ACTIVE_TASK_FILE, StateStore, documents::ActiveTaskRecord};

/// Outcome of comparing the stored handle's device stamp to this machine.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCheck {
    Ok,
    /// Another device wrote the handle last. Not an error; the caller warns.
    Warning {
        device_id: String,
        task_name: String,
        last_updated: DateTime<Utc>,
    },
}

pub fn get(store: &StateStore) -> Option<ActiveTaskRecord> {
    match store.read_strict::<ActiveTaskRecord>(ACTIVE_TASK_FILE) {
        Ok(Some(record)) if !record.task_id.is_empty() => Some(record),
        Ok(Some(_)) => {
            warn!("active task file has an empty task_id; deleting it");
            let _ = store.delete(ACTIVE_TASK_FILE);
            None
        }
        Ok(None) => None,
        Err(error) => {
            warn!("active task file is corrupt ({error:#}); deleting it");
            let _ = store.delete(ACTIVE_TASK_FILE);
            None
        }
    }
}

pub fn set(
    store: &StateStore,
    task_id: &str,
    task_name: &str,
    task_due: Option<String>,
) -> Result<ActiveTaskRecord> {
    let record = ActiveTaskRecord {
        task_id: task_id.to_string(),
        task_name: task_name.to_string(),
        task_due,
        device_id: device::device_id(),
        last_updated: Utc::now(),
    };
    store.write(ACTIVE_TASK_FILE, &record)?;
    Ok(record)
}

pub fn clear(store: &StateStore) -> Result<()> {
    store.delete(ACTIVE_TASK_FILE)
}

/// Check whether the stored handle was last written by this device.
pub fn verify_device(record: &ActiveTaskRecord) -> DeviceCheck {
    if record.device_id == device::device_id() {
        DeviceCheck::Ok
    } else {
        DeviceCheck::Warning {
            device_id: record.device_id.clone(),
            task_name: record.task_name.clone(),
            last_updated: record.last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_then_get_roundtrip_verifies_ok() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());

        set(&store, "task-1", "Write the report", Some("2026-02-21".into()))
            .expect("set active task");

        let record = get(&store).expect("active task should exist");
        assert_eq!(record.task_id, "task-1");
        assert_eq!(record.task_name, "Write the report");
        assert_eq!(verify_device(&record), DeviceCheck::Ok);
    }

    #[test]
    fn absent_file_means_no_active_task() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());
        assert!(get(&store).is_none());
    }

    #[test]
    fn corrupt_file_is_deleted_on_read() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());
        std::fs::write(store.path(ACTIVE_TASK_FILE), "{broken").expect("write corrupt file");

        assert!(get(&store).is_none());
        assert!(!store.exists(ACTIVE_TASK_FILE));
    }

    #[test]
    fn empty_task_id_is_treated_as_corrupt() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());
        let record = ActiveTaskRecord {
            task_id: String::new(),
            task_name: "ghost".into(),
            task_due: None,
            device_id: "dev".into(),
            last_updated: Utc::now(),
        };
        store.write(ACTIVE_TASK_FILE, &record).expect("write record");

        assert!(get(&store).is_none());
        assert!(!store.exists(ACTIVE_TASK_FILE));
    }

    #[test]
    fn foreign_device_stamp_is_a_warning_not_an_error() {
        let record = ActiveTaskRecord {
            task_id: "task-1".into(),
            task_name: "Write the report".into(),
            task_due: None,
            device_id: "someone-elses-laptop".into(),
            last_updated: Utc::now(),
        };

        match verify_device(&record) {
            DeviceCheck::Warning {
                device_id,
                task_name,
                ..
            } => {
                assert_eq!(device_id, "someone-elses-laptop");
                assert_eq!(task_name, "Write the report");
            }
            DeviceCheck::Ok => panic!("expected a device warning"),
        }
    }

    #[test]
    fn clear_removes_the_handle() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());
        set(&store, "task-1", "x", None).expect("set active task");

        clear(&store).expect("clear active task");
        assert!(get(&store).is_none());
    }
}
