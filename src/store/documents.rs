//! Typed shapes of the on-disk state documents.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Completion-log entries older than this many days are purged on write.
pub const COMPLETION_RETENTION_DAYS: i64 = 30;

/// The single "current task" pointer, stamped with device identity.
/// File absent means no active task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTaskRecord {
    pub task_id: String,
    pub task_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_due: Option<String>,
    pub device_id: String,
    pub last_updated: DateTime<Utc>,
}

/// One saved filter. At most one entry is active; `flip` rotates in
/// insertion order. Older files wrote the active flag as 0/1 or "0"/"1",
/// so decoding stays tolerant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub id: u32,
    pub filter: String,
    #[serde(rename = "isActive", deserialize_with = "flexible_bool")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Flexible::deserialize(deserializer)? {
        Flexible::Bool(value) => Ok(value),
        Flexible::Int(value) => Ok(value != 0),
        Flexible::Text(value) => match value.trim() {
            "1" | "true" | "True" => Ok(true),
            _ => Ok(false),
        },
    }
}

/// Returns the active filter, if any.
pub fn active_filter(filters: &[FilterEntry]) -> Option<&FilterEntry> {
    filters.iter().find(|entry| entry.is_active)
}

/// Rotate the active flag to the next filter in insertion order.
/// With no active entry the first becomes active.
pub fn rotate_filter(filters: &mut [FilterEntry]) -> Option<&FilterEntry> {
    if filters.is_empty() {
        return None;
    }

    let current = filters.iter().position(|entry| entry.is_active);
    for entry in filters.iter_mut() {
        entry.is_active = false;
    }
    let next = match current {
        Some(index) => (index + 1) % filters.len(),
        None => 0,
    };
    filters[next].is_active = true;
    Some(&filters[next])
}

/// One completed task, timestamped in local wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub id: u64,
    #[serde(with = "log_timestamp")]
    pub datetime: NaiveDateTime,
    pub task_name: String,
}

/// "YYYY-MM-DD HH:MM:SS", the completion log's legacy timestamp format.
pub mod log_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(D::Error::custom)
    }
}

/// Append a completion entry, assigning the next monotonic id and purging
/// entries older than the retention window.
pub fn append_completion(
    log: &mut Vec<CompletionEntry>,
    task_name: &str,
    now_local: NaiveDateTime,
) -> u64 {
    purge_old_completions(log, now_local.date());
    let id = log.iter().map(|entry| entry.id).max().unwrap_or(0) + 1;
    log.push(CompletionEntry {
        id,
        datetime: now_local,
        task_name: task_name.to_string(),
    });
    id
}

pub fn purge_old_completions(log: &mut Vec<CompletionEntry>, today: NaiveDate) {
    let cutoff = today - chrono::Duration::days(COMPLETION_RETENTION_DAYS);
    log.retain(|entry| entry.datetime.date() >= cutoff);
}

/// Completions counted for a single day; resets when the day changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCount {
    pub total_today: u32,
    pub todays_date: NaiveDate,
}

impl DayCount {
    /// Count one more completion, resetting first if the recorded day is
    /// not `today`.
    pub fn bump(&mut self, today: NaiveDate) -> u32 {
        if self.todays_date != today {
            self.todays_date = today;
            self.total_today = 0;
        }
        self.total_today += 1;
        self.total_today
    }
}

/// Per-day hide set for regular tasks, keyed by date, service IDs as values.
pub type RegularHide = BTreeMap<NaiveDate, Vec<String>>;

/// Drop entries for past days and record `task_id` as hidden today.
pub fn hide_regular_today(hide: &mut RegularHide, today: NaiveDate, task_id: &str) {
    hide.retain(|date, _| *date >= today);
    let entry = hide.entry(today).or_default();
    if !entry.iter().any(|id| id == task_id) {
        entry.push(task_id.to_string());
    }
}

pub fn hidden_regular_ids(hide: &RegularHide, today: NaiveDate) -> Vec<String> {
    hide.get(&today).cloned().unwrap_or_default()
}

/// Per-day hide set for long-term tasks, keyed by synthetic index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongHide {
    pub date: NaiveDate,
    pub indices: Vec<u32>,
}

impl LongHide {
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            date: today,
            indices: Vec::new(),
        }
    }

    /// Hide `index` for today, discarding any stale previous-day state.
    pub fn hide_today(&mut self, today: NaiveDate, index: u32) {
        if self.date != today {
            self.date = today;
            self.indices.clear();
        }
        if !self.indices.contains(&index) {
            self.indices.push(index);
        }
    }

    pub fn hidden_today(&self, today: NaiveDate) -> &[u32] {
        if self.date == today { &self.indices } else { &[] }
    }
}

/// One diary day as the timesheet builder writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryDay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_objective: Option<String>,
    pub tasks: Vec<DiaryTask>,
    pub total_duration: u32,
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryTask {
    pub summary: String,
    pub duration: u32,
}

pub type Diary = BTreeMap<NaiveDate, DiaryDay>;

/// A grafted focus task; index is the 1..3 slot shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraftEntry {
    pub task_id: String,
    pub task_name: String,
    pub index: u8,
}

/// Miscellaneous console options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub enable_diary_prompts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_all_done_celebration_date: Option<NaiveDate>,
}

/// Audit record for a recurring completion that failed to advance the due
/// date on the service side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEntry {
    pub id: u64,
    pub datetime_utc: DateTime<Utc>,
    pub device_id: String,
    pub task_id: String,
    pub task_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_after: Option<String>,
}

pub fn append_anomaly(log: &mut Vec<AnomalyEntry>, mut entry: AnomalyEntry) -> u64 {
    let id = log.iter().map(|e| e.id).max().unwrap_or(0) + 1;
    entry.id = id;
    log.push(entry);
    id
}
