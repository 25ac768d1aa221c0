//! Background status publisher.
//!
//! Computes "is the user up to date?" from the ranked regular view and the
//! long-term showing count, and publishes a fixed `todo.*` key set to the
//! state service. A single-writer gate keyed on device identity keeps two
//! machines from fighting over the same keys; only the stored owner
//! publishes, everyone else skips with `owner_mismatch`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::rank::{self, RankedTask};
use crate::settings::Settings;
use crate::store::{FILTERS_FILE, REGULAR_HIDE_FILE, StateStore, documents};
use crate::todoist::TodoistClient;
use crate::types::{NextDueKind, UpToDateReason};

use super::{StateClient, StateSnapshot, StateSyncError};

pub const STATUS_VERSION: u64 = 1;
pub const DEFAULT_FILTER_QUERY: &str = "today | overdue";

pub const OWNER_ID_KEY: &str = "todo.background_owner_device_id";
pub const OWNER_LABEL_KEY: &str = "todo.background_owner_device_label";
pub const OWNER_CLAIMED_AT_KEY: &str = "todo.background_owner_claimed_at";

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub up_to_date: bool,
    pub reason: UpToDateReason,
    pub regular_count: usize,
    pub long_showing_count: usize,
    pub next_due_kind: NextDueKind,
    pub next_due_at: Option<DateTime<Utc>>,
    pub next_due_date: Option<NaiveDate>,
    pub checked_at: DateTime<Utc>,
}

/// The up-to-date ladder: long tasks first, then the shape of the first
/// ranked regular task decides.
pub fn compute_status(
    regular: &[RankedTask],
    long_showing_count: usize,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> StatusReport {
    let (next_due_kind, next_due_at, next_due_date) = match regular.first() {
        Some(first) if first.has_time => (NextDueKind::Datetime, Some(first.due_utc), None),
        Some(first) if first.due_date.is_some() => (NextDueKind::Date, None, first.due_date),
        _ => (NextDueKind::None, None, None),
    };

    let (up_to_date, reason) = if long_showing_count > 0 {
        (false, UpToDateReason::LongTasksDue)
    } else if regular.is_empty() {
        (true, UpToDateReason::NoRegularTasks)
    } else {
        let first = &regular[0];
        if first.timed_due_in_future(now) || first.dated_due_in_future(today) {
            (true, UpToDateReason::NextRegularInFuture)
        } else {
            (false, UpToDateReason::RegularDueOrUndated)
        }
    };

    StatusReport {
        up_to_date,
        reason,
        regular_count: regular.len(),
        long_showing_count,
        next_due_kind,
        next_due_at,
        next_due_date,
        checked_at: now,
    }
}

/// The published key set, namespaced under `todo.`.
pub fn to_state_set(report: &StatusReport, updated_by: &str) -> Map<String, Value> {
    let mut set = Map::new();
    set.insert(
        "todo.tasks_up_to_date".to_string(),
        Value::from(report.up_to_date),
    );
    set.insert(
        "todo.tasks_last_checked_at".to_string(),
        Value::from(report.checked_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    set.insert(
        "todo.tasks_up_to_date_reason".to_string(),
        Value::from(report.reason.as_str()),
    );
    set.insert(
        "todo.tasks_status_version".to_string(),
        Value::from(STATUS_VERSION),
    );
    set.insert(
        "todo.long_tasks_showing_count".to_string(),
        Value::from(report.long_showing_count as u64),
    );
    set.insert(
        "todo.regular_tasks_count".to_string(),
        Value::from(report.regular_count as u64),
    );
    set.insert(
        "todo.next_normal_due_kind".to_string(),
        Value::from(report.next_due_kind.as_str()),
    );
    set.insert(
        "todo.next_normal_due_at".to_string(),
        match (report.next_due_kind, report.next_due_at) {
            (NextDueKind::Datetime, Some(at)) => {
                Value::from(at.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            _ => Value::Null,
        },
    );
    set.insert(
        "todo.next_normal_due_date".to_string(),
        match (report.next_due_kind, report.next_due_date) {
            (NextDueKind::Date, Some(date)) => Value::from(date.to_string()),
            _ => Value::Null,
        },
    );
    set.insert(
        "todo.tasks_last_updated_by".to_string(),
        Value::from(updated_by.to_string()),
    );
    set
}

#[derive(Debug, Clone, PartialEq)]
pub enum OwnershipCheck {
    Owner,
    /// Someone else (or nobody) holds the gate; publishing is skipped.
    NotOwner { owner: Option<String> },
}

pub fn check_ownership(snapshot: &StateSnapshot, device_id: &str) -> OwnershipCheck {
    match snapshot.get_str(OWNER_ID_KEY) {
        Some(owner) if owner == device_id => OwnershipCheck::Owner,
        other => OwnershipCheck::NotOwner {
            owner: other.map(str::to_string),
        },
    }
}

/// Take the single-writer gate for this device. A plain state patch; the
/// last claimer wins.
pub fn claim_ownership(
    client: &StateClient,
    device_id: &str,
    device_label: &str,
    updated_by: &str,
) -> Result<(), StateSyncError> {
    let mut set = Map::new();
    set.insert(OWNER_ID_KEY.to_string(), Value::from(device_id.to_string()));
    set.insert(
        OWNER_LABEL_KEY.to_string(),
        Value::from(device_label.to_string()),
    );
    set.insert(
        OWNER_CLAIMED_AT_KEY.to_string(),
        Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    client.update_state(updated_by, &set, &[]).map(|_| ())
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published(StatusReport),
    SkippedNotOwner { owner: Option<String> },
    /// The ETag retry budget ran out; dropped for this tick.
    DroppedStaleEtag,
}

/// The filter query the publisher ranks against: the active saved filter,
/// else the default.
fn publish_filter_query(store: &StateStore) -> String {
    let filters: Vec<documents::FilterEntry> = store.read_or(FILTERS_FILE, Vec::new);
    documents::active_filter(&filters)
        .map(|entry| entry.filter.clone())
        .unwrap_or_else(|| DEFAULT_FILTER_QUERY.to_string())
}

/// One full gate-check + compute + publish pass.
pub fn publish_once(
    tasks_client: &TodoistClient,
    state_client: &StateClient,
    store: &StateStore,
    settings: &Settings,
    device_id: &str,
    updated_by: &str,
) -> Result<PublishOutcome> {
    let gate = state_client
        .get_state()
        .context("failed to read state service for ownership gate")?;
    if let OwnershipCheck::NotOwner { owner } = check_ownership(&gate, device_id) {
        info!(reason = "owner_mismatch", ?owner, "skipping status publish");
        return Ok(PublishOutcome::SkippedNotOwner { owner });
    }

    let tz = settings.tz();
    let now = Utc::now();
    let today = now.with_timezone(&tz).date_naive();

    let query = publish_filter_query(store);
    let tasks = tasks_client
        .list_tasks_by_filter(&query)
        .with_context(|| format!("failed to fetch tasks for filter '{query}'"))?;
    let hidden = documents::hidden_regular_ids(
        &store.read_or(REGULAR_HIDE_FILE, documents::RegularHide::new),
        today,
    );
    let regular = rank::rank(tasks, &hidden, tz, settings.rollover_time(), now);

    let long_project = tasks_client
        .project_named(&settings.long_project)
        .context("failed to list projects")?;
    let long_showing = match long_project {
        Some(project) => crate::longterm::load(tasks_client, store, &project.id, tz, now)?
            .showing_count(),
        None => 0,
    };

    let report = compute_status(&regular, long_showing, now, today);
    let set = to_state_set(&report, updated_by);

    match state_client.update_state(updated_by, &set, &[]) {
        Ok(_) => {
            debug!(
                up_to_date = report.up_to_date,
                reason = report.reason.as_str(),
                "published status"
            );
            Ok(PublishOutcome::Published(report))
        }
        Err(StateSyncError::EtagExhausted(attempts)) => {
            warn!(attempts, "state kept moving under us; dropping this tick");
            Ok(PublishOutcome::DroppedStaleEtag)
        }
        Err(other) => Err(other).context("failed to publish status"),
    }
}

/// Handle to the background publisher thread.
pub struct PublisherHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PublisherHandle {
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PublisherHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Spawn the publish loop: gate-check, publish, sleep, repeat. Every sleep
/// wakes promptly on the stop signal.
pub fn spawn_publisher(
    tasks_client: TodoistClient,
    state_client: StateClient,
    store: StateStore,
    settings: Settings,
    device_id: String,
    updated_by: String,
) -> PublisherHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = thread::spawn(move || {
        let interval = Duration::from_secs(settings.publish_interval_s);
        while !stop_flag.load(Ordering::Relaxed) {
            match publish_once(
                &tasks_client,
                &state_client,
                &store,
                &settings,
                &device_id,
                &updated_by,
            ) {
                Ok(outcome) => debug!(?outcome, "publisher tick finished"),
                Err(error) => warn!("publisher tick failed: {error:#}"),
            }
            interruptible_sleep(interval, &stop_flag);
        }
    });

    PublisherHandle {
        stop,
        thread: Some(thread),
    }
}

/// Sleep that can be interrupted by the stop signal.
fn interruptible_sleep(duration: Duration, stop: &AtomicBool) {
    let chunk = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO && !stop.load(Ordering::Relaxed) {
        let sleep_duration = remaining.min(chunk);
        thread::sleep(sleep_duration);
        remaining = remaining.saturating_sub(sleep_duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    use crate::rank::rank;
    use crate::todoist::model::Task;

    fn london() -> Tz {
        chrono_tz::Europe::London
    }

    fn now() -> DateTime<Utc> {
        // 2026-02-09 12:00 London == 12:00 UTC in winter.
        Utc.with_ymd_and_hms(2026, 2, 9, 12, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 9).unwrap()
    }

    fn ranked(tasks: Vec<Task>) -> Vec<RankedTask> {
        rank(
            tasks,
            &[],
            london(),
            chrono::NaiveTime::from_hms_opt(6, 59, 0).unwrap(),
            now(),
        )
    }

    fn task_json(value: serde_json::Value) -> Task {
        serde_json::from_value(value).expect("valid task fixture")
    }

    #[test]
    fn no_tasks_is_up_to_date() {
        let report = compute_status(&[], 0, now(), today());

        assert!(report.up_to_date);
        assert_eq!(report.reason, UpToDateReason::NoRegularTasks);
        assert_eq!(report.regular_count, 0);
        assert_eq!(report.long_showing_count, 0);
        assert_eq!(report.next_due_kind, NextDueKind::None);

        let set = to_state_set(&report, "taskdeck-test");
        assert_eq!(set["todo.tasks_up_to_date"], Value::Bool(true));
        assert_eq!(
            set["todo.tasks_up_to_date_reason"],
            Value::from("no_regular_tasks")
        );
        assert_eq!(set["todo.tasks_status_version"], Value::from(1));
        assert_eq!(set["todo.regular_tasks_count"], Value::from(0));
        assert_eq!(set["todo.long_tasks_showing_count"], Value::from(0));
        assert_eq!(set["todo.next_normal_due_kind"], Value::from("none"));
        assert_eq!(set["todo.next_normal_due_at"], Value::Null);
        assert_eq!(set["todo.next_normal_due_date"], Value::Null);
        assert_eq!(
            set["todo.tasks_last_updated_by"],
            Value::from("taskdeck-test")
        );
    }

    #[test]
    fn long_tasks_due_overrides_everything() {
        let report = compute_status(&[], 3, now(), today());

        assert!(!report.up_to_date);
        assert_eq!(report.reason, UpToDateReason::LongTasksDue);
        assert_eq!(report.long_showing_count, 3);
    }

    #[test]
    fn future_timed_first_task_is_up_to_date_with_utc_iso() {
        // 13:00 London on 2026-02-09 is 13:00 UTC (GMT season).
        let regular = ranked(vec![task_json(serde_json::json!({
            "id": "t1",
            "content": "call",
            "priority": 2,
            "due": {"datetime": "2026-02-09T13:00:00", "timezone": "Europe/London"}
        }))]);

        let report = compute_status(&regular, 0, now(), today());

        assert!(report.up_to_date);
        assert_eq!(report.reason, UpToDateReason::NextRegularInFuture);
        assert_eq!(report.next_due_kind, NextDueKind::Datetime);

        let set = to_state_set(&report, "taskdeck-test");
        assert_eq!(
            set["todo.next_normal_due_at"],
            Value::from("2026-02-09T13:00:00Z")
        );
        assert_eq!(set["todo.next_normal_due_date"], Value::Null);
    }

    #[test]
    fn future_dated_first_task_is_up_to_date() {
        let regular = ranked(vec![task_json(serde_json::json!({
            "id": "t1",
            "content": "someday",
            "priority": 2,
            "due": {"date": "2026-02-10"}
        }))]);

        let report = compute_status(&regular, 0, now(), today());

        assert!(report.up_to_date);
        assert_eq!(report.reason, UpToDateReason::NextRegularInFuture);
        assert_eq!(report.next_due_kind, NextDueKind::Date);

        let set = to_state_set(&report, "taskdeck-test");
        assert_eq!(set["todo.next_normal_due_date"], Value::from("2026-02-10"));
        assert_eq!(set["todo.next_normal_due_at"], Value::Null);
    }

    #[test]
    fn due_or_undated_first_task_is_not_up_to_date() {
        let regular = ranked(vec![task_json(serde_json::json!({
            "id": "t1",
            "content": "overdue",
            "priority": 2,
            "due": {"date": "2026-02-08"}
        }))]);

        let report = compute_status(&regular, 0, now(), today());

        assert!(!report.up_to_date);
        assert_eq!(report.reason, UpToDateReason::RegularDueOrUndated);
    }

    #[test]
    fn ownership_gate_matches_device_ids() {
        let mut state = Map::new();
        state.insert(OWNER_ID_KEY.to_string(), Value::from("dev-1"));
        let snapshot = StateSnapshot {
            state,
            etag: "\"v1\"".to_string(),
            server_time: None,
        };

        assert_eq!(check_ownership(&snapshot, "dev-1"), OwnershipCheck::Owner);
        assert_eq!(
            check_ownership(&snapshot, "dev-2"),
            OwnershipCheck::NotOwner {
                owner: Some("dev-1".to_string())
            }
        );
    }

    #[test]
    fn unclaimed_gate_blocks_publishing() {
        let snapshot = StateSnapshot {
            state: Map::new(),
            etag: "\"v1\"".to_string(),
            server_time: None,
        };
        assert_eq!(
            check_ownership(&snapshot, "dev-1"),
            OwnershipCheck::NotOwner { owner: None }
        );
    }

    #[test]
    fn interruptible_sleep_wakes_on_stop() {
        let stop = AtomicBool::new(true);
        let started = std::time::Instant::now();
        interruptible_sleep(Duration::from_secs(5), &stop);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn checked_at_is_z_suffixed() {
        let report = compute_status(&[], 0, now(), today());
        let set = to_state_set(&report, "taskdeck-test");
        let checked = set["todo.tasks_last_checked_at"].as_str().unwrap();
        assert!(checked.ends_with('Z'));
    }
}
