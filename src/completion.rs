//! Completion pipeline: pair a remote close with the local bookkeeping.
//!
//! A close acknowledges before anything local changes, so the log never
//! claims a completion the service did not see. A close that times out is
//! NOT retried: the server almost certainly saw it, and a second close would
//! double-complete a recurring task. Just-closed IDs are suppressed from
//! fetches for a short window while the service converges.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::active;
use crate::due::recurrence;
use crate::longterm::LongTask;
use crate::store::{
    ANOMALY_FILE, COMPLETION_LOG_FILE, DAY_COUNT_FILE, OPTIONS_FILE, StateStore,
    documents::{
        AnomalyEntry, CompletionEntry, DayCount, Options, append_anomaly, append_completion,
    },
};
use crate::todoist::model::{DueInput, Task, TaskUpdate};
use crate::todoist::{RemoteError, TodoistClient};

pub const LONG_COMPLETION_PREFIX: &str = "Completed Long Task";
pub const LONG_TOUCH_PREFIX: &str = "Touched Long Task";

/// In-process suppression window for just-closed task IDs, smoothing over
/// the service's eventual consistency on the next fetch.
#[derive(Debug)]
pub struct RecentlyCompleted {
    ttl: Duration,
    entries: HashMap<String, Instant>,
}

impl RecentlyCompleted {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn mark(&mut self, task_id: &str) {
        self.entries.insert(task_id.to_string(), Instant::now());
    }

    /// IDs still inside the suppression window; expired entries drop out.
    pub fn suppressed_ids(&mut self) -> Vec<String> {
        let ttl = self.ttl;
        self.entries.retain(|_, marked| marked.elapsed() < ttl);
        self.entries.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    NoActiveTask,
    Completed { task_name: String, total_today: u32 },
    /// The close deadline elapsed; local state is untouched.
    CloseTimedOut { task_name: String },
    /// The service no longer knows the task; the handle was cleared.
    TaskVanished { task_name: String },
}

/// Complete the task the active handle points at.
pub fn complete_active(
    client: &TodoistClient,
    store: &StateStore,
    tz: Tz,
    recently: &mut RecentlyCompleted,
) -> Result<CompletionOutcome> {
    let Some(handle) = active::get(store) else {
        return Ok(CompletionOutcome::NoActiveTask);
    };

    match client.close_task(&handle.task_id) {
        Ok(()) => {}
        Err(RemoteError::Transport(error)) if error.is_timeout() || error.is_connect() => {
            warn!(
                task_id = %handle.task_id,
                "close failed in transit ({error}); not retrying to avoid double-completion"
            );
            return Ok(CompletionOutcome::CloseTimedOut {
                task_name: handle.task_name,
            });
        }
        Err(RemoteError::NotFound) => {
            warn!(task_id = %handle.task_id, "active task no longer exists; clearing handle");
            active::clear(store)?;
            return Ok(CompletionOutcome::TaskVanished {
                task_name: handle.task_name,
            });
        }
        Err(other) => return Err(other).context("failed to close active task"),
    }

    let total_today = record_completion(store, &handle.task_name, tz)?;
    recently.mark(&handle.task_id);
    active::clear(store)?;
    info!(task_name = %handle.task_name, total_today, "completed active task");

    Ok(CompletionOutcome::Completed {
        task_name: handle.task_name,
        total_today,
    })
}

/// Complete a long-term task by index, logging with the long-task prefix.
/// Recurring tasks rely on the service to roll the next occurrence; when it
/// does not, the anomaly log gets an audit record.
pub fn complete_long(
    client: &TodoistClient,
    store: &StateStore,
    tz: Tz,
    device_id: &str,
    long: &LongTask,
    recently: &mut RecentlyCompleted,
) -> Result<u32> {
    let was_recurring = long.is_recurring();
    let due_before = long.task.due.as_ref().and_then(|due| due.calendar_date(tz));

    client
        .close_task(&long.task.id)
        .with_context(|| format!("failed to close long task [{}]", long.index))?;

    let entry_name = format!("{LONG_COMPLETION_PREFIX}: {}", long.name());
    let total_today = record_completion(store, &entry_name, tz)?;
    recently.mark(&long.task.id);

    if was_recurring {
        verify_recurring_advance(client, store, tz, device_id, &long.task, due_before);
    }

    Ok(total_today)
}

#[derive(Debug, Clone, PartialEq)]
pub enum TouchOutcome {
    /// Closed; the service schedules the next occurrence.
    AdvancedRecurring,
    /// Logged and pushed to tomorrow.
    PushedToTomorrow { new_due: NaiveDate },
}

/// Advance a long task without finishing it for good: recurring tasks close
/// (the service rolls the date), one-shots log and move to tomorrow.
/// Touching twice in one day logs twice; the log is an audit trail.
pub fn touch_long(
    client: &TodoistClient,
    store: &StateStore,
    tz: Tz,
    device_id: &str,
    long: &LongTask,
    now: DateTime<Utc>,
) -> Result<TouchOutcome> {
    let entry_name = format!("{LONG_TOUCH_PREFIX}: {}", long.name());

    if long.is_recurring() {
        let due_before = long.task.due.as_ref().and_then(|due| due.calendar_date(tz));
        client
            .close_task(&long.task.id)
            .with_context(|| format!("failed to close recurring long task [{}]", long.index))?;
        record_completion(store, &entry_name, tz)?;
        verify_recurring_advance(client, store, tz, device_id, &long.task, due_before);
        return Ok(TouchOutcome::AdvancedRecurring);
    }

    let tomorrow = now.with_timezone(&tz).date_naive() + chrono::Duration::days(1);
    client
        .update_task(&long.task.id, &TaskUpdate::due(&DueInput::Date(tomorrow)))
        .with_context(|| format!("failed to push long task [{}] to tomorrow", long.index))?;
    record_completion(store, &entry_name, tz)?;

    Ok(TouchOutcome::PushedToTomorrow { new_due: tomorrow })
}

/// Append to the completion log and bump the per-day count.
fn record_completion(store: &StateStore, task_name: &str, tz: Tz) -> Result<u32> {
    let now_local = Utc::now().with_timezone(&tz).naive_local();

    let mut log: Vec<CompletionEntry> = store.read_or(COMPLETION_LOG_FILE, Vec::new);
    append_completion(&mut log, task_name, now_local);
    store.write(COMPLETION_LOG_FILE, &log)?;

    let today = now_local.date();
    let mut count = store.read_or(DAY_COUNT_FILE, || DayCount {
        total_today: 0,
        todays_date: today,
    });
    let total_today = count.bump(today);
    store.write(DAY_COUNT_FILE, &count)?;

    Ok(total_today)
}

/// Re-read a recurring task after a close and audit a non-advancing due.
fn verify_recurring_advance(
    client: &TodoistClient,
    store: &StateStore,
    tz: Tz,
    device_id: &str,
    task: &Task,
    due_before: Option<NaiveDate>,
) {
    let after = match client.get_task(&task.id) {
        Ok(reread) => reread,
        Err(RemoteError::NotFound) => return,
        Err(error) => {
            warn!(task_id = %task.id, "could not verify recurring advance: {error}");
            return;
        }
    };

    if !recurrence::is_recurring(after.due.as_ref()) {
        warn!(task_id = %task.id, "task stopped being recurring after close");
    }

    let due_after = after.due.as_ref().and_then(|due| due.calendar_date(tz));
    let advanced = matches!((due_before, due_after), (Some(before), Some(after)) if after > before);
    if advanced {
        return;
    }

    warn!(
        task_id = %task.id,
        ?due_before,
        ?due_after,
        "recurring completion did not advance the due date"
    );
    let mut log: Vec<AnomalyEntry> = store.read_or(ANOMALY_FILE, Vec::new);
    append_anomaly(&mut log, AnomalyEntry {
        id: 0,
        datetime_utc: Utc::now(),
        device_id: device_id.to_string(),
        task_id: task.id.clone(),
        task_content: task.content.clone(),
        due_before: due_before.map(|date| date.to_string()),
        due_after: due_after.map(|date| date.to_string()),
    });
    if let Err(error) = store.write(ANOMALY_FILE, &log) {
        warn!("failed to write recurring anomaly log: {error:#}");
    }
}

/// Fire the all-done celebration at most once per local day. The caller has
/// already established that nothing regular or long-term is due.
pub fn fire_celebration_once(store: &StateStore, today: NaiveDate) -> Result<bool> {
    let mut options: Options = store.read_or(OPTIONS_FILE, Options::default);
    if options.last_all_done_celebration_date == Some(today) {
        return Ok(false);
    }
    options.last_all_done_celebration_date = Some(today);
    store.write(OPTIONS_FILE, &options)?;
    Ok(true)
}
