//! Turn user due text into a concrete calendar date.
//!
//! Bare day-of-month numbers and ISO dates resolve locally; anything else is
//! handed to the service's own parser via a throwaway probe task whose
//! resolved due is read back. The probe is deleted on success and failure.

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::todoist::model::{DueInput, NewTask};
use crate::todoist::{RemoteError, TodoistClient};

use super::{DueError, DueResult};

/// How many months ahead a bare day-of-month is allowed to scan.
const MAX_MONTH_SCAN: u32 = 24;

pub fn resolve_due_date(
    client: &TodoistClient,
    text: &str,
    today: NaiveDate,
    tz: Tz,
) -> DueResult<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DueError::InvalidDueText(text.to_string()));
    }

    if let Ok(day) = trimmed.parse::<u32>() {
        if !(1..=31).contains(&day) {
            return Err(DueError::InvalidDueText(text.to_string()));
        }
        return next_date_with_day(today, day)
            .ok_or_else(|| DueError::InvalidDueText(text.to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    probe_resolve(client, trimmed, tz)
}

/// Next calendar date whose day-of-month equals `day`, starting at `today`.
fn next_date_with_day(today: NaiveDate, day: u32) -> Option<NaiveDate> {
    let mut year = today.year();
    let mut month = today.month();

    for _ in 0..MAX_MONTH_SCAN {
        if let Some(candidate) = NaiveDate::from_ymd_opt(year, month, day)
            && candidate >= today
        {
            return Some(candidate);
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    None
}

/// Create a probe task carrying the raw text as the service due-string, read
/// the resolved date back, then delete the probe.
fn probe_resolve(client: &TodoistClient, text: &str, tz: Tz) -> DueResult<NaiveDate> {
    let marker = format!("[due-probe {}]", Uuid::new_v4());
    let new_task = NewTask::new(marker).with_due(&DueInput::Text(text.to_string()));

    let probe = match client.add_task(&new_task) {
        Ok(task) => task,
        Err(RemoteError::Http { status: 400, .. }) => {
            return Err(DueError::InvalidDueText(text.to_string()));
        }
        Err(other) => return Err(other.into()),
    };

    let resolved = probe
        .due
        .as_ref()
        .and_then(|due| due.calendar_date(tz))
        .ok_or_else(|| DueError::InvalidDueText(text.to_string()));

    if let Err(error) = client.delete_task(&probe.id) {
        warn!(probe_id = %probe.id, "failed to delete due probe task: {error}");
    } else {
        debug!(probe_id = %probe.id, "deleted due probe task");
    }

    resolved
}
