//! Change a task's due date while preserving time-of-day and recurrence.
//!
//! The service has no single call for "change the date, keep the time, keep
//! the rule", so the protocol stages it: send the new date (carrying the old
//! wall-clock time when there was one), re-read and verify, and when the
//! update dropped the recurrence flag, resend the rule anchored with a
//! single `starting <date>` clause and verify again.

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::todoist::TodoistClient;
use crate::todoist::model::{DueInput, Task, TaskUpdate};
use crate::types::localize;

use super::{DueError, DueResult, recurrence, resolver};

/// Outcome of a successful due move. `effective_date` can land past
/// `target_date` when recurrence recovery settles on a later occurrence;
/// callers surface the difference to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct DueChange {
    pub task: Task,
    pub target_date: NaiveDate,
    pub effective_date: NaiveDate,
    pub recovered_recurrence: bool,
}

pub fn move_due_date(
    client: &TodoistClient,
    task: &Task,
    due_text: &str,
    tz: Tz,
    today: NaiveDate,
) -> DueResult<DueChange> {
    let before = task.due.clone();
    let was_recurring = recurrence::is_recurring(before.as_ref());
    let rule = before.as_ref().and_then(|due| due.string.clone());
    let time_of_day = before.as_ref().and_then(|due| due.time_of_day(tz));
    let task_tz = before.as_ref().map(|due| due.tz(tz)).unwrap_or(tz);

    let target = resolver::resolve_due_date(client, due_text, today, tz)?;

    let update = match time_of_day {
        Some(time) => TaskUpdate::due(&DueInput::Datetime(datetime_at(target, time, task_tz))),
        None => TaskUpdate::due(&DueInput::Date(target)),
    };
    client.update_task(&task.id, &update)?;

    let updated = client.get_task(&task.id)?;
    let actual = updated.due.as_ref().and_then(|due| due.calendar_date(tz));
    if actual != Some(target) {
        return Err(DueError::DueVerificationMismatch {
            expected: target,
            actual,
        });
    }

    if !was_recurring || recurrence::is_recurring(updated.due.as_ref()) {
        return Ok(DueChange {
            task: updated,
            target_date: target,
            effective_date: target,
            recovered_recurrence: false,
        });
    }

    // The date moved but the rule was dropped; recover it.
    let Some(rule) = rule else {
        return Err(DueError::RecurrenceRecoveryFailed {
            rule: String::new(),
        });
    };
    recover_recurrence(client, &task.id, &rule, target, tz)
}

fn datetime_at(date: NaiveDate, time: NaiveTime, tz: Tz) -> chrono::DateTime<chrono::FixedOffset> {
    localize(tz, date.and_time(time)).fixed_offset()
}

fn recover_recurrence(
    client: &TodoistClient,
    task_id: &str,
    rule: &str,
    target: NaiveDate,
    tz: Tz,
) -> DueResult<DueChange> {
    let anchored = recurrence::with_starting(rule, target);
    debug!(task_id, rule = %anchored, "resending recurrence rule");

    client.update_task(task_id, &TaskUpdate::due(&DueInput::Text(anchored.clone())))?;

    let reread = client.get_task(task_id)?;
    let recurring_again = recurrence::is_recurring(reread.due.as_ref());
    let next = reread.due.as_ref().and_then(|due| due.calendar_date(tz));

    if !recurring_again {
        return Err(DueError::RecurrenceRecoveryFailed { rule: anchored });
    }
    let effective = match next {
        Some(date) if date >= target => date,
        _ => return Err(DueError::RecurrenceRecoveryFailed { rule: anchored }),
    };
    if effective != target {
        warn!(
            task_id,
            %target,
            %effective,
            "recurrence recovery landed on a later occurrence"
        );
    }

    Ok(DueChange {
        task: reread,
        target_date: target,
        effective_date: effective,
        recovered_recurrence: true,
    })
}
