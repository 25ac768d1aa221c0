//! Deterministic ordering over the active filter's tasks.
//!
//! Every due is normalized to one localized instant so the sort is total:
//! timed dues convert to the configured zone, date-only dues roll over at a
//! configurable early-morning time the next day (overnight tasks stay
//! overdue until dawn), and undated tasks borrow "now" so priority and
//! creation time break the tie.

use std::cmp::Reverse;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::types::localize;
use crate::todoist::model::Task;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedTask {
    pub task: Task,
    /// Normalized due instant used for ordering.
    pub due_utc: DateTime<Utc>,
    pub has_time: bool,
    /// Calendar date of the due, absent for undated tasks.
    pub due_date: Option<NaiveDate>,
}

impl RankedTask {
    /// True when the task has a real timed due strictly in the future.
    pub fn timed_due_in_future(&self, now: DateTime<Utc>) -> bool {
        self.has_time && self.due_utc > now
    }

    /// True when the task has a date-only due strictly after `today`.
    pub fn dated_due_in_future(&self, today: NaiveDate) -> bool {
        !self.has_time && self.due_date.is_some_and(|date| date > today)
    }
}

/// Rank `tasks`, dropping today's hidden IDs first.
pub fn rank(
    tasks: Vec<Task>,
    hidden_ids: &[String],
    tz: Tz,
    rollover: NaiveTime,
    now: DateTime<Utc>,
) -> Vec<RankedTask> {
    let mut ranked: Vec<RankedTask> = tasks
        .into_iter()
        .filter(|task| !hidden_ids.iter().any(|id| id == &task.id))
        .map(|task| normalize(task, tz, rollover, now))
        .collect();

    ranked.sort_by_key(|entry| {
        (
            Reverse(entry.task.priority),
            entry.due_utc,
            !entry.has_time, // timed first on the same instant
            entry.task.created_at.unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    });
    ranked
}

fn normalize(task: Task, tz: Tz, rollover: NaiveTime, now: DateTime<Utc>) -> RankedTask {
    let due = task.due.clone();

    match due {
        Some(due) if due.has_time() => {
            let instant = due.datetime_utc(tz).unwrap_or(now);
            let date = due.calendar_date(tz);
            RankedTask {
                task,
                due_utc: instant,
                has_time: true,
                due_date: date,
            }
        }
        Some(due) => match due.date {
            Some(date) => {
                // All-day dues count until the rollover time next morning.
                let end = localize(tz, (date + Duration::days(1)).and_time(rollover));
                RankedTask {
                    task,
                    due_utc: end.with_timezone(&Utc),
                    has_time: false,
                    due_date: Some(date),
                }
            }
            None => RankedTask {
                task,
                due_utc: now,
                has_time: false,
                due_date: None,
            },
        },
        None => RankedTask {
            task,
            due_utc: now,
            has_time: false,
            due_date: None,
        },
    }
}
