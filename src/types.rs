//! Shared domain types used across the policy layer.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Task priorities as the service stores them: 1 is lowest, 4 is highest.
pub const PRIORITY_MIN: u8 = 1;
pub const PRIORITY_MAX: u8 = 4;

pub fn clamp_priority(priority: u8) -> u8 {
    priority.clamp(PRIORITY_MIN, PRIORITY_MAX)
}

/// Why the published "tasks up to date" flag has the value it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpToDateReason {
    NoRegularTasks,
    NextRegularInFuture,
    LongTasksDue,
    RegularDueOrUndated,
}

impl UpToDateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRegularTasks => "no_regular_tasks",
            Self::NextRegularInFuture => "next_regular_in_future",
            Self::LongTasksDue => "long_tasks_due",
            Self::RegularDueOrUndated => "regular_due_or_undated",
        }
    }
}

/// Shape of the next regular task's due value, as published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextDueKind {
    None,
    Date,
    Datetime,
}

impl NextDueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Date => "date",
            Self::Datetime => "datetime",
        }
    }
}

/// Resolve a naive wall-clock time in `tz`.
///
/// Strict resolution first; ambiguous times (autumn fold-back) take the
/// earlier offset, and nonexistent times (spring-forward gap) shift forward
/// an hour so a due at a skipped wall-clock minute still lands on that day.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(resolved) => resolved,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(resolved) => resolved,
                LocalResult::Ambiguous(earliest, _) => earliest,
                LocalResult::None => tz.from_utc_datetime(&naive),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn localize_handles_spring_forward_gap() {
        // Europe/London skipped 01:30 on 2026-03-29.
        let gap = NaiveDate::from_ymd_opt(2026, 3, 29)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let resolved = localize(chrono_tz::Europe::London, gap);
        assert_eq!(resolved.date_naive(), gap.date());
    }

    #[test]
    fn localize_takes_earlier_offset_when_ambiguous() {
        // 01:30 happened twice on 2026-10-25 in London.
        let folded = NaiveDate::from_ymd_opt(2026, 10, 25)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let resolved = localize(chrono_tz::Europe::London, folded);
        assert_eq!(resolved.naive_local(), folded);
    }

    #[test]
    fn clamp_priority_bounds() {
        assert_eq!(clamp_priority(0), 1);
        assert_eq!(clamp_priority(3), 3);
        assert_eq!(clamp_priority(9), 4);
    }

    #[test]
    fn reason_strings_match_published_vocabulary() {
        assert_eq!(UpToDateReason::NoRegularTasks.as_str(), "no_regular_tasks");
        assert_eq!(
            UpToDateReason::NextRegularInFuture.as_str(),
            "next_regular_in_future"
        );
        assert_eq!(UpToDateReason::LongTasksDue.as_str(), "long_tasks_due");
        assert_eq!(
            UpToDateReason::RegularDueOrUndated.as_str(),
            "regular_due_or_undated"
        );
    }

    #[test]
    fn next_due_kind_strings() {
        assert_eq!(NextDueKind::None.as_str(), "none");
        assert_eq!(NextDueKind::Date.as_str(), "date");
        assert_eq!(NextDueKind::Datetime.as_str(), "datetime");
    }
}
