//! Daily timesheet builder.
//!
//! Reduces a day's completion log (plus any extra summaries typed at the
//! prompt) into a diary entry normalized to a 7-8 hour working day. The
//! target is randomized so consecutive days do not all read 420 minutes.

use anyhow::Result;
use chrono::NaiveDate;
use rand::Rng;

use crate::store::{
    COMPLETION_LOG_FILE, DIARY_FILE, StateStore,
    documents::{CompletionEntry, Diary, DiaryDay, DiaryTask},
};

/// Minutes credited to an entry before balancing.
pub const DEFAULT_ENTRY_MINUTES: u32 = 5;
/// No entry may be squeezed below this.
pub const MIN_ENTRY_MINUTES: u32 = 5;
const TARGET_MIN: u32 = 420;
const TARGET_MAX: u32 = 480;

/// Random day target in [420, 480], rounded to the nearest 5 minutes.
pub fn random_target() -> u32 {
    let raw = rand::rng().random_range(TARGET_MIN..=TARGET_MAX);
    round_to_five(raw)
}

fn round_to_five(value: u32) -> u32 {
    ((value + 2) / 5) * 5
}

/// Completion-log entries for `date`, each seeded with the default duration.
pub fn entries_for_date(log: &[CompletionEntry], date: NaiveDate) -> Vec<DiaryTask> {
    log.iter()
        .filter(|entry| entry.datetime.date() == date)
        .map(|entry| DiaryTask {
            summary: entry.task_name.clone(),
            duration: DEFAULT_ENTRY_MINUTES,
        })
        .collect()
}

/// Greedily add or remove `step`-minute units in insertion order until the
/// total hits `target`. Entries never drop below the floor; if everything is
/// at the floor and the total still exceeds the target, balancing stops.
pub fn balance(tasks: &mut [DiaryTask], target: u32, step: u32) {
    if tasks.is_empty() || step == 0 {
        return;
    }

    let mut total: u32 = tasks.iter().map(|task| task.duration).sum();

    while total < target {
        for task in tasks.iter_mut() {
            let add = step.min(target - total);
            task.duration += add;
            total += add;
            if total == target {
                break;
            }
        }
    }

    while total > target {
        let mut changed = false;
        for task in tasks.iter_mut() {
            if total == target {
                break;
            }
            let reducible = task.duration.saturating_sub(MIN_ENTRY_MINUTES);
            let cut = step.min(reducible).min(total - target);
            if cut > 0 {
                task.duration -= cut;
                total -= cut;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn finalize(objective: Option<String>, tasks: Vec<DiaryTask>) -> DiaryDay {
    let total_duration: u32 = tasks.iter().map(|task| task.duration).sum();
    let total_hours = f64::from(total_duration) / 60.0;
    DiaryDay {
        overall_objective: objective,
        tasks,
        total_duration,
        total_hours: (total_hours * 100.0).round() / 100.0,
    }
}

/// Write the diary entry for `date`. A fresh day balances in 5-minute units;
/// merging into a day that already has tasks rebalances in 1-minute units to
/// preserve the original granularity.
pub fn write_day(
    store: &StateStore,
    date: NaiveDate,
    objective: Option<String>,
    chosen: Vec<DiaryTask>,
    target: u32,
) -> Result<DiaryDay> {
    let mut diary: Diary = store.read_or(DIARY_FILE, Diary::new);

    let existing_tasks = diary
        .get(&date)
        .map(|day| day.tasks.clone())
        .unwrap_or_default();

    let day = if existing_tasks.is_empty() {
        let mut tasks = chosen;
        balance(&mut tasks, target, 5);
        finalize(objective, tasks)
    } else {
        let mut tasks = existing_tasks;
        tasks.extend(chosen);
        balance(&mut tasks, target, 1);
        let objective = objective.or_else(|| {
            diary
                .get(&date)
                .and_then(|day| day.overall_objective.clone())
        });
        finalize(objective, tasks)
    };

    diary.insert(date, day.clone());
    store.write(DIARY_FILE, &diary)?;
    Ok(day)
}

/// Drop completion-log entries up to and including `date`.
pub fn purge_log_through(store: &StateStore, date: NaiveDate) -> Result<usize> {
    let mut log: Vec<CompletionEntry> = store.read_or(COMPLETION_LOG_FILE, Vec::new);
    let before = log.len();
    log.retain(|entry| entry.datetime.date() > date);
    let purged = before - log.len();
    if purged > 0 {
        store.write(COMPLETION_LOG_FILE, &log)?;
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn task(summary: &str, duration: u32) -> DiaryTask {
        DiaryTask {
            summary: summary.to_string(),
            duration,
        }
    }

    #[test]
    fn random_target_is_a_five_minute_multiple_in_range() {
        for _ in 0..50 {
            let target = random_target();
            assert!((TARGET_MIN..=TARGET_MAX).contains(&target));
            assert_eq!(target % 5, 0);
        }
    }

    #[test]
    fn balance_grows_entries_in_insertion_order() {
        let mut tasks = vec![task("a", 5), task("b", 5)];
        balance(&mut tasks, 30, 5);

        let total: u32 = tasks.iter().map(|t| t.duration).sum();
        assert_eq!(total, 30);
        // Two full passes: a and b each gained twice.
        assert_eq!(tasks[0].duration, 15);
        assert_eq!(tasks[1].duration, 15);
    }

    #[test]
    fn balance_shrinks_but_never_below_the_floor() {
        let mut tasks = vec![task("a", 60), task("b", 10)];
        balance(&mut tasks, 20, 5);

        let total: u32 = tasks.iter().map(|t| t.duration).sum();
        assert_eq!(total, 20);
        assert!(tasks.iter().all(|t| t.duration >= MIN_ENTRY_MINUTES));
    }

    #[test]
    fn balance_stops_when_everything_is_at_the_floor() {
        let mut tasks = vec![task("a", 5), task("b", 5)];
        balance(&mut tasks, 7, 5);

        let total: u32 = tasks.iter().map(|t| t.duration).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn entries_for_date_filters_and_seeds_duration() {
        let log = vec![
            CompletionEntry {
                id: 1,
                datetime: date(2026, 2, 14).and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
                task_name: "yesterday".into(),
            },
            CompletionEntry {
                id: 2,
                datetime: date(2026, 2, 15).and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
                task_name: "today".into(),
            },
        ];

        let entries = entries_for_date(&log, date(2026, 2, 14));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].summary, "yesterday");
        assert_eq!(entries[0].duration, DEFAULT_ENTRY_MINUTES);
    }

    #[test]
    fn write_day_balances_a_fresh_day_to_target() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());

        let day = write_day(
            &store,
            date(2026, 2, 14),
            Some("ship the report".into()),
            vec![task("a", 5), task("b", 5), task("c", 5)],
            420,
        )
        .expect("write diary day");

        assert_eq!(day.total_duration, 420);
        assert_eq!(day.total_hours, 7.0);
        assert_eq!(day.overall_objective.as_deref(), Some("ship the report"));
        assert_eq!(day.tasks.len(), 3);

        let diary: Diary = store.read_or(DIARY_FILE, Diary::new);
        assert_eq!(diary.get(&date(2026, 2, 14)).unwrap().total_duration, 420);
    }

    #[test]
    fn write_day_merges_with_one_minute_granularity() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());

        write_day(
            &store,
            date(2026, 2, 14),
            Some("first pass".into()),
            vec![task("a", 5)],
            420,
        )
        .expect("first write");

        let merged = write_day(
            &store,
            date(2026, 2, 14),
            None,
            vec![task("b", 5)],
            425,
        )
        .expect("merge write");

        assert_eq!(merged.total_duration, 425);
        assert_eq!(merged.tasks.len(), 2);
        // The objective from the first pass survives the merge.
        assert_eq!(merged.overall_objective.as_deref(), Some("first pass"));
    }

    #[test]
    fn purge_drops_entries_through_the_date() {
        let temp = TempDir::new().expect("temp dir");
        let store = StateStore::open(temp.path());
        let log = vec![
            CompletionEntry {
                id: 1,
                datetime: date(2026, 2, 13).and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
                task_name: "old".into(),
            },
            CompletionEntry {
                id: 2,
                datetime: date(2026, 2, 15).and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
                task_name: "new".into(),
            },
        ];
        store.write(COMPLETION_LOG_FILE, &log).unwrap();

        let purged = purge_log_through(&store, date(2026, 2, 14)).expect("purge log");

        assert_eq!(purged, 1);
        let remaining: Vec<CompletionEntry> = store.read_or(COMPLETION_LOG_FILE, Vec::new);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].task_name, "new");
    }
}
