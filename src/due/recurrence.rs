//! Recurrence-rule vocabulary and normalization.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::todoist::model::Due;

/// Substrings that mark a due string as recurring. `every day until` is a
/// bounded range, not a recurrence.
const RECURRENCE_MARKERS: [&str; 6] = [
    "every ", "every!", "daily", "weekly", "monthly", "yearly",
];
const BOUNDED_RANGE_MARKER: &str = "every day until";

static STARTING_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\bstarting \d{4}-\d{2}-\d{2}\b").expect("valid starting-clause pattern")
});

/// Whether a due counts as recurring: the service flag wins, else the rule
/// text is matched against the recurrence vocabulary.
pub fn is_recurring(due: Option<&Due>) -> bool {
    let Some(due) = due else {
        return false;
    };
    if due.is_recurring {
        return true;
    }

    let Some(text) = due.string.as_deref() else {
        return false;
    };
    let lowered = text.to_lowercase();
    if lowered.contains(BOUNDED_RANGE_MARKER) {
        return false;
    }
    RECURRENCE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Remove every `starting YYYY-MM-DD` anchor from a rule string.
pub fn strip_starting_clauses(rule: &str) -> String {
    let stripped = STARTING_CLAUSE.replace_all(rule, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a rule to exactly one `starting <date>` anchor.
pub fn with_starting(rule: &str, date: NaiveDate) -> String {
    let base = strip_starting_clauses(rule);
    format!("{base} starting {}", date.format("%Y-%m-%d"))
}

/// Rewrite `every <rule>` as `every! <rule>` so a completion does not slide
/// the next occurrence relative to the completion date. Returns `None` when
/// the rule is already strict or is not an `every` rule at all.
pub fn strict_rule(rule: &str) -> Option<String> {
    let trimmed = rule.trim_start();
    let lowered = trimmed.to_lowercase();
    if lowered.contains(BOUNDED_RANGE_MARKER) {
        return None;
    }
    if !lowered.starts_with("every ") || lowered.starts_with("every!") {
        return None;
    }
    Some(format!("every!{}", &trimmed["every".len()..]))
}
