//! Long-term task index manager.
//!
//! Tasks in the long-term project carry a synthetic `[N] ` content prefix so
//! the console can address them with small stable numbers even though the
//! service's own IDs are opaque. The manager repairs missing indices,
//! classifies what is due, and keeps recurrence rules in their strict form.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;
use tracing::{info, warn};

use crate::due::recurrence;
use crate::store::{LONG_HIDE_FILE, StateStore, documents::LongHide};
use crate::todoist::TodoistClient;
use crate::todoist::model::{DueInput, NewTask, Task, TaskUpdate};
use crate::types::localize;

static INDEX_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d+)\]\s*(.*)$").expect("valid index-prefix pattern"));

/// A long-term task with its parsed synthetic index.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTask {
    pub index: u32,
    pub task: Task,
}

impl LongTask {
    /// Content with the `[N] ` prefix stripped.
    pub fn name(&self) -> &str {
        parse_index(&self.task.content)
            .map(|(_, rest)| rest)
            .unwrap_or(&self.task.content)
    }

    pub fn is_recurring(&self) -> bool {
        recurrence::is_recurring(self.task.due.as_ref())
    }
}

/// Categorized snapshot of the long-term project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LongView {
    pub due_recurring: Vec<LongTask>,
    pub due_oneshot: Vec<LongTask>,
    pub not_due: Vec<LongTask>,
    /// Due tasks minus today's hidden indices, recurring first.
    pub showing: Vec<LongTask>,
    pub duplicate_indices: Vec<u32>,
}

impl LongView {
    pub fn find(&self, index: u32) -> Option<&LongTask> {
        self.due_recurring
            .iter()
            .chain(&self.due_oneshot)
            .chain(&self.not_due)
            .find(|long| long.index == index)
    }

    pub fn showing_count(&self) -> usize {
        self.showing.len()
    }
}

pub fn parse_index(content: &str) -> Option<(u32, &str)> {
    let captures = INDEX_PREFIX.captures(content)?;
    let index = captures.get(1)?.as_str().parse().ok()?;
    let rest = captures.get(2).map(|m| m.as_str()).unwrap_or("");
    Some((index, rest))
}

/// A content rewrite needed to give an unindexed task its `[N] ` prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexAssignment {
    pub task_id: String,
    pub index: u32,
    pub new_content: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexPlan {
    pub assignments: Vec<IndexAssignment>,
    pub duplicate_indices: Vec<u32>,
}

/// Work out which tasks need an index. Duplicates are reported, never
/// rewritten; fixing those is a manual decision.
pub fn plan_indices(tasks: &[Task]) -> IndexPlan {
    let mut used = BTreeSet::new();
    let mut duplicates = Vec::new();
    for task in tasks {
        if let Some((index, _)) = parse_index(&task.content) {
            if !used.insert(index) {
                duplicates.push(index);
            }
        }
    }

    let mut assignments = Vec::new();
    for task in tasks {
        if parse_index(&task.content).is_some() {
            continue;
        }
        let index = smallest_free_index(&used);
        used.insert(index);
        assignments.push(IndexAssignment {
            task_id: task.id.clone(),
            index,
            new_content: format!("[{index}] {}", task.content),
        });
    }

    IndexPlan {
        assignments,
        duplicate_indices: duplicates,
    }
}

fn smallest_free_index(used: &BTreeSet<u32>) -> u32 {
    let mut candidate = 0;
    for taken in used {
        if *taken == candidate {
            candidate += 1;
        } else if *taken > candidate {
            break;
        }
    }
    candidate
}

/// Ordering instant for a long task: timed dues localize, date-only dues at
/// or before today collapse to "now", future date-only dues start their day.
fn due_sort_key(task: &Task, tz: Tz, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    let Some(due) = task.due.as_ref() else {
        return now;
    };

    if due.has_time() {
        return due.datetime_utc(tz).unwrap_or(now);
    }
    match due.date {
        Some(date) if date <= today => now,
        Some(date) => localize(tz, date.and_hms_opt(0, 0, 0).expect("midnight exists"))
            .with_timezone(&Utc),
        None => now,
    }
}

fn is_due(task: &Task, tz: Tz, today: NaiveDate) -> bool {
    match task.due.as_ref().and_then(|due| due.calendar_date(tz)) {
        Some(date) => date <= today,
        // A long task with no due date always demands attention.
        None => true,
    }
}

/// Build the categorized view from indexed tasks.
pub fn build_view(
    long_tasks: Vec<LongTask>,
    hidden_indices: &[u32],
    duplicate_indices: Vec<u32>,
    tz: Tz,
    now: DateTime<Utc>,
) -> LongView {
    let today = now.with_timezone(&tz).date_naive();

    let mut due_recurring = Vec::new();
    let mut due_oneshot = Vec::new();
    let mut not_due = Vec::new();

    for long in long_tasks {
        if !is_due(&long.task, tz, today) {
            not_due.push(long);
        } else if long.is_recurring() {
            due_recurring.push(long);
        } else {
            due_oneshot.push(long);
        }
    }

    let sort = |list: &mut Vec<LongTask>| {
        list.sort_by_key(|long| {
            (
                std::cmp::Reverse(long.task.priority),
                due_sort_key(&long.task, tz, now),
                long.index,
            )
        });
    };
    sort(&mut due_recurring);
    sort(&mut due_oneshot);
    sort(&mut not_due);

    let showing = due_recurring
        .iter()
        .chain(&due_oneshot)
        .filter(|long| !hidden_indices.contains(&long.index))
        .cloned()
        .collect();

    LongView {
        due_recurring,
        due_oneshot,
        not_due,
        showing,
        duplicate_indices,
    }
}

/// Fetch the project, repair indices on the service, and categorize.
pub fn load(
    client: &TodoistClient,
    store: &StateStore,
    project_id: &str,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<LongView> {
    let mut tasks = client
        .list_tasks_by_project(project_id)
        .context("failed to list long-term project tasks")?;

    let plan = plan_indices(&tasks);
    for duplicate in &plan.duplicate_indices {
        warn!(index = duplicate, "duplicate long-task index; fix manually");
    }
    for assignment in &plan.assignments {
        client
            .update_task(
                &assignment.task_id,
                &TaskUpdate::content(&assignment.new_content),
            )
            .with_context(|| format!("failed to assign index [{}]", assignment.index))?;
        info!(task_id = %assignment.task_id, index = assignment.index, "assigned long-task index");
        if let Some(task) = tasks.iter_mut().find(|task| task.id == assignment.task_id) {
            task.content = assignment.new_content.clone();
        }
    }

    let long_tasks: Vec<LongTask> = tasks
        .into_iter()
        .filter_map(|task| {
            let index = parse_index(&task.content).map(|(index, _)| index)?;
            Some(LongTask { index, task })
        })
        .collect();

    let today = now.with_timezone(&tz).date_naive();
    let hide = store.read_or(LONG_HIDE_FILE, || LongHide::empty(today));
    let hidden = hide.hidden_today(today).to_vec();

    Ok(build_view(
        long_tasks,
        &hidden,
        plan.duplicate_indices,
        tz,
        now,
    ))
}

/// Add a task to the long-term project under the next free index.
pub fn add(
    client: &TodoistClient,
    project_id: &str,
    content: &str,
) -> Result<LongTask> {
    let tasks = client
        .list_tasks_by_project(project_id)
        .context("failed to list long-term project tasks")?;

    let used: BTreeSet<u32> = tasks
        .iter()
        .filter_map(|task| parse_index(&task.content).map(|(index, _)| index))
        .collect();
    let index = smallest_free_index(&used);

    let created = client
        .add_task(&NewTask::new(format!("[{index}] {content}")).in_project(project_id))
        .context("failed to add long-term task")?;

    Ok(LongTask {
        index,
        task: created,
    })
}

/// Rename, preserving the `[N] ` prefix.
pub fn rename(client: &TodoistClient, long: &LongTask, new_name: &str) -> Result<Task> {
    let content = format!("[{}] {}", long.index, new_name);
    client
        .update_task(&long.task.id, &TaskUpdate::content(content))
        .with_context(|| format!("failed to rename long task [{}]", long.index))
}

pub fn delete(client: &TodoistClient, long: &LongTask) -> Result<()> {
    client
        .delete_task(&long.task.id)
        .with_context(|| format!("failed to delete long task [{}]", long.index))
}

pub fn change_priority(client: &TodoistClient, long: &LongTask, priority: u8) -> Result<Task> {
    client
        .update_task(
            &long.task.id,
            &TaskUpdate::priority(crate::types::clamp_priority(priority)),
        )
        .with_context(|| format!("failed to set priority on long task [{}]", long.index))
}

/// Hand the due text straight to the service parser. Recurring tasks keep
/// working, but the rule is replaced wholesale, hence the warning.
pub fn reschedule(client: &TodoistClient, long: &LongTask, due_text: &str) -> Result<Task> {
    if long.is_recurring() {
        warn!(
            index = long.index,
            "rescheduling a recurring long task replaces its rule; use a due move to preserve it"
        );
    }
    client
        .update_task(
            &long.task.id,
            &TaskUpdate::due(&DueInput::Text(due_text.to_string())),
        )
        .with_context(|| format!("failed to reschedule long task [{}]", long.index))
}

/// Record `index` as hidden for the rest of today.
pub fn hide_today(store: &StateStore, index: u32, today: NaiveDate) -> Result<()> {
    let mut hide = store.read_or(LONG_HIDE_FILE, || LongHide::empty(today));
    hide.hide_today(today, index);
    store.write(LONG_HIDE_FILE, &hide)
}

/// Planned rule rewrite from `every` to `every!`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRewrite {
    pub task_id: String,
    pub index: u32,
    pub new_rule: String,
}

/// Plan strict-rule rewrites so completions stop sliding schedules.
pub fn plan_rule_normalizations(long_tasks: &[LongTask]) -> Vec<RuleRewrite> {
    long_tasks
        .iter()
        .filter(|long| long.is_recurring())
        .filter_map(|long| {
            let rule = long.task.due_string()?;
            recurrence::strict_rule(rule).map(|new_rule| RuleRewrite {
                task_id: long.task.id.clone(),
                index: long.index,
                new_rule,
            })
        })
        .collect()
}

/// Apply planned rule rewrites; returns how many were rewritten.
pub fn normalize_rules(client: &TodoistClient, view: &LongView) -> Result<usize> {
    let all: Vec<LongTask> = view
        .due_recurring
        .iter()
        .chain(&view.due_oneshot)
        .chain(&view.not_due)
        .cloned()
        .collect();

    let rewrites = plan_rule_normalizations(&all);
    for rewrite in &rewrites {
        client
            .update_task(
                &rewrite.task_id,
                &TaskUpdate::due(&DueInput::Text(rewrite.new_rule.clone())),
            )
            .with_context(|| {
                format!("failed to normalize rule on long task [{}]", rewrite.index)
            })?;
        info!(index = rewrite.index, rule = %rewrite.new_rule, "normalized recurrence rule");
    }
    Ok(rewrites.len())
}
