//! The interactive console: one line in, one command out.
//!
//! The dispatcher is the outermost error boundary. Every handler returns
//! `Result`; failures print and the loop keeps going. Nothing below this
//! layer talks to the terminal except through the values handlers return.

pub mod parser;

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::active::{self, DeviceCheck};
use crate::completion::{self, CompletionOutcome, RecentlyCompleted, TouchOutcome};
use crate::device;
use crate::due::preserve;
use crate::longterm::{self, LongTask, LongView};
use crate::rank::{self, RankedTask};
use crate::settings::Settings;
use crate::statesync::publisher::DEFAULT_FILTER_QUERY;
use crate::store::{
    FILTERS_FILE, GRAFT_FILE, OPTIONS_FILE, REGULAR_HIDE_FILE, StateStore,
    documents::{
        self, DiaryTask, FilterEntry, GraftEntry, Options,
    },
    COMPLETION_LOG_FILE, DIARY_FILE,
};
use crate::timesheet;
use crate::todoist::TodoistClient;
use crate::todoist::model::{DueInput, NewTask, Task, TaskUpdate};

use parser::{COMMAND_LIST, Command, parse};

pub struct App {
    pub client: TodoistClient,
    pub store: StateStore,
    pub settings: Settings,
    pub device_id: String,
    recently: RecentlyCompleted,
    long_project_id: Option<String>,
}

impl App {
    pub fn new(client: TodoistClient, store: StateStore, settings: Settings) -> Self {
        let ttl = Duration::from_secs(settings.recently_completed_ttl_s);
        Self {
            client,
            store,
            settings,
            device_id: device::device_id(),
            recently: RecentlyCompleted::new(ttl),
            long_project_id: None,
        }
    }

    fn tz(&self) -> Tz {
        self.settings.tz()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz()).date_naive()
    }

    fn active_filter_query(&self) -> String {
        let filters: Vec<FilterEntry> = self.store.read_or(FILTERS_FILE, Vec::new);
        documents::active_filter(&filters)
            .map(|entry| entry.filter.clone())
            .unwrap_or_else(|| DEFAULT_FILTER_QUERY.to_string())
    }

    /// Fetch and rank the regular view, dropping hidden and just-completed
    /// tasks.
    fn refresh_regular(&mut self) -> Result<Vec<RankedTask>> {
        let query = self.active_filter_query();
        let tasks = self
            .client
            .list_tasks_by_filter(&query)
            .with_context(|| format!("failed to fetch tasks for filter '{query}'"))?;

        let today = self.today();
        let mut hidden = documents::hidden_regular_ids(
            &self
                .store
                .read_or(REGULAR_HIDE_FILE, documents::RegularHide::new),
            today,
        );
        hidden.extend(self.recently.suppressed_ids());

        Ok(rank::rank(
            tasks,
            &hidden,
            self.tz(),
            self.settings.rollover_time(),
            Utc::now(),
        ))
    }

    fn long_project_id(&mut self) -> Result<String> {
        if let Some(id) = self.long_project_id.clone() {
            return Ok(id);
        }
        let project = self
            .client
            .project_named(&self.settings.long_project)
            .context("failed to list projects")?
            .ok_or_else(|| {
                anyhow!(
                    "long-term project '{}' does not exist on the service",
                    self.settings.long_project
                )
            })?;
        self.long_project_id = Some(project.id.clone());
        Ok(project.id)
    }

    fn long_view(&mut self) -> Result<LongView> {
        let project_id = self.long_project_id()?;
        longterm::load(
            &self.client,
            &self.store,
            &project_id,
            self.tz(),
            Utc::now(),
        )
    }

    fn find_long(&mut self, index: u32) -> Result<Option<LongTask>> {
        Ok(self.long_view()?.find(index).cloned())
    }

    fn require_active(&self) -> Option<crate::store::documents::ActiveTaskRecord> {
        let record = active::get(&self.store);
        if record.is_none() {
            println!("no active task; use 'reset' to pick one");
        }
        record
    }

    /// Point the handle at `ranked[position]`, reporting the new task.
    fn point_at(&mut self, ranked: &[RankedTask], position: usize) -> Result<()> {
        match ranked.get(position) {
            Some(entry) => {
                let due = entry
                    .task
                    .due
                    .as_ref()
                    .and_then(|due| due.string.clone().or_else(|| {
                        due.date.map(|date| date.to_string())
                    }));
                active::set(&self.store, &entry.task.id, &entry.task.content, due)?;
                println!("active: {}", describe_ranked(entry));
            }
            None => {
                active::clear(&self.store)?;
                println!("nothing to work on; the filter is empty");
            }
        }
        Ok(())
    }

    /// All-done transition: zero due regular tasks, zero showing long tasks,
    /// celebrated at most once per day.
    fn maybe_celebrate(&mut self) -> Result<()> {
        let regular = self.refresh_regular()?;
        if !regular.is_empty() {
            return Ok(());
        }
        let view = self.long_view()?;
        if view.showing_count() > 0 {
            return Ok(());
        }
        if completion::fire_celebration_once(&self.store, self.today())? {
            print_celebration();
        }
        Ok(())
    }

    pub fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Done => self.cmd_done(),
            Command::DoneLong(index) => self.cmd_done_long(index),
            Command::Skip => self.cmd_skip(),
            Command::Time(text) => self.cmd_time(&text),
            Command::Due(text) => self.cmd_due(&text),
            Command::TimeLong(index, text) => self.cmd_time_long(index, &text),
            Command::DueLong(index, text) => self.cmd_due_long(index, &text),
            Command::Rename(name) => self.cmd_rename(&name),
            Command::RenameLong(index, name) => self.cmd_rename_long(index, &name),
            Command::Priority(priority) => self.cmd_priority(priority),
            Command::PriorityLong(index, priority) => self.cmd_priority_long(index, priority),
            Command::Delete => self.cmd_delete(),
            Command::DeleteLong(index) => self.cmd_delete_long(index),
            Command::AddTask(text) => self.cmd_add_task(&text),
            Command::AddLong(text) => self.cmd_add_long(&text),
            Command::All => self.cmd_all(),
            Command::ShowLong => self.cmd_show_long(),
            Command::Flip => self.cmd_flip(),
            Command::Graft => self.cmd_graft(),
            Command::GraftSlot(slot) => self.cmd_graft_slot(slot),
            Command::GraftDelete => self.cmd_graft_delete(),
            Command::Hide => self.cmd_hide(),
            Command::HideLong(index) => self.cmd_hide_long(index),
            Command::TouchLong(index) => self.touch_long(index),
            Command::Timesheet => self.cmd_timesheet(),
            Command::Diary => self.cmd_diary(),
            Command::Replay => self.cmd_replay(),
            Command::Reset => self.cmd_reset(),
            Command::Fresh => self.cmd_fresh(),
            Command::Clear => {
                print!("\x1b[2J\x1b[H");
                io::stdout().flush().ok();
                Ok(())
            }
            Command::Commands => {
                for line in COMMAND_LIST {
                    println!("  {line}");
                }
                Ok(())
            }
            Command::Quit => Ok(()),
        }
    }

    fn cmd_done(&mut self) -> Result<()> {
        let outcome =
            completion::complete_active(&self.client, &self.store, self.tz(), &mut self.recently)?;
        match outcome {
            CompletionOutcome::NoActiveTask => {
                println!("no active task; use 'reset' to pick one");
                return Ok(());
            }
            CompletionOutcome::Completed {
                task_name,
                total_today,
            } => {
                println!("done: {task_name} ({total_today} today)");
            }
            CompletionOutcome::CloseTimedOut { task_name } => {
                println!(
                    "the close for '{task_name}' timed out; the server probably saw it, so nothing was retried"
                );
                return Ok(());
            }
            CompletionOutcome::TaskVanished { task_name } => {
                println!("'{task_name}' no longer exists on the service; cleared the handle");
                return Ok(());
            }
        }
        self.maybe_celebrate()?;
        let ranked = self.refresh_regular()?;
        self.point_at(&ranked, 0)
    }

    fn cmd_done_long(&mut self, index: u32) -> Result<()> {
        let Some(long) = self.find_long(index)? else {
            println!("no long task with index [{index}]");
            return Ok(());
        };
        let total = completion::complete_long(
            &self.client,
            &self.store,
            self.tz(),
            &self.device_id,
            &long,
            &mut self.recently,
        )?;
        println!("done long [{index}]: {} ({total} today)", long.name());
        self.maybe_celebrate()
    }

    fn cmd_skip(&mut self) -> Result<()> {
        let ranked = self.refresh_regular()?;
        let next = match active::get(&self.store) {
            Some(record) => ranked
                .iter()
                .position(|entry| entry.task.id == record.task_id)
                .map(|position| (position + 1) % ranked.len().max(1))
                .unwrap_or(0),
            None => 0,
        };
        self.point_at(&ranked, next)
    }

    fn cmd_time(&mut self, text: &str) -> Result<()> {
        let Some(record) = self.require_active() else {
            return Ok(());
        };
        let task = self.client.get_task(&record.task_id)?;
        if crate::due::recurrence::is_recurring(task.due.as_ref()) {
            warn!(task_id = %task.id, "raw due text replaces the recurrence rule");
            println!("note: this replaces the recurrence rule; 'due' preserves it");
        }
        let updated = self
            .client
            .update_task(&task.id, &TaskUpdate::due(&DueInput::Text(text.to_string())))?;
        self.restamp_active(&updated)?;
        println!("due set: {}", describe_due(&updated));
        Ok(())
    }

    fn cmd_due(&mut self, text: &str) -> Result<()> {
        let Some(record) = self.require_active() else {
            return Ok(());
        };
        let task = self.client.get_task(&record.task_id)?;
        let change =
            preserve::move_due_date(&self.client, &task, text, self.tz(), self.today())?;
        if change.effective_date != change.target_date {
            println!(
                "moved; recurrence settled on {} instead of {}",
                change.effective_date, change.target_date
            );
        } else {
            println!("moved to {}", change.effective_date);
        }
        self.restamp_active(&change.task)
    }

    fn cmd_time_long(&mut self, index: u32, text: &str) -> Result<()> {
        let Some(long) = self.find_long(index)? else {
            println!("no long task with index [{index}]");
            return Ok(());
        };
        let updated = longterm::reschedule(&self.client, &long, text)?;
        println!("[{index}] due set: {}", describe_due(&updated));
        Ok(())
    }

    fn cmd_due_long(&mut self, index: u32, text: &str) -> Result<()> {
        let Some(long) = self.find_long(index)? else {
            println!("no long task with index [{index}]");
            return Ok(());
        };
        let change =
            preserve::move_due_date(&self.client, &long.task, text, self.tz(), self.today())?;
        if change.effective_date != change.target_date {
            println!(
                "[{index}] moved; recurrence settled on {} instead of {}",
                change.effective_date, change.target_date
            );
        } else {
            println!("[{index}] moved to {}", change.effective_date);
        }
        Ok(())
    }

    fn cmd_rename(&mut self, name: &str) -> Result<()> {
        let Some(record) = self.require_active() else {
            return Ok(());
        };
        let updated = self
            .client
            .update_task(&record.task_id, &TaskUpdate::content(name))?;
        self.restamp_active(&updated)?;
        println!("renamed: {}", updated.content);
        Ok(())
    }

    fn cmd_rename_long(&mut self, index: u32, name: &str) -> Result<()> {
        let Some(long) = self.find_long(index)? else {
            println!("no long task with index [{index}]");
            return Ok(());
        };
        let updated = longterm::rename(&self.client, &long, name)?;
        println!("renamed: {}", updated.content);
        Ok(())
    }

    fn cmd_priority(&mut self, priority: u8) -> Result<()> {
        let Some(record) = self.require_active() else {
            return Ok(());
        };
        self.client
            .update_task(&record.task_id, &TaskUpdate::priority(priority))?;
        println!("priority set to {priority}");
        Ok(())
    }

    fn cmd_priority_long(&mut self, index: u32, priority: u8) -> Result<()> {
        let Some(long) = self.find_long(index)? else {
            println!("no long task with index [{index}]");
            return Ok(());
        };
        longterm::change_priority(&self.client, &long, priority)?;
        println!("[{index}] priority set to {priority}");
        Ok(())
    }

    fn cmd_delete(&mut self) -> Result<()> {
        let Some(record) = self.require_active() else {
            return Ok(());
        };
        self.client.delete_task(&record.task_id)?;
        active::clear(&self.store)?;
        println!("deleted: {}", record.task_name);
        Ok(())
    }

    fn cmd_delete_long(&mut self, index: u32) -> Result<()> {
        let Some(long) = self.find_long(index)? else {
            println!("no long task with index [{index}]");
            return Ok(());
        };
        longterm::delete(&self.client, &long)?;
        println!("deleted long [{index}]: {}", long.name());
        Ok(())
    }

    fn cmd_add_task(&mut self, text: &str) -> Result<()> {
        let created = self.client.add_task(&NewTask::new(text))?;
        println!("added: {}", created.content);
        Ok(())
    }

    fn cmd_add_long(&mut self, text: &str) -> Result<()> {
        let project_id = self.long_project_id()?;
        let long = longterm::add(&self.client, &project_id, text)?;
        println!("added long [{}]: {}", long.index, long.name());
        Ok(())
    }

    fn cmd_all(&mut self) -> Result<()> {
        let ranked = self.refresh_regular()?;
        if ranked.is_empty() {
            println!("nothing in the current filter");
            return Ok(());
        }
        for (position, entry) in ranked.iter().enumerate() {
            println!("{:>3}. {}", position + 1, describe_ranked(entry));
        }
        Ok(())
    }

    fn cmd_show_long(&mut self) -> Result<()> {
        let view = self.long_view()?;
        let normalized = longterm::normalize_rules(&self.client, &view)?;
        if normalized > 0 {
            println!("normalized {normalized} recurrence rule(s) to the strict form");
        }

        if !view.duplicate_indices.is_empty() {
            println!("warning: duplicate indices {:?}; fix manually", view.duplicate_indices);
        }
        print_long_section("due (recurring)", &view.due_recurring);
        print_long_section("due (one-shot)", &view.due_oneshot);
        print_long_section("not yet due", &view.not_due);
        println!("showing today: {}", view.showing_count());
        Ok(())
    }

    fn cmd_flip(&mut self) -> Result<()> {
        let mut filters: Vec<FilterEntry> = self.store.read_or(FILTERS_FILE, Vec::new);
        if filters.is_empty() {
            println!("no saved filters; using the default '{DEFAULT_FILTER_QUERY}'");
            return Ok(());
        }
        let next = documents::rotate_filter(&mut filters)
            .map(|entry| entry.filter.clone())
            .unwrap_or_default();
        self.store.write(FILTERS_FILE, &filters)?;
        println!("active filter: {next}");
        let ranked = self.refresh_regular()?;
        self.point_at(&ranked, 0)
    }

    fn cmd_graft(&mut self) -> Result<()> {
        let grafted: Vec<GraftEntry> = self.store.read_or(GRAFT_FILE, Vec::new);
        if !grafted.is_empty() {
            println!("grafted:");
            for entry in &grafted {
                println!("  {}. {}", entry.index, entry.task_name);
            }
            return Ok(());
        }

        let ranked = self.refresh_regular()?;
        if ranked.is_empty() {
            println!("nothing to graft; the filter is empty");
            return Ok(());
        }
        for (position, entry) in ranked.iter().take(10).enumerate() {
            println!("{:>3}. {}", position + 1, describe_ranked(entry));
        }
        let Some(line) = prompt_line("pick up to 3 (e.g. '1 3 4'): ") else {
            return Ok(());
        };

        let mut grafted = Vec::new();
        for (slot, token) in line.split_whitespace().take(3).enumerate() {
            let Ok(position) = token.parse::<usize>() else {
                println!("'{token}' is not a number; aborting graft");
                return Ok(());
            };
            let Some(entry) = position.checked_sub(1).and_then(|p| ranked.get(p)) else {
                println!("{position} is out of range; aborting graft");
                return Ok(());
            };
            grafted.push(GraftEntry {
                task_id: entry.task.id.clone(),
                task_name: entry.task.content.clone(),
                index: (slot + 1) as u8,
            });
        }
        if grafted.is_empty() {
            println!("nothing picked");
            return Ok(());
        }
        self.store.write(GRAFT_FILE, &grafted)?;
        println!("grafted {} task(s)", grafted.len());
        Ok(())
    }

    fn cmd_graft_slot(&mut self, slot: u8) -> Result<()> {
        let mut grafted: Vec<GraftEntry> = self.store.read_or(GRAFT_FILE, Vec::new);
        let Some(position) = grafted.iter().position(|entry| entry.index == slot) else {
            println!("no grafted task in slot {slot}");
            return Ok(());
        };
        let entry = grafted.remove(position);

        self.client
            .close_task(&entry.task_id)
            .with_context(|| format!("failed to close grafted task '{}'", entry.task_name))?;
        self.recently.mark(&entry.task_id);
        completion_log(&self.store, &entry.task_name, self.tz())?;
        println!("done: {}", entry.task_name);

        if grafted.is_empty() {
            self.store.delete(GRAFT_FILE)?;
            print_celebration();
        } else {
            self.store.write(GRAFT_FILE, &grafted)?;
        }
        Ok(())
    }

    fn cmd_graft_delete(&mut self) -> Result<()> {
        self.store.delete(GRAFT_FILE)?;
        println!("grafted set cleared");
        Ok(())
    }

    fn cmd_hide(&mut self) -> Result<()> {
        let Some(record) = self.require_active() else {
            return Ok(());
        };
        let today = self.today();
        let mut hide = self
            .store
            .read_or(REGULAR_HIDE_FILE, documents::RegularHide::new);
        documents::hide_regular_today(&mut hide, today, &record.task_id);
        self.store.write(REGULAR_HIDE_FILE, &hide)?;
        println!("hidden for today: {}", record.task_name);

        let ranked = self.refresh_regular()?;
        self.point_at(&ranked, 0)
    }

    fn cmd_hide_long(&mut self, index: u32) -> Result<()> {
        longterm::hide_today(&self.store, index, self.today())?;
        println!("long [{index}] hidden for today");
        Ok(())
    }

    fn cmd_timesheet(&mut self) -> Result<()> {
        let options: Options = self.store.read_or(OPTIONS_FILE, Options::default);
        let yesterday = self.today() - chrono::Duration::days(1);

        let date = if options.enable_diary_prompts {
            match prompt_line(&format!("date [{yesterday}]: ")) {
                Some(line) if !line.is_empty() => NaiveDate::parse_from_str(&line, "%Y-%m-%d")
                    .map_err(|_| anyhow!("dates look like 2026-02-14"))?,
                _ => yesterday,
            }
        } else {
            yesterday
        };

        let log: Vec<crate::store::documents::CompletionEntry> =
            self.store.read_or(COMPLETION_LOG_FILE, Vec::new);
        let mut entries = timesheet::entries_for_date(&log, date);
        if entries.is_empty() {
            println!("no completions logged on {date}");
        } else {
            println!("completions on {date}:");
            for entry in &entries {
                println!("  - {}", entry.summary);
            }
        }

        let mut objective = None;
        if options.enable_diary_prompts {
            while let Some(line) = prompt_line("extra summary (empty to stop): ") {
                if line.is_empty() {
                    break;
                }
                entries.push(DiaryTask {
                    summary: line,
                    duration: timesheet::DEFAULT_ENTRY_MINUTES,
                });
            }
            objective = prompt_line("overall objective (optional): ")
                .filter(|line| !line.is_empty());
        }

        if entries.is_empty() {
            println!("nothing to write for {date}");
            return Ok(());
        }

        let target = timesheet::random_target();
        let day = timesheet::write_day(&self.store, date, objective, entries, target)?;
        println!(
            "diary for {date}: {} task(s), {} min ({} h)",
            day.tasks.len(),
            day.total_duration,
            day.total_hours
        );

        if options.enable_diary_prompts
            && prompt_line("purge the completion log through this date? [y/N]: ")
                .is_some_and(|line| line.eq_ignore_ascii_case("y"))
        {
            let purged = timesheet::purge_log_through(&self.store, date)?;
            println!("purged {purged} log entr(ies)");
        }
        Ok(())
    }

    fn cmd_diary(&mut self) -> Result<()> {
        let diary: crate::store::documents::Diary = self.store.read_or(DIARY_FILE, Default::default);
        if diary.is_empty() {
            println!("the diary is empty");
            return Ok(());
        }
        for (date, day) in diary.iter().rev().take(7) {
            println!("{date}: {} min ({} h)", day.total_duration, day.total_hours);
            if let Some(objective) = &day.overall_objective {
                println!("  objective: {objective}");
            }
            for task in &day.tasks {
                println!("  - {} ({} min)", task.summary, task.duration);
            }
        }
        Ok(())
    }

    fn cmd_replay(&mut self) -> Result<()> {
        let Some(record) = self.require_active() else {
            return Ok(());
        };
        if let DeviceCheck::Warning {
            device_id,
            task_name,
            last_updated,
        } = active::verify_device(&record)
        {
            println!(
                "note: '{task_name}' was last updated by another device ({device_id}) at {last_updated}"
            );
        }
        match &record.task_due {
            Some(due) => println!("active: {} (due {due})", record.task_name),
            None => println!("active: {}", record.task_name),
        }
        Ok(())
    }

    fn cmd_reset(&mut self) -> Result<()> {
        let ranked = self.refresh_regular()?;
        self.point_at(&ranked, 0)
    }

    fn cmd_fresh(&mut self) -> Result<()> {
        active::clear(&self.store)?;
        println!("cleared the active task");
        Ok(())
    }

    /// Keep the handle's name/due in step with a task we just changed.
    fn restamp_active(&mut self, task: &Task) -> Result<()> {
        let due = task
            .due
            .as_ref()
            .and_then(|due| due.string.clone().or_else(|| due.date.map(|d| d.to_string())));
        active::set(&self.store, &task.id, &task.content, due)?;
        Ok(())
    }

    /// Advance a long task without finishing it for good.
    pub fn touch_long(&mut self, index: u32) -> Result<()> {
        let Some(long) = self.find_long(index)? else {
            println!("no long task with index [{index}]");
            return Ok(());
        };
        match completion::touch_long(
            &self.client,
            &self.store,
            self.tz(),
            &self.device_id,
            &long,
            Utc::now(),
        )? {
            TouchOutcome::AdvancedRecurring => {
                println!("[{index}] closed; the service schedules the next occurrence");
            }
            TouchOutcome::PushedToTomorrow { new_due } => {
                println!("[{index}] logged and pushed to {new_due}");
            }
        }
        Ok(())
    }
}

fn completion_log(store: &StateStore, task_name: &str, tz: Tz) -> Result<()> {
    let now_local = Utc::now().with_timezone(&tz).naive_local();
    let mut log: Vec<crate::store::documents::CompletionEntry> =
        store.read_or(COMPLETION_LOG_FILE, Vec::new);
    documents::append_completion(&mut log, task_name, now_local);
    store.write(COMPLETION_LOG_FILE, &log)
}

fn describe_due(task: &Task) -> String {
    match task.due.as_ref() {
        Some(due) => due
            .string
            .clone()
            .or_else(|| due.datetime.clone())
            .or_else(|| due.date.map(|date| date.to_string()))
            .unwrap_or_else(|| "unset".to_string()),
        None => "unset".to_string(),
    }
}

fn describe_ranked(entry: &RankedTask) -> String {
    let due = match (entry.has_time, entry.due_date) {
        (true, _) => format!(" (due {})", entry.due_utc.format("%Y-%m-%d %H:%M UTC")),
        (false, Some(date)) => format!(" (due {date})"),
        (false, None) => String::new(),
    };
    format!("p{} {}{due}", entry.task.priority, entry.task.content)
}

fn print_long_section(title: &str, tasks: &[LongTask]) {
    if tasks.is_empty() {
        return;
    }
    println!("{title}:");
    for long in tasks {
        println!("  [{}] p{} {}", long.index, long.task.priority, long.name());
    }
}

fn print_celebration() {
    println!();
    println!("  all done for today: nothing due anywhere. go outside.");
    println!();
}

fn prompt_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    io::stdout().flush().ok()?;
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim().to_string()),
        Err(_) => None,
    }
}

/// Run the interactive loop until EOF or `quit`.
pub fn run(app: &mut App) -> Result<()> {
    if let Some(record) = active::get(&app.store) {
        if let DeviceCheck::Warning {
            device_id,
            task_name,
            last_updated,
        } = active::verify_device(&record)
        {
            println!(
                "note: '{task_name}' was last updated by another device ({device_id}) at {last_updated}"
            );
        }
        println!("active: {}", record.task_name);
    } else {
        println!("no active task; 'reset' picks the top of the filter");
    }

    loop {
        let Some(line) = prompt_line("> ") else {
            break;
        };
        if line.is_empty() {
            continue;
        }
        match parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => {
                if let Err(error) = app.dispatch(command) {
                    println!("error: {error:#}");
                }
            }
            Err(message) if message.is_empty() => {}
            Err(message) => println!("{message}"),
        }
    }
    Ok(())
}
