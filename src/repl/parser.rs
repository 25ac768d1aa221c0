//! Console command grammar.
//!
//! Command words are case-insensitive; free-text arguments (due text, names)
//! keep their case.

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Done,
    DoneLong(u32),
    Skip,
    /// Raw due text handed to the service parser (replaces any rule).
    Time(String),
    /// Due move that preserves time-of-day and recurrence.
    Due(String),
    TimeLong(u32, String),
    DueLong(u32, String),
    Rename(String),
    RenameLong(u32, String),
    Priority(u8),
    PriorityLong(u32, u8),
    Delete,
    DeleteLong(u32),
    AddTask(String),
    AddLong(String),
    All,
    ShowLong,
    Flip,
    Graft,
    GraftSlot(u8),
    GraftDelete,
    Hide,
    HideLong(u32),
    TouchLong(u32),
    Timesheet,
    Diary,
    Replay,
    Reset,
    Fresh,
    Clear,
    Commands,
    Quit,
}

/// Parse one console line. Errors are user-facing messages.
pub fn parse(line: &str) -> Result<Command, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(String::new());
    }

    let lowered = trimmed.to_lowercase();
    let mut words = lowered.split_whitespace();
    let head = words.next().unwrap_or_default();
    let second = words.next();

    // Free-text tail of the original line after `n` space-separated words.
    let tail = |n: usize| -> String {
        trimmed
            .split_whitespace()
            .skip(n)
            .collect::<Vec<_>>()
            .join(" ")
    };

    match (head, second) {
        ("done", None) => Ok(Command::Done),
        ("done", Some("long")) => Ok(Command::DoneLong(index_arg(&lowered, 2)?)),
        ("skip", None) => Ok(Command::Skip),
        ("time", Some("long")) => {
            let index = index_arg(&lowered, 2)?;
            let due = require_text(tail(3), "time long <N> <due>")?;
            Ok(Command::TimeLong(index, due))
        }
        ("time", Some(_)) => Ok(Command::Time(tail(1))),
        ("due", Some("long")) => {
            let index = index_arg(&lowered, 2)?;
            let due = require_text(tail(3), "due long <N> <due>")?;
            Ok(Command::DueLong(index, due))
        }
        ("due", Some(_)) => Ok(Command::Due(tail(1))),
        ("rename", Some("long")) => {
            let index = index_arg(&lowered, 2)?;
            let name = require_text(tail(3), "rename long <N> <new name>")?;
            Ok(Command::RenameLong(index, name))
        }
        ("rename", Some(_)) => Ok(Command::Rename(tail(1))),
        ("priority", Some("long")) => {
            let index = index_arg(&lowered, 2)?;
            let priority = priority_arg(&lowered, 3)?;
            Ok(Command::PriorityLong(index, priority))
        }
        ("priority", Some(_)) => Ok(Command::Priority(priority_arg(&lowered, 1)?)),
        ("delete", None) => Ok(Command::Delete),
        ("delete", Some("long")) => Ok(Command::DeleteLong(index_arg(&lowered, 2)?)),
        ("add", Some("task")) => {
            let text = require_text(tail(2), "add task <text>")?;
            Ok(Command::AddTask(text))
        }
        ("add", Some("long")) => {
            let text = require_text(tail(2), "add long <text>")?;
            Ok(Command::AddLong(text))
        }
        ("all", None) => Ok(Command::All),
        ("show", Some("long")) => Ok(Command::ShowLong),
        ("flip", None) => Ok(Command::Flip),
        ("graft", None) => Ok(Command::Graft),
        ("graft", Some("delete")) => Ok(Command::GraftDelete),
        ("graft", Some(slot)) => {
            let slot: u8 = slot
                .parse()
                .map_err(|_| "graft takes a slot number 1-3".to_string())?;
            if !(1..=3).contains(&slot) {
                return Err("graft takes a slot number 1-3".to_string());
            }
            Ok(Command::GraftSlot(slot))
        }
        ("hide", None) => Ok(Command::Hide),
        ("hide", Some("long")) => Ok(Command::HideLong(index_arg(&lowered, 2)?)),
        ("touch", Some("long")) => Ok(Command::TouchLong(index_arg(&lowered, 2)?)),
        ("timesheet", None) => Ok(Command::Timesheet),
        ("diary", None) => Ok(Command::Diary),
        ("replay", None) => Ok(Command::Replay),
        ("reset", None) => Ok(Command::Reset),
        ("fresh", None) => Ok(Command::Fresh),
        ("clear", None) => Ok(Command::Clear),
        ("commands", None) => Ok(Command::Commands),
        ("quit" | "exit", None) => Ok(Command::Quit),
        _ => Err(format!(
            "unrecognized command '{trimmed}'; type 'commands' for the list"
        )),
    }
}

fn index_arg(lowered: &str, position: usize) -> Result<u32, String> {
    lowered
        .split_whitespace()
        .nth(position)
        .ok_or_else(|| "missing long task index".to_string())?
        .parse()
        .map_err(|_| "long task index must be a number".to_string())
}

fn priority_arg(lowered: &str, position: usize) -> Result<u8, String> {
    let priority: u8 = lowered
        .split_whitespace()
        .nth(position)
        .ok_or_else(|| "missing priority".to_string())?
        .parse()
        .map_err(|_| "priority must be 1-4".to_string())?;
    if !(1..=4).contains(&priority) {
        return Err("priority must be 1-4".to_string());
    }
    Ok(priority)
}

fn require_text(text: String, usage: &str) -> Result<String, String> {
    if text.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(text)
    }
}

pub const COMMAND_LIST: &[&str] = &[
    "done                       complete the active task",
    "done long <N>              complete long task [N]",
    "skip                       move the handle to the next ranked task",
    "time <due>                 set the active task's due from raw text",
    "due <due>                  move the due date, preserving time and rule",
    "time long <N> <due>        raw due text for long task [N]",
    "due long <N> <due>         preserving due move for long task [N]",
    "rename <new>               rename the active task",
    "rename long <N> <new>      rename long task [N], keeping its index",
    "priority <1-4>             set the active task's priority (4 = highest)",
    "priority long <N> <1-4>    set priority on long task [N]",
    "delete                     delete the active task",
    "delete long <N>            delete long task [N]",
    "add task <text>            add a regular task",
    "add long <text>            add a long-term task under the next index",
    "all                        show the ranked regular view",
    "show long                  show the long-term view",
    "flip                       rotate to the next saved filter",
    "graft                      show or pick up to 3 focus tasks",
    "graft <1-3>                complete a grafted slot",
    "graft delete               clear the grafted set",
    "hide                       hide the active task for today",
    "hide long <N>              hide long task [N] for today",
    "touch long <N>             advance long task [N] without finishing it",
    "timesheet                  build the daily timesheet",
    "diary                      show recent diary days",
    "replay                     reprint the active task",
    "reset                      repoint the handle at the top ranked task",
    "fresh                      clear the handle without completing",
    "clear                      clear the screen",
    "commands                   this list",
    "quit                       leave the console",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(parse("DONE"), Ok(Command::Done));
        assert_eq!(parse("Show Long"), Ok(Command::ShowLong));
        assert_eq!(parse("done LONG 3"), Ok(Command::DoneLong(3)));
    }

    #[test]
    fn free_text_keeps_its_case() {
        assert_eq!(
            parse("rename Buy OAT Milk"),
            Ok(Command::Rename("Buy OAT Milk".to_string()))
        );
        assert_eq!(
            parse("add task Call Dr. Smith"),
            Ok(Command::AddTask("Call Dr. Smith".to_string()))
        );
    }

    #[test]
    fn long_variants_parse_index_and_tail() {
        assert_eq!(
            parse("due long 4 sat"),
            Ok(Command::DueLong(4, "sat".to_string()))
        );
        assert_eq!(
            parse("time long 2 tomorrow 9am"),
            Ok(Command::TimeLong(2, "tomorrow 9am".to_string()))
        );
        assert_eq!(
            parse("rename long 7 water the plants"),
            Ok(Command::RenameLong(7, "water the plants".to_string()))
        );
        assert_eq!(parse("priority long 7 4"), Ok(Command::PriorityLong(7, 4)));
        assert_eq!(parse("hide long 9"), Ok(Command::HideLong(9)));
        assert_eq!(parse("delete long 1"), Ok(Command::DeleteLong(1)));
        assert_eq!(parse("touch long 5"), Ok(Command::TouchLong(5)));
    }

    #[test]
    fn priority_bounds_are_enforced() {
        assert!(parse("priority 0").is_err());
        assert!(parse("priority 5").is_err());
        assert_eq!(parse("priority 4"), Ok(Command::Priority(4)));
    }

    #[test]
    fn graft_variants() {
        assert_eq!(parse("graft"), Ok(Command::Graft));
        assert_eq!(parse("graft 2"), Ok(Command::GraftSlot(2)));
        assert_eq!(parse("graft delete"), Ok(Command::GraftDelete));
        assert!(parse("graft 4").is_err());
    }

    #[test]
    fn missing_arguments_are_usage_errors() {
        assert!(parse("done long").is_err());
        assert!(parse("due long 3").is_err());
        assert!(parse("add task").is_err());
        assert!(parse("rename long 3").is_err());
    }

    #[test]
    fn unknown_commands_point_at_the_list() {
        let error = parse("frobnicate").unwrap_err();
        assert!(error.contains("commands"));
    }

    #[test]
    fn due_takes_arbitrary_text() {
        assert_eq!(parse("due 21"), Ok(Command::Due("21".to_string())));
        assert_eq!(parse("due sat"), Ok(Command::Due("sat".to_string())));
        assert_eq!(
            parse("time tomorrow 9am"),
            Ok(Command::Time("tomorrow 9am".to_string()))
        );
    }
}
