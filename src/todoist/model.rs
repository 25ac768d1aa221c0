//! Wire shapes for the task service.
//!
//! One concrete in-memory task shape; everything duck-typed about the HTTP
//! payloads is absorbed here at the boundary.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::types::localize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<Due>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_priority() -> u8 {
    1
}

impl Task {
    pub fn is_recurring(&self) -> bool {
        self.due.as_ref().is_some_and(|due| due.is_recurring)
    }

    pub fn due_string(&self) -> Option<&str> {
        self.due.as_ref().and_then(|due| due.string.as_deref())
    }
}

/// The service's due object. Timed dues carry `datetime`; all-day dues carry
/// only `date`. `datetime` may arrive with an offset, a trailing Z, or as a
/// floating local time to be read in `timezone`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Due {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

impl Due {
    pub fn has_time(&self) -> bool {
        self.datetime.is_some()
    }

    /// The due's own zone, else `fallback`.
    pub fn tz(&self, fallback: Tz) -> Tz {
        self.timezone
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or(fallback)
    }

    /// The due instant in UTC for timed dues. Floating datetimes are
    /// interpreted in the due's zone.
    pub fn datetime_utc(&self, fallback: Tz) -> Option<DateTime<Utc>> {
        let raw = self.datetime.as_deref()?;

        if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
            return Some(with_offset.with_timezone(&Utc));
        }

        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
            .ok()?;
        Some(localize(self.tz(fallback), naive).with_timezone(&Utc))
    }

    /// Calendar date of the due, read in the due's zone for timed dues.
    pub fn calendar_date(&self, fallback: Tz) -> Option<NaiveDate> {
        if let Some(instant) = self.datetime_utc(fallback) {
            return Some(instant.with_timezone(&self.tz(fallback)).date_naive());
        }
        self.date
    }

    /// Wall-clock time of day for timed dues, in the due's zone.
    pub fn time_of_day(&self, fallback: Tz) -> Option<NaiveTime> {
        let instant = self.datetime_utc(fallback)?;
        Some(instant.with_timezone(&self.tz(fallback)).time())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// A due value at a call site: a typed date, a typed instant, or raw text
/// for the service's own parser. Normalized into the right wire field on
/// serialization; date-only values never grow a time component.
#[derive(Debug, Clone, PartialEq)]
pub enum DueInput {
    Date(NaiveDate),
    Datetime(DateTime<FixedOffset>),
    Text(String),
}

impl DueInput {
    fn wire_fields(&self) -> (Option<String>, Option<String>, Option<String>) {
        match self {
            Self::Date(date) => (Some(date.format("%Y-%m-%d").to_string()), None, None),
            Self::Datetime(instant) => (None, Some(instant.to_rfc3339()), None),
            Self::Text(text) => (None, None, Some(text.clone())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewTask {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_string: Option<String>,
}

impl NewTask {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn in_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_due(mut self, due: &DueInput) -> Self {
        (self.due_date, self.due_datetime, self.due_string) = due.wire_fields();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_string: Option<String>,
}

impl TaskUpdate {
    pub fn content(value: impl Into<String>) -> Self {
        Self {
            content: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn priority(value: u8) -> Self {
        Self {
            priority: Some(value),
            ..Self::default()
        }
    }

    pub fn due(due: &DueInput) -> Self {
        let (due_date, due_datetime, due_string) = due.wire_fields();
        Self {
            due_date,
            due_datetime,
            due_string,
            ..Self::default()
        }
    }
}
