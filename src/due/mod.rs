//! Due-date policy: text resolution, recurrence rules, and the
//! change-date-preserve-everything protocol.

pub mod preserve;
pub mod recurrence;
pub mod resolver;

use chrono::NaiveDate;
use thiserror::Error;

use crate::todoist::RemoteError;

#[derive(Debug, Error)]
pub enum DueError {
    #[error("could not interpret due text '{0}'")]
    InvalidDueText(String),
    #[error("due verification failed: expected {expected}, task now shows {actual:?}")]
    DueVerificationMismatch {
        expected: NaiveDate,
        actual: Option<NaiveDate>,
    },
    #[error("failed to restore recurrence rule '{rule}'")]
    RecurrenceRecoveryFailed { rule: String },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub type DueResult<T> = Result<T, DueError>;
