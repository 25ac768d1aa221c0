//! Client for the remote key/value state service.
//!
//! The service exposes `GET /v1/state` and `PATCH /v1/state`, both wrapped
//! in an `{ok, data: {state}, meta: {server_time}}` envelope with an `ETag`
//! header. Every PATCH must present `If-Match`; a stale tag earns a 409 (or
//! an `ETAG_MISMATCH` error code), and `update_state` re-reads and retries a
//! bounded number of times. Keys under `meta.` belong to the service and are
//! rejected before anything goes on the wire.

pub mod publisher;

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

const STATE_PATH: &str = "v1/state";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RESERVED_PREFIX: &str = "meta.";
const ETAG_MISMATCH_CODE: &str = "ETAG_MISMATCH";

#[derive(Debug, Error)]
pub enum StateSyncError {
    #[error("refusing to write reserved state key '{0}'")]
    ReservedKey(String),
    #[error("etag still stale after {0} attempts")]
    EtagExhausted(u32),
    #[error("etag mismatch")]
    EtagMismatch,
    #[error("state service unauthorized (HTTP {0}); check the state token")]
    Unauthorized(u16),
    #[error("state service returned HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("state service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("state service broke its contract: {0}")]
    Contract(String),
}

pub type StateResult<T> = Result<T, StateSyncError>;

/// One observed version of the remote state map.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub state: Map<String, Value>,
    pub etag: String,
    pub server_time: Option<String>,
}

impl StateSnapshot {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.state.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    data: Option<EnvelopeData>,
    #[serde(default)]
    meta: Option<EnvelopeMeta>,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    state: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeMeta {
    #[serde(default)]
    server_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct PatchBody<'a> {
    updated_by: &'a str,
    set: &'a Map<String, Value>,
    unset: &'a [String],
}

#[derive(Debug, Clone)]
pub struct StateClient {
    http: Client,
    base_url: String,
    token: String,
    max_attempts: u32,
}

impl StateClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    fn url(&self) -> String {
        format!("{}/{STATE_PATH}", self.base_url.trim_end_matches('/'))
    }

    pub fn get_state(&self) -> StateResult<StateSnapshot> {
        let response = self
            .http
            .get(self.url())
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .send()?;
        Self::snapshot_from(response)
    }

    /// One guarded PATCH against a previously observed ETag.
    pub fn patch_state(
        &self,
        etag: &str,
        updated_by: &str,
        set: &Map<String, Value>,
        unset: &[String],
    ) -> StateResult<StateSnapshot> {
        reject_reserved(set, unset)?;

        let response = self
            .http
            .patch(self.url())
            .bearer_auth(&self.token)
            .header(reqwest::header::IF_MATCH, etag)
            .timeout(REQUEST_TIMEOUT)
            .json(&PatchBody {
                updated_by,
                set,
                unset,
            })
            .send()?;
        Self::snapshot_from(response)
    }

    /// GET-then-PATCH with the freshest ETag, retrying stale tags up to the
    /// configured attempt budget.
    pub fn update_state(
        &self,
        updated_by: &str,
        set: &Map<String, Value>,
        unset: &[String],
    ) -> StateResult<StateSnapshot> {
        reject_reserved(set, unset)?;

        for attempt in 1..=self.max_attempts {
            let current = self.get_state()?;
            match self.patch_state(&current.etag, updated_by, set, unset) {
                Ok(snapshot) => return Ok(snapshot),
                Err(StateSyncError::EtagMismatch) => {
                    debug!(attempt, "etag went stale between read and patch; retrying");
                }
                Err(other) => return Err(other),
            }
        }
        Err(StateSyncError::EtagExhausted(self.max_attempts))
    }

    fn snapshot_from(response: Response) -> StateResult<StateSnapshot> {
        let status = response.status();
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        if status == StatusCode::CONFLICT {
            return Err(StateSyncError::EtagMismatch);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StateSyncError::Unauthorized(status.as_u16()));
        }

        let body = response.text()?;
        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|error| StateSyncError::Contract(format!("bad envelope: {error}")))?;

        if let Some(error) = envelope.error.as_ref()
            && error.code.as_deref() == Some(ETAG_MISMATCH_CODE)
        {
            return Err(StateSyncError::EtagMismatch);
        }

        if !status.is_success() || !envelope.ok {
            let detail = envelope
                .error
                .and_then(|error| error.message.or(error.code))
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(StateSyncError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        let etag = etag.ok_or_else(|| {
            StateSyncError::Contract("response is missing the ETag header".to_string())
        })?;
        let data = envelope
            .data
            .ok_or_else(|| StateSyncError::Contract("response is missing data.state".to_string()))?;

        Ok(StateSnapshot {
            state: data.state,
            etag,
            server_time: envelope.meta.and_then(|meta| meta.server_time),
        })
    }
}

fn reject_reserved(set: &Map<String, Value>, unset: &[String]) -> StateResult<()> {
    for key in set.keys().map(String::as_str).chain(unset.iter().map(String::as_str)) {
        if key.starts_with(RESERVED_PREFIX) {
            warn!(key, "attempted write to a reserved state key");
            return Err(StateSyncError::ReservedKey(key.to_string()));
        }
    }
    Ok(())
}
