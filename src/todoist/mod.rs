//! Thin blocking adapter over the task service's HTTP API.
//!
//! List operations paginate with an opaque cursor and flatten into one
//! sequence. 429 and 500-504 retry with exponential backoff, honoring
//! `Retry-After` as a lower bound. Close gets a long deadline and no retry:
//! under partial failure the server has almost certainly seen the close, and
//! a second close would double-complete a recurring task.

pub mod model;

use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use thiserror::Error;
use tracing::{debug, warn};

use model::{NewTask, Project, Task, TaskUpdate};

const RETRY_BASE: Duration = Duration::from_millis(500);
const RETRY_MAX_ATTEMPTS: u32 = 3;
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_LIMIT: u32 = 200;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("task not found")]
    NotFound,
    #[error("unauthorized (HTTP {0}); check the task service token")]
    Unauthorized(u16),
    #[error("endpoint no longer available (HTTP 410): {0}")]
    Deprecated(String),
    #[error("service still failing after {attempts} attempts (last HTTP {status})")]
    Transient { attempts: u32, status: u16 },
    #[error("unexpected HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub retry_base: Duration,
    pub read_timeout: Duration,
    pub close_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.todoist.com/api/v1".to_string(),
            retry_base: RETRY_BASE,
            read_timeout: READ_TIMEOUT,
            close_timeout: CLOSE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TodoistClient {
    http: Client,
    config: ClientConfig,
    token: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum Page<T> {
    Cursor {
        results: Vec<T>,
        #[serde(default)]
        next_cursor: Option<String>,
    },
    Flat(Vec<T>),
}

impl TodoistClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_config(
            ClientConfig {
                base_url: base_url.into(),
                ..ClientConfig::default()
            },
            token,
        )
    }

    pub fn with_config(config: ClientConfig, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            config,
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub fn list_tasks_by_filter(&self, query: &str) -> RemoteResult<Vec<Task>> {
        self.list_paginated("tasks/filter", &[("query", query.to_string())])
    }

    pub fn list_tasks_by_project(&self, project_id: &str) -> RemoteResult<Vec<Task>> {
        self.list_paginated("tasks", &[("project_id", project_id.to_string())])
    }

    pub fn list_projects(&self) -> RemoteResult<Vec<Project>> {
        self.list_paginated("projects", &[])
    }

    pub fn project_named(&self, name: &str) -> RemoteResult<Option<Project>> {
        Ok(self
            .list_projects()?
            .into_iter()
            .find(|project| project.name == name))
    }

    pub fn get_task(&self, id: &str) -> RemoteResult<Task> {
        let path = format!("tasks/{id}");
        let response = self.execute_with_retry(&path, || {
            self.http
                .get(self.url(&path))
                .bearer_auth(&self.token)
                .timeout(self.config.read_timeout)
        })?;
        Self::decode(self.check_status(response, &path)?)
    }

    pub fn add_task(&self, new_task: &NewTask) -> RemoteResult<Task> {
        let response = self.execute_with_retry("tasks", || {
            self.http
                .post(self.url("tasks"))
                .bearer_auth(&self.token)
                .timeout(self.config.read_timeout)
                .json(new_task)
        })?;
        Self::decode(self.check_status(response, "tasks")?)
    }

    pub fn update_task(&self, id: &str, update: &TaskUpdate) -> RemoteResult<Task> {
        let path = format!("tasks/{id}");
        let response = self.execute_with_retry(&path, || {
            self.http
                .post(self.url(&path))
                .bearer_auth(&self.token)
                .timeout(self.config.read_timeout)
                .json(update)
        })?;
        Self::decode(self.check_status(response, &path)?)
    }

    /// Close (complete) a task. Single attempt with a long deadline: a
    /// timeout here is a warning for the caller, never a retry.
    pub fn close_task(&self, id: &str) -> RemoteResult<()> {
        let path = format!("tasks/{id}/close");
        let response = self
            .http
            .post(self.url(&path))
            .bearer_auth(&self.token)
            .timeout(self.config.close_timeout)
            .send()?;
        self.check_status(response, &path).map(|_| ())
    }

    pub fn delete_task(&self, id: &str) -> RemoteResult<()> {
        let path = format!("tasks/{id}");
        let response = self.execute_with_retry(&path, || {
            self.http
                .delete(self.url(&path))
                .bearer_auth(&self.token)
                .timeout(self.config.read_timeout)
        })?;
        self.check_status(response, &path).map(|_| ())
    }

    fn list_paginated<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> RemoteResult<Vec<T>> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let response = self.execute_with_retry(path, || {
                let mut request = self
                    .http
                    .get(self.url(path))
                    .bearer_auth(&self.token)
                    .timeout(self.config.read_timeout)
                    .query(&[("limit", PAGE_LIMIT.to_string())]);
                for (key, value) in params {
                    request = request.query(&[(*key, value.as_str())]);
                }
                if let Some(cursor) = cursor.as_deref() {
                    request = request.query(&[("cursor", cursor)]);
                }
                request
            })?;

            let page: Page<T> = Self::decode(self.check_status(response, path)?)?;
            match page {
                Page::Cursor {
                    results: mut batch,
                    next_cursor,
                } => {
                    results.append(&mut batch);
                    match next_cursor {
                        Some(next) if !next.is_empty() => cursor = Some(next),
                        _ => break,
                    }
                }
                Page::Flat(mut batch) => {
                    results.append(&mut batch);
                    break;
                }
            }
        }

        debug!(path, count = results.len(), "fetched remote list");
        Ok(results)
    }

    /// Send a request, retrying 429/500-504 with exponential backoff.
    /// Transport failures and every other status propagate unchanged.
    fn execute_with_retry(
        &self,
        path: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> RemoteResult<Response> {
        let mut delay = self.config.retry_base;
        let mut last_status = 0;

        for attempt in 1..=RETRY_MAX_ATTEMPTS {
            let response = build().send()?;
            let status = response.status().as_u16();

            if !is_retryable(status) {
                return Ok(response);
            }

            last_status = status;
            if attempt < RETRY_MAX_ATTEMPTS {
                let wait = retry_wait(delay, retry_after(&response));
                warn!(
                    path,
                    status,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "transient service failure; retrying"
                );
                thread::sleep(wait);
                delay = delay.saturating_mul(2);
            }
        }

        Err(RemoteError::Transient {
            attempts: RETRY_MAX_ATTEMPTS,
            status: last_status,
        })
    }

    fn check_status(&self, response: Response, path: &str) -> RemoteResult<Response> {
        let status = response.status();
        match status {
            _ if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(RemoteError::Unauthorized(status.as_u16()))
            }
            StatusCode::GONE => Err(RemoteError::Deprecated(path.to_string())),
            _ => {
                let detail = response
                    .text()
                    .unwrap_or_default()
                    .chars()
                    .take(200)
                    .collect();
                Err(RemoteError::Http {
                    status: status.as_u16(),
                    detail,
                })
            }
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(response: Response) -> RemoteResult<T> {
        Ok(response.json()?)
    }
}

fn is_retryable(status: u16) -> bool {
    status == 429 || (500..=504).contains(&status)
}

/// Backoff wait for one attempt; `Retry-After` sets a lower bound.
fn retry_wait(delay: Duration, retry_after: Option<Duration>) -> Duration {
    match retry_after {
        Some(server_floor) => delay.max(server_floor),
        None => delay,
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
