use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const TODOIST_TOKEN_ENV: &str = "TODOIST_API_TOKEN";
pub const STATE_TOKEN_ENV: &str = "STATE_SERVICE_TOKEN";
pub const STATE_URL_ENV: &str = "STATE_SERVICE_URL";

const DEFAULT_TIMEZONE: &str = "Europe/London";
const DEFAULT_LONG_PROJECT: &str = "Long Term Tasks";
const DEFAULT_ALLDAY_ROLLOVER: &str = "06:59";
const DEFAULT_TODOIST_URL: &str = "https://api.todoist.com/api/v1";
const DEFAULT_STATE_URL: &str = "https://state.example.dev";
const MIN_PUBLISH_INTERVAL_S: u64 = 10;
const MAX_PUBLISH_INTERVAL_S: u64 = 3_600;
const DEFAULT_PUBLISH_INTERVAL_S: u64 = 60;
const MIN_PUBLISH_ATTEMPTS: u32 = 1;
const MAX_PUBLISH_ATTEMPTS: u32 = 5;
const DEFAULT_PUBLISH_ATTEMPTS: u32 = 2;
const MAX_RECENT_TTL_S: u64 = 300;
const DEFAULT_RECENT_TTL_S: u64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timezone: String,
    pub long_project: String,
    /// Local time at which date-only dues from the previous day stop counting
    /// as due. Legacy behavior wants overnight tasks overdue until dawn.
    pub allday_rollover: String,
    pub publish_interval_s: u64,
    pub publish_max_attempts: u32,
    pub recently_completed_ttl_s: u64,
    pub todoist_base_url: String,
    pub state_service_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            long_project: DEFAULT_LONG_PROJECT.to_string(),
            allday_rollover: DEFAULT_ALLDAY_ROLLOVER.to_string(),
            publish_interval_s: DEFAULT_PUBLISH_INTERVAL_S,
            publish_max_attempts: DEFAULT_PUBLISH_ATTEMPTS,
            recently_completed_ttl_s: DEFAULT_RECENT_TTL_S,
            todoist_base_url: DEFAULT_TODOIST_URL.to_string(),
            state_service_url: DEFAULT_STATE_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("taskdeck");
        path.push("settings.toml");
        Some(path)
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(mut settings) => {
                    settings.validate();
                    settings
                }
                Err(error) => {
                    warn!(
                        "failed to parse settings config '{}': {}",
                        path.display(),
                        error
                    );
                    Self::default()
                }
            },
            Err(error) => {
                warn!(
                    "failed to read settings config '{}': {}",
                    path.display(),
                    error
                );
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().ok_or_else(|| anyhow!("unable to determine config path"))?;
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("invalid settings config path"))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory '{}'", parent.display()))?;

        let mut validated = self.clone();
        validated.validate();
        let contents =
            toml::to_string_pretty(&validated).context("failed to serialize settings to TOML")?;

        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("invalid settings config file name"))?
            .to_string_lossy()
            .to_string();
        let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, contents).with_context(|| {
            format!(
                "failed to write temporary settings file '{}'",
                tmp_path.display()
            )
        })?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to atomically rename settings file '{}' to '{}'",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    fn validate(&mut self) {
        self.publish_interval_s = self
            .publish_interval_s
            .clamp(MIN_PUBLISH_INTERVAL_S, MAX_PUBLISH_INTERVAL_S);
        self.publish_max_attempts = self
            .publish_max_attempts
            .clamp(MIN_PUBLISH_ATTEMPTS, MAX_PUBLISH_ATTEMPTS);
        self.recently_completed_ttl_s = self.recently_completed_ttl_s.min(MAX_RECENT_TTL_S);

        if self.timezone.parse::<Tz>().is_err() {
            warn!(
                "invalid timezone '{}' in settings config; falling back to {}",
                self.timezone, DEFAULT_TIMEZONE
            );
            self.timezone = DEFAULT_TIMEZONE.to_string();
        }

        if NaiveTime::parse_from_str(&self.allday_rollover, "%H:%M").is_err() {
            warn!(
                "invalid allday_rollover '{}' in settings config; falling back to {}",
                self.allday_rollover, DEFAULT_ALLDAY_ROLLOVER
            );
            self.allday_rollover = DEFAULT_ALLDAY_ROLLOVER.to_string();
        }

        if self.long_project.trim().is_empty() {
            self.long_project = DEFAULT_LONG_PROJECT.to_string();
        }
    }

    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::Europe::London)
    }

    pub fn rollover_time(&self) -> NaiveTime {
        NaiveTime::parse_from_str(&self.allday_rollover, "%H:%M")
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(6, 59, 0).expect("valid fallback time"))
    }

    pub fn state_service_url(&self) -> String {
        std::env::var(STATE_URL_ENV).unwrap_or_else(|_| self.state_service_url.clone())
    }
}

pub fn todoist_token() -> anyhow::Result<String> {
    std::env::var(TODOIST_TOKEN_ENV)
        .map_err(|_| anyhow!("{TODOIST_TOKEN_ENV} is not set; export your task service token"))
}

pub fn state_token() -> anyhow::Result<String> {
    std::env::var(STATE_TOKEN_ENV)
        .map_err(|_| anyhow!("{STATE_TOKEN_ENV} is not set; export your state service token"))
}
