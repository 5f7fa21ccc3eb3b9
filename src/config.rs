//! Bot configuration, read from a JSON file.

use std::path::{Path, PathBuf};

use chrono::{Duration, FixedOffset, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{clock_format, offset_from_minutes, WeekParity};
use crate::curriculum::ShiftMatch;
use crate::error::{Error, Result};
use crate::schedule::PollingWindow;

pub const DEFAULT_CONFIG_PATH: &str = "config/course_reminder_bot_config.json";

/// A weekly message carrying a link, such as the feedback form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyPrompt {
    #[serde(default)]
    pub weekday: Option<Weekday>,
    #[serde(default, with = "clock_format::option")]
    pub time: Option<NaiveTime>,
    pub link: String,
}

impl WeeklyPrompt {
    /// Weekday and time, falling back to the given defaults.
    pub fn slot_or(&self, weekday: Weekday, time: NaiveTime) -> (Weekday, NaiveTime) {
        (self.weekday.unwrap_or(weekday), self.time.unwrap_or(time))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub curricula_path: PathBuf,
    pub shifts_path: PathBuf,
    pub corpus_path: PathBuf,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// Seeds the week parity when there is no state file yet.
    #[serde(default)]
    pub start_parity: Option<WeekParity>,
    #[serde(default)]
    pub shift_match: ShiftMatch,

    #[serde(default = "default_reminder_lead_minutes")]
    pub reminder_lead_minutes: u32,
    #[serde(default = "default_inform_time", with = "clock_format")]
    pub inform_time: NaiveTime,

    #[serde(default)]
    pub feedback: Option<WeeklyPrompt>,
    #[serde(default)]
    pub question: Option<WeeklyPrompt>,
    #[serde(default)]
    pub submission_check: PollingWindow,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

fn default_utc_offset_minutes() -> i32 {
    480
}

fn default_reminder_lead_minutes() -> u32 {
    15
}

fn default_inform_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

pub fn default_feedback_slot() -> (Weekday, NaiveTime) {
    (Weekday::Sun, NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN))
}

pub fn default_question_slot() -> (Weekday, NaiveTime) {
    (Weekday::Fri, NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN))
}

impl BotConfig {
    /// Config with every optional field at its default.
    pub fn with_paths(curricula_path: PathBuf, shifts_path: PathBuf, corpus_path: PathBuf) -> Self {
        Self {
            curricula_path,
            shifts_path,
            corpus_path,
            state_path: default_state_path(),
            log_dir: default_log_dir(),
            utc_offset_minutes: default_utc_offset_minutes(),
            start_parity: None,
            shift_match: ShiftMatch::default(),
            reminder_lead_minutes: default_reminder_lead_minutes(),
            inform_time: default_inform_time(),
            feedback: None,
            question: None,
            submission_check: PollingWindow::default(),
        }
    }

    /// Reads and validates a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.offset()?;
        let window = &self.submission_check;
        if !(1..=60).contains(&window.step_minutes) {
            return Err(Error::Config(format!(
                "submission_check.step_minutes must be within 1..=60, got {}",
                window.step_minutes
            )));
        }
        if window.window_start >= window.window_end {
            return Err(Error::Config(
                "submission_check.window_start must be before window_end".to_string(),
            ));
        }
        if self.reminder_lead_minutes > 24 * 60 {
            return Err(Error::Config(format!(
                "reminder_lead_minutes must be at most one day, got {}",
                self.reminder_lead_minutes
            )));
        }
        for (name, prompt) in [("feedback", &self.feedback), ("question", &self.question)] {
            if prompt.as_ref().is_some_and(|p| p.link.trim().is_empty()) {
                return Err(Error::Config(format!("{name}.link must not be empty")));
            }
        }
        Ok(())
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        if self.utc_offset_minutes.abs() > 14 * 60 {
            return Err(Error::Config(format!(
                "utc_offset_minutes must be within ±14h, got {}",
                self.utc_offset_minutes
            )));
        }
        offset_from_minutes(self.utc_offset_minutes)
            .ok_or_else(|| Error::Config(format!("invalid utc offset {}", self.utc_offset_minutes)))
    }

    pub fn reminder_lead(&self) -> Duration {
        Duration::minutes(i64::from(self.reminder_lead_minutes))
    }
}
