//! Next-fire computations for the self-rescheduling jobs.
//!
//! Every function takes the current instant and answers in the same UTC
//! offset. Recurring jobs always get an instant strictly after `now`.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{at_local, clock_format};
use crate::curriculum::Occurrence;

/// Daily window in which the question form is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingWindow {
    #[serde(default = "default_window_start", with = "clock_format")]
    pub window_start: NaiveTime,
    #[serde(default = "default_window_end", with = "clock_format")]
    pub window_end: NaiveTime,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: u32,
}

fn default_window_start() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_window_end() -> NaiveTime {
    NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_step_minutes() -> u32 {
    10
}

impl Default for PollingWindow {
    fn default() -> Self {
        Self {
            window_start: default_window_start(),
            window_end: default_window_end(),
            step_minutes: default_step_minutes(),
        }
    }
}

/// Next time-of-day `at`: today if still ahead, otherwise tomorrow.
pub fn next_daily(now: DateTime<FixedOffset>, at: NaiveTime) -> DateTime<FixedOffset> {
    let today = now.date_naive();
    let date = if now.time() < at { today } else { today + Duration::days(1) };
    at_local(date, at, *now.offset())
}

/// Next `weekday` at `at`; a slot already passed this week moves to next week.
pub fn next_weekly(now: DateTime<FixedOffset>, weekday: Weekday, at: NaiveTime) -> DateTime<FixedOffset> {
    let today = now.date_naive();
    let mut days_ahead =
        (i64::from(weekday.num_days_from_monday()) - i64::from(today.weekday().num_days_from_monday())).rem_euclid(7);
    if days_ahead == 0 && now.time() >= at {
        days_ahead = 7;
    }
    at_local(today + Duration::days(days_ahead), at, *now.offset())
}

/// Next polling instant.
///
/// Before the window: its start today. Inside: the next `step_minutes`
/// boundary, capped at the window end. At or after the end: tomorrow's start.
pub fn next_polling_slot(now: DateTime<FixedOffset>, window: &PollingWindow) -> DateTime<FixedOffset> {
    let today = now.date_naive();
    let offset = *now.offset();
    let time = now.time();

    if time < window.window_start {
        return at_local(today, window.window_start, offset);
    }
    if time >= window.window_end {
        return at_local(today + Duration::days(1), window.window_start, offset);
    }

    let step = window.step_minutes.max(1);
    let minutes = time.hour() * 60 + time.minute();
    let next_minutes = (minutes / step + 1) * step;
    let next = NaiveTime::from_num_seconds_from_midnight_opt(next_minutes * 60, 0)
        .map_or(window.window_end, |t| t.min(window.window_end));
    at_local(today, next, offset)
}

/// When the "starting soon" reminder for `occ` should fire.
///
/// A reminder whose instant has already passed fires right away.
pub fn reminder_fire_at(occ: &Occurrence, lead: Duration, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let target = at_local(occ.date, occ.start, *now.offset()) - lead;
    target.max(now)
}
