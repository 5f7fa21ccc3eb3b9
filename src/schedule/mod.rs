pub mod cadence;
pub mod runner;
pub mod timer;

pub use cadence::{next_daily, next_polling_slot, next_weekly, reminder_fire_at, PollingWindow};
pub use runner::{Clock, JobHandler, Runner, SystemClock};
pub use timer::{JobId, TimerEntry, TimerQueue};
