//! Class reminder bot for a group chat.
//!
//! Reads a biweekly timetable and a table of one-off class moves, works out
//! which classes meet each day, and drives the announcements from a
//! single-threaded timer loop.

pub mod bot;
pub mod calendar;
pub mod config;
pub mod curriculum;
pub mod display;
pub mod error;
pub mod form;
pub mod notify;
pub mod parser;
pub mod schedule;
pub mod state;

pub use error::{Error, Result};
