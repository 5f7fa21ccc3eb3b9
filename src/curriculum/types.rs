use std::cmp::Ordering;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use crate::calendar::WeekParity;

/// A recurring course as listed in the timetable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curriculum {
    pub parity: WeekParity,
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub place: String,
    pub name: String,
    pub teacher: String,
    pub students: Vec<String>,
}

impl Curriculum {
    /// Binds this course to a concrete date.
    pub fn materialize(&self, date: NaiveDate) -> Occurrence {
        Occurrence {
            date,
            start: self.start,
            end: self.end,
            place: self.place.clone(),
            shifted: false,
            parity: self.parity,
            name: self.name.clone(),
            teacher: self.teacher.clone(),
            students: self.students.clone(),
        }
    }

    /// Whether this course meets on `date` when the current week has `parity`.
    pub fn meets_on(&self, date: NaiveDate, parity: WeekParity) -> bool {
        self.parity == parity && self.weekday == date.weekday()
    }
}

/// A single class meeting on a specific date.
///
/// `date`, `start`, `end` and `place` may be rewritten while shift rules are
/// applied; the course details are fixed copies of the originating
/// [`Curriculum`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub place: String,
    pub shifted: bool,
    pub parity: WeekParity,
    pub name: String,
    pub teacher: String,
    pub students: Vec<String>,
}

/// Identity of an occurrence for deduplication.
///
/// Two occurrences occupying the same date, time range and place are the same
/// meeting regardless of course name or teacher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub place: String,
}

impl Occurrence {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            date: self.date,
            start: self.start,
            end: self.end,
            place: self.place.clone(),
        }
    }

    /// Moves this occurrence to a new slot and marks it shifted.
    pub fn move_to(&mut self, date: NaiveDate, start: NaiveTime, end: NaiveTime, place: &str) {
        self.date = date;
        self.start = start;
        self.end = end;
        self.place = place.to_string();
        self.shifted = true;
    }
}

/// Orders occurrences by date, then by start time.
pub fn chronological(a: &Occurrence, b: &Occurrence) -> Ordering {
    a.date.cmp(&b.date).then(a.start.cmp(&b.start))
}
