use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::types::{Curriculum, Occurrence};
use crate::calendar::WeekParity;

/// One end of a shift rule: a concrete meeting slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDescriptor {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub place: String,
}

/// "The class normally held at `source` is held at `target` instead."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftRule {
    pub course: Option<String>,
    pub source: SlotDescriptor,
    pub target: SlotDescriptor,
}

/// How strictly a rule's source identifies the class it moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftMatch {
    /// Date, start time and place only.
    SlotOnly,
    /// Slot plus course name, when the rule names a course.
    #[default]
    SlotAndCourse,
}

impl ShiftRule {
    fn course_matches(&self, name: &str, policy: ShiftMatch) -> bool {
        match (policy, &self.course) {
            (ShiftMatch::SlotAndCourse, Some(course)) => course == name,
            _ => true,
        }
    }

    /// Whether an already materialized occurrence sits in this rule's source slot.
    pub fn matches_occurrence(&self, occ: &Occurrence, policy: ShiftMatch) -> bool {
        occ.date == self.source.date
            && occ.start == self.source.start
            && occ.place == self.source.place
            && self.course_matches(&occ.name, policy)
    }

    /// Whether `curriculum` is the recurring course this rule's source refers
    /// to, given the parity the source date falls in.
    pub fn matches_curriculum(&self, curriculum: &Curriculum, source_parity: WeekParity, policy: ShiftMatch) -> bool {
        curriculum.weekday == self.source.date.weekday()
            && curriculum.start == self.source.start
            && curriculum.place == self.source.place
            && curriculum.parity == source_parity
            && self.course_matches(&curriculum.name, policy)
    }

    /// Rewrites `occ` into this rule's target slot.
    pub fn apply_to(&self, occ: &mut Occurrence) {
        occ.move_to(self.target.date, self.target.start, self.target.end, &self.target.place);
    }
}
