//! Resolution of the recurring timetable into today's classes.
//!
//! Each cycle merges three sources into one deduplicated, date-ordered set:
//! occurrences carried over from earlier cycles, today's recurring courses,
//! and the shift table. Shift rules are applied in file order, so a later
//! rule may match an occurrence produced by an earlier one.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::{debug, info};

use super::shift::{ShiftMatch, ShiftRule};
use super::types::{chronological, Curriculum, Occurrence};
use crate::calendar::{format_clock, week_offset_parity, WeekParity};

/// Biweekly parity bookkeeping carried across cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityState {
    pub current: WeekParity,
    /// Date the process started; no flip happens on this date.
    pub started_on: NaiveDate,
    /// Date of the most recent flip, so a Monday never flips twice.
    pub flipped_on: Option<NaiveDate>,
}

impl ParityState {
    pub fn new(current: WeekParity, started_on: NaiveDate, flipped_on: Option<NaiveDate>) -> Self {
        Self {
            current,
            started_on,
            flipped_on,
        }
    }

    /// Flips the parity on the first cycle of a Monday other than the start
    /// date. Returns `true` when a flip happened.
    pub fn advance(&mut self, today: NaiveDate) -> bool {
        if today == self.started_on || today.weekday() != Weekday::Mon || self.flipped_on == Some(today) {
            return false;
        }
        self.current = self.current.flip();
        self.flipped_on = Some(today);
        true
    }
}

/// Not-yet-past occurrences carried from one cycle to the next.
#[derive(Debug, Clone, Default)]
pub struct RunningSet {
    occurrences: Vec<Occurrence>,
}

impl RunningSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Occurrence> {
        self.occurrences.iter()
    }

    pub fn push(&mut self, occurrence: Occurrence) {
        self.occurrences.push(occurrence);
    }

    /// Drops every occurrence dated before `date`.
    pub fn prune_before(&mut self, date: NaiveDate) {
        self.occurrences.retain(|o| o.date >= date);
    }

    /// Collapses occurrences sharing a slot key, keeping the first one.
    pub fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.occurrences.retain(|o| seen.insert(o.slot_key()));
    }

    /// Occurrences on `date`, ordered by start time.
    pub fn on(&self, date: NaiveDate) -> Vec<Occurrence> {
        let mut result: Vec<Occurrence> = self.occurrences.iter().filter(|o| o.date == date).cloned().collect();
        result.sort_by(chronological);
        result
    }
}

impl FromIterator<Occurrence> for RunningSet {
    fn from_iter<I: IntoIterator<Item = Occurrence>>(iter: I) -> Self {
        Self {
            occurrences: iter.into_iter().collect(),
        }
    }
}

/// Outcome of one resolution cycle.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Pruned and deduplicated set to carry into the next cycle.
    pub running: RunningSet,
    /// Today's classes in start-time order.
    pub today: Vec<Occurrence>,
    /// Whether this cycle flipped the week parity.
    pub parity_flipped: bool,
}

/// Resolves a timetable and shift table into concrete occurrences.
pub struct Engine<'a> {
    curricula: &'a [Curriculum],
    shifts: &'a [ShiftRule],
    policy: ShiftMatch,
}

impl<'a> Engine<'a> {
    pub fn new(curricula: &'a [Curriculum], shifts: &'a [ShiftRule], policy: ShiftMatch) -> Self {
        Self {
            curricula,
            shifts,
            policy,
        }
    }

    /// Runs one cycle for `today`.
    ///
    /// Updates `parity` in place; the caller is responsible for persisting it
    /// when [`Resolution::parity_flipped`] is set.
    pub fn resolve_today(&self, today: NaiveDate, parity: &mut ParityState, mut running: RunningSet) -> Resolution {
        let parity_flipped = parity.advance(today);
        if parity_flipped {
            info!(date = %today, parity = %parity.current, "week parity flipped");
        }

        running.prune_before(today);

        for curriculum in self.curricula {
            if curriculum.meets_on(today, parity.current) {
                running.push(curriculum.materialize(today));
            }
        }

        for rule in self.shifts {
            self.apply_rule(rule, today, parity.current, &mut running);
        }

        running.dedup();
        let today_classes = running.on(today);

        Resolution {
            running,
            today: today_classes,
            parity_flipped,
        }
    }

    fn apply_rule(&self, rule: &ShiftRule, today: NaiveDate, current: WeekParity, running: &mut RunningSet) {
        let mut applied = false;

        // Outbound: move occurrences that already exist out of the source slot.
        for occ in running.occurrences.iter_mut() {
            if rule.matches_occurrence(occ, self.policy) {
                info!(
                    course = %occ.name,
                    from = %format!("{} {}", occ.date, format_clock(occ.start)),
                    to = %format!("{} {}", rule.target.date, format_clock(rule.target.start)),
                    "class shifted out of its slot"
                );
                rule.apply_to(occ);
                applied = true;
            }
        }

        // Inbound: something moves into today that was never materialized here.
        if rule.target.date == today {
            // The source may sit in the other week of the cycle, so match
            // against the timetable that was active on that date.
            let source_parity = week_offset_parity(today, current, rule.source.date);
            for curriculum in self.curricula {
                if rule.matches_curriculum(curriculum, source_parity, self.policy) {
                    info!(
                        course = %curriculum.name,
                        place = %curriculum.place,
                        from = %format!("{} {}", rule.source.date, format_clock(rule.source.start)),
                        to = %format!("{} {}", rule.target.date, format_clock(rule.target.start)),
                        "class shifted into today"
                    );
                    let mut occ = curriculum.materialize(today);
                    occ.move_to(today, rule.target.start, rule.target.end, &rule.target.place);
                    running.push(occ);
                    applied = true;
                }
            }
        }

        if !applied {
            debug!(
                source_date = %rule.source.date,
                source_start = %format_clock(rule.source.start),
                source_place = %rule.source.place,
                "shift rule matched nothing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::shift::SlotDescriptor;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn course(name: &str, parity: WeekParity, weekday: Weekday, start: NaiveTime, place: &str) -> Curriculum {
        Curriculum {
            parity,
            weekday,
            start,
            end: start + chrono::Duration::minutes(90),
            place: place.to_string(),
            name: name.to_string(),
            teacher: "Li".to_string(),
            students: vec!["Wang".to_string()],
        }
    }

    fn slot(date: NaiveDate, start: NaiveTime, place: &str) -> SlotDescriptor {
        SlotDescriptor {
            date,
            start,
            end: start + chrono::Duration::minutes(90),
            place: place.to_string(),
        }
    }

    // Week of 2024-03-04 (Monday) .. 2024-03-10 (Sunday).
    const MON: (i32, u32, u32) = (2024, 3, 4);
    const WED: (i32, u32, u32) = (2024, 3, 6);
    const FRI: (i32, u32, u32) = (2024, 3, 8);

    fn parity_started(d: NaiveDate) -> ParityState {
        ParityState::new(WeekParity::Single, d, None)
    }

    #[test]
    fn materializes_only_matching_parity_and_weekday() {
        let mon = date(MON.0, MON.1, MON.2);
        let curricula = vec![
            course("Calculus", WeekParity::Single, Weekday::Mon, hm(10, 0), "Room 101"),
            course("Physics", WeekParity::Double, Weekday::Mon, hm(10, 0), "Room 102"),
            course("Chemistry", WeekParity::Single, Weekday::Tue, hm(10, 0), "Room 103"),
        ];
        let engine = Engine::new(&curricula, &[], ShiftMatch::SlotAndCourse);
        let mut parity = parity_started(mon);

        let res = engine.resolve_today(mon, &mut parity, RunningSet::new());
        assert_eq!(res.today.len(), 1);
        assert_eq!(res.today[0].name, "Calculus");
        assert!(!res.parity_flipped);
    }

    #[test]
    fn outbound_shift_leaves_today_and_lands_later() {
        let mon = date(MON.0, MON.1, MON.2);
        let wed = date(WED.0, WED.1, WED.2);
        let curricula = vec![course("Calculus", WeekParity::Single, Weekday::Mon, hm(10, 0), "Room101")];
        let shifts = vec![ShiftRule {
            course: None,
            source: slot(mon, hm(10, 0), "Room101"),
            target: slot(wed, hm(14, 0), "Room202"),
        }];
        let engine = Engine::new(&curricula, &shifts, ShiftMatch::SlotAndCourse);
        let mut parity = parity_started(mon);

        let monday = engine.resolve_today(mon, &mut parity, RunningSet::new());
        assert!(monday.today.is_empty());
        assert_eq!(monday.running.len(), 1);

        let wednesday = engine.resolve_today(wed, &mut parity, monday.running);
        assert_eq!(wednesday.today.len(), 1);
        let moved = &wednesday.today[0];
        assert_eq!(moved.start, hm(14, 0));
        assert_eq!(moved.place, "Room202");
        assert!(moved.shifted);
    }

    #[test]
    fn later_rule_moves_what_an_earlier_rule_produced() {
        let mon = date(MON.0, MON.1, MON.2);
        let tue = date(2024, 3, 5);
        let curricula = vec![course("Calculus", WeekParity::Single, Weekday::Mon, hm(10, 0), "A")];
        let first = ShiftRule {
            course: None,
            source: slot(mon, hm(10, 0), "A"),
            target: slot(mon, hm(14, 0), "B"),
        };
        let second = ShiftRule {
            course: None,
            source: slot(mon, hm(14, 0), "B"),
            target: slot(tue, hm(9, 0), "C"),
        };

        // A -> B, then B -> C: the class ends up on Tuesday.
        let chained = vec![first.clone(), second.clone()];
        let engine = Engine::new(&curricula, &chained, ShiftMatch::SlotAndCourse);
        let mut parity = parity_started(mon);
        let monday = engine.resolve_today(mon, &mut parity, RunningSet::new());
        assert!(monday.today.is_empty());

        let tuesday = engine.resolve_today(tue, &mut parity, monday.running);
        assert_eq!(tuesday.today.len(), 1);
        assert_eq!(tuesday.today[0].start, hm(9, 0));
        assert_eq!(tuesday.today[0].place, "C");
        assert!(tuesday.today[0].shifted);

        // B -> C runs before anything sits in B, so the class stops there.
        let swapped = vec![second, first];
        let engine = Engine::new(&curricula, &swapped, ShiftMatch::SlotAndCourse);
        let mut parity = parity_started(mon);
        let monday = engine.resolve_today(mon, &mut parity, RunningSet::new());
        assert_eq!(monday.today.len(), 1);
        assert_eq!(monday.today[0].start, hm(14, 0));
        assert_eq!(monday.today[0].place, "B");

        let tuesday = engine.resolve_today(tue, &mut parity, monday.running);
        assert!(tuesday.today.is_empty());
    }

    #[test]
    fn outbound_target_found_without_carried_state() {
        // Process started on Wednesday, never saw Monday's cycle.
        let mon = date(MON.0, MON.1, MON.2);
        let wed = date(WED.0, WED.1, WED.2);
        let curricula = vec![course("Calculus", WeekParity::Single, Weekday::Mon, hm(10, 0), "Room101")];
        let shifts = vec![ShiftRule {
            course: Some("Calculus".to_string()),
            source: slot(mon, hm(10, 0), "Room101"),
            target: slot(wed, hm(14, 0), "Room202"),
        }];
        let engine = Engine::new(&curricula, &shifts, ShiftMatch::SlotAndCourse);
        let mut parity = parity_started(wed);

        let res = engine.resolve_today(wed, &mut parity, RunningSet::new());
        assert_eq!(res.today.len(), 1);
        assert!(res.today[0].shifted);
        assert_eq!(res.today[0].place, "Room202");
    }

    #[test]
    fn inbound_shift_synthesizes_class_on_foreign_weekday() {
        let wed = date(WED.0, WED.1, WED.2);
        let fri = date(FRI.0, FRI.1, FRI.2);
        let curricula = vec![course("Optics", WeekParity::Single, Weekday::Wed, hm(9, 0), "Lab 1")];
        let shifts = vec![ShiftRule {
            course: Some("Optics".to_string()),
            source: slot(wed, hm(9, 0), "Lab 1"),
            target: slot(fri, hm(15, 0), "Lab 2"),
        }];
        let engine = Engine::new(&curricula, &shifts, ShiftMatch::SlotAndCourse);
        let mut parity = parity_started(fri);

        let res = engine.resolve_today(fri, &mut parity, RunningSet::new());
        assert_eq!(res.today.len(), 1);
        let occ = &res.today[0];
        assert_eq!(occ.name, "Optics");
        assert_eq!(occ.date, fri);
        assert_eq!(occ.start, hm(15, 0));
        assert_eq!(occ.place, "Lab 2");
        assert!(occ.shifted);
    }

    #[test]
    fn inbound_shift_respects_source_week_parity() {
        // Source Wednesday lies in the following week, whose parity is Double.
        let fri = date(FRI.0, FRI.1, FRI.2);
        let next_wed = date(2024, 3, 13);
        let curricula = vec![
            course("Optics", WeekParity::Single, Weekday::Wed, hm(9, 0), "Lab 1"),
            course("Acoustics", WeekParity::Double, Weekday::Wed, hm(9, 0), "Lab 1"),
        ];
        let shifts = vec![ShiftRule {
            course: None,
            source: slot(next_wed, hm(9, 0), "Lab 1"),
            target: slot(fri, hm(15, 0), "Lab 2"),
        }];
        let engine = Engine::new(&curricula, &shifts, ShiftMatch::SlotAndCourse);
        let mut parity = parity_started(fri);

        let res = engine.resolve_today(fri, &mut parity, RunningSet::new());
        assert_eq!(res.today.len(), 1);
        assert_eq!(res.today[0].name, "Acoustics");
    }

    #[test]
    fn name_policy_controls_matching() {
        let mon = date(MON.0, MON.1, MON.2);
        let wed = date(WED.0, WED.1, WED.2);
        let curricula = vec![course("Calculus", WeekParity::Single, Weekday::Mon, hm(10, 0), "Room101")];
        let shifts = vec![ShiftRule {
            course: Some("Algebra".to_string()),
            source: slot(mon, hm(10, 0), "Room101"),
            target: slot(wed, hm(14, 0), "Room202"),
        }];

        let strict = Engine::new(&curricula, &shifts, ShiftMatch::SlotAndCourse);
        let res = strict.resolve_today(mon, &mut parity_started(mon), RunningSet::new());
        assert_eq!(res.today.len(), 1, "name mismatch leaves the class in place");

        let loose = Engine::new(&curricula, &shifts, ShiftMatch::SlotOnly);
        let res = loose.resolve_today(mon, &mut parity_started(mon), RunningSet::new());
        assert!(res.today.is_empty());
    }

    #[test]
    fn collisions_collapse_to_one_occurrence() {
        let mon = date(MON.0, MON.1, MON.2);
        let curricula = vec![
            course("Calculus", WeekParity::Single, Weekday::Mon, hm(10, 0), "Room101"),
            course("Physics", WeekParity::Single, Weekday::Mon, hm(14, 0), "Room202"),
        ];
        // Calculus moves into Physics' slot on the same day.
        let shifts = vec![ShiftRule {
            course: None,
            source: slot(mon, hm(10, 0), "Room101"),
            target: slot(mon, hm(14, 0), "Room202"),
        }];
        let engine = Engine::new(&curricula, &shifts, ShiftMatch::SlotAndCourse);
        let res = engine.resolve_today(mon, &mut parity_started(mon), RunningSet::new());
        assert_eq!(res.today.len(), 1);
        assert_eq!(res.running.len(), 1);
    }

    #[test]
    fn repeated_cycles_are_idempotent() {
        let mon = date(MON.0, MON.1, MON.2);
        let fri = date(FRI.0, FRI.1, FRI.2);
        let curricula = vec![
            course("Calculus", WeekParity::Single, Weekday::Fri, hm(10, 0), "Room101"),
            course("Optics", WeekParity::Single, Weekday::Wed, hm(9, 0), "Lab 1"),
        ];
        let shifts = vec![ShiftRule {
            course: None,
            source: slot(date(WED.0, WED.1, WED.2), hm(9, 0), "Lab 1"),
            target: slot(fri, hm(15, 0), "Lab 2"),
        }];
        let engine = Engine::new(&curricula, &shifts, ShiftMatch::SlotAndCourse);
        let mut parity = parity_started(mon);

        let first = engine.resolve_today(fri, &mut parity, RunningSet::new());
        let second = engine.resolve_today(fri, &mut parity, first.running.clone());
        assert_eq!(first.today, second.today);
        assert_eq!(second.today.len(), 2);
        assert_eq!(second.running.len(), first.running.len());
    }

    #[test]
    fn today_is_sorted_by_start_time() {
        let mon = date(MON.0, MON.1, MON.2);
        let curricula = vec![
            course("Late", WeekParity::Single, Weekday::Mon, hm(19, 0), "A"),
            course("Early", WeekParity::Single, Weekday::Mon, hm(8, 0), "B"),
            course("Noon", WeekParity::Single, Weekday::Mon, hm(12, 0), "C"),
        ];
        let engine = Engine::new(&curricula, &[], ShiftMatch::SlotAndCourse);
        let res = engine.resolve_today(mon, &mut parity_started(mon), RunningSet::new());
        let names: Vec<&str> = res.today.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Early", "Noon", "Late"]);
    }

    #[test]
    fn prunes_past_and_keeps_future() {
        let mon = date(MON.0, MON.1, MON.2);
        let wed = date(WED.0, WED.1, WED.2);
        let c = course("Calculus", WeekParity::Single, Weekday::Sun, hm(10, 0), "Room101");
        let running: RunningSet = vec![
            c.materialize(date(2024, 3, 3)),
            c.materialize(wed),
        ]
        .into_iter()
        .collect();
        let engine = Engine::new(&[], &[], ShiftMatch::SlotAndCourse);
        let res = engine.resolve_today(mon, &mut parity_started(date(2024, 3, 1)), running);
        assert!(res.today.is_empty());
        assert_eq!(res.running.len(), 1);
        assert_eq!(res.running.iter().next().unwrap().date, wed);
    }

    #[test]
    fn parity_flips_once_on_monday_after_start() {
        let sat = date(2024, 3, 2);
        let mon = date(MON.0, MON.1, MON.2);
        let curricula = vec![
            course("SingleMon", WeekParity::Single, Weekday::Mon, hm(10, 0), "A"),
            course("DoubleMon", WeekParity::Double, Weekday::Mon, hm(10, 0), "B"),
        ];
        let engine = Engine::new(&curricula, &[], ShiftMatch::SlotAndCourse);
        let mut parity = parity_started(sat);

        let first = engine.resolve_today(mon, &mut parity, RunningSet::new());
        assert!(first.parity_flipped);
        assert_eq!(parity.current, WeekParity::Double);
        assert_eq!(first.today[0].name, "DoubleMon");

        let again = engine.resolve_today(mon, &mut parity, first.running);
        assert!(!again.parity_flipped);
        assert_eq!(parity.current, WeekParity::Double);
    }

    #[test]
    fn no_flip_on_start_monday() {
        let mon = date(MON.0, MON.1, MON.2);
        let mut parity = parity_started(mon);
        assert!(!parity.advance(mon));
        assert_eq!(parity.current, WeekParity::Single);
        assert!(parity.advance(date(2024, 3, 11)));
        assert_eq!(parity.current, WeekParity::Double);
    }

    #[test]
    fn empty_day_resolves_to_nothing() {
        let sun = date(2024, 3, 10);
        let curricula = vec![course("Calculus", WeekParity::Single, Weekday::Mon, hm(10, 0), "Room101")];
        let engine = Engine::new(&curricula, &[], ShiftMatch::SlotAndCourse);
        let res = engine.resolve_today(sun, &mut parity_started(sun), RunningSet::new());
        assert!(res.today.is_empty());
    }
}
