//! Calendar arithmetic: biweekly parity and wall-clock helpers.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Which of the two alternating weekly timetables is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekParity {
    Single,
    Double,
}

impl WeekParity {
    /// Returns the other parity.
    pub fn flip(self) -> Self {
        match self {
            Self::Single => Self::Double,
            Self::Double => Self::Single,
        }
    }

    pub fn from_is_single(is_single: bool) -> Self {
        if is_single {
            Self::Single
        } else {
            Self::Double
        }
    }

    pub fn is_single(self) -> bool {
        self == Self::Single
    }
}

impl fmt::Display for WeekParity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Double => write!(f, "double"),
        }
    }
}

/// Parity of the week containing `target`, given that the week containing
/// `reference` has parity `parity`.
///
/// The signed day difference is reduced modulo 14 first, so `target` may lie
/// before or after `reference`. Each Monday crossed while walking forward from
/// `reference` toggles the parity once.
pub fn week_offset_parity(reference: NaiveDate, parity: WeekParity, target: NaiveDate) -> WeekParity {
    let days = (target - reference).num_days().rem_euclid(14);
    let weekday = i64::from(reference.weekday().num_days_from_monday());
    if ((weekday + days) / 7) % 2 == 0 {
        parity
    } else {
        parity.flip()
    }
}

/// Parses a clock time string (HH:MM) such as "08:00" or "9:30".
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hours: u32 = parts[0].trim().parse().ok()?;
    let minutes: u32 = parts[1].trim().parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Formats a clock time as HH:MM.
pub fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Builds a fixed UTC offset from a minute count (e.g. 480 for UTC+08:00).
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

/// Combines a local date and wall-clock time in the given offset.
pub fn at_local(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    let local = date.and_time(time);
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    offset.from_utc_datetime(&utc)
}

/// Serde adapter for `NaiveTime` written as "HH:MM".
pub mod clock_format {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_clock(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid clock time '{raw}', expected HH:MM")))
    }

    /// Same format for optional fields.
    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => serializer.serialize_some(&super::super::format_clock(*time)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|raw| {
                super::super::parse_clock(&raw)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid clock time '{raw}', expected HH:MM")))
            })
            .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn zero_offset_keeps_parity() {
        // 2024-03-06 is a Wednesday.
        let wed = date(2024, 3, 6);
        assert_eq!(week_offset_parity(wed, WeekParity::Single, wed), WeekParity::Single);
        assert_eq!(week_offset_parity(wed, WeekParity::Double, wed), WeekParity::Double);
    }

    #[test]
    fn same_week_keeps_parity_next_week_flips() {
        let mon = date(2024, 3, 4);
        let sun = date(2024, 3, 10);
        let next_mon = date(2024, 3, 11);
        assert_eq!(week_offset_parity(mon, WeekParity::Single, sun), WeekParity::Single);
        assert_eq!(week_offset_parity(mon, WeekParity::Single, next_mon), WeekParity::Double);
        assert_eq!(week_offset_parity(sun, WeekParity::Single, next_mon), WeekParity::Double);
    }

    #[test]
    fn fourteen_day_span_returns_to_start() {
        let start = date(2024, 3, 6);
        for offset in 0..14 {
            let there = start + Duration::days(offset);
            let back = there + Duration::days(14);
            let p = week_offset_parity(start, WeekParity::Single, there);
            assert_eq!(week_offset_parity(start, WeekParity::Single, back), p);
        }
        let two_weeks = start + Duration::days(14);
        assert_eq!(week_offset_parity(start, WeekParity::Double, two_weeks), WeekParity::Double);
    }

    #[test]
    fn looks_backwards() {
        // Wednesday, looking back to the previous week's Friday.
        let wed = date(2024, 3, 6);
        let prev_fri = date(2024, 3, 1);
        let prev_prev_fri = date(2024, 2, 23);
        assert_eq!(week_offset_parity(wed, WeekParity::Single, prev_fri), WeekParity::Double);
        assert_eq!(week_offset_parity(wed, WeekParity::Single, prev_prev_fri), WeekParity::Single);
    }

    #[test]
    fn late_weekday_two_weeks_ahead_keeps_parity() {
        let sun = date(2024, 3, 10);
        let sat_after_next = sun + Duration::days(13);
        assert_eq!(week_offset_parity(sun, WeekParity::Single, sat_after_next), WeekParity::Single);
        // Eight days on from a Sunday crosses two Mondays.
        let mon_after_next = date(2024, 3, 18);
        assert_eq!(week_offset_parity(sun, WeekParity::Single, mon_after_next), WeekParity::Single);
    }

    #[test]
    fn parses_clock_times() {
        assert_eq!(parse_clock("08:00"), NaiveTime::from_hms_opt(8, 0, 0));
        assert_eq!(parse_clock(" 9:30 "), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_clock("24:00"), None);
        assert_eq!(parse_clock("8"), None);
        assert_eq!(format_clock(NaiveTime::from_hms_opt(7, 5, 0).unwrap()), "07:05");
    }

    #[test]
    fn at_local_respects_offset() {
        let offset = offset_from_minutes(480).unwrap();
        let at = at_local(date(2024, 3, 6), NaiveTime::from_hms_opt(8, 45, 0).unwrap(), offset);
        assert_eq!(at.hour(), 8);
        assert_eq!(at.minute(), 45);
        assert_eq!(at.naive_utc().hour(), 0);
    }
}
