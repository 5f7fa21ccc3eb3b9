use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Weekday};
use csv::{ReaderBuilder, StringRecord, Trim};
use regex::Regex;
use tracing::{debug, warn};

use crate::calendar::{parse_clock, WeekParity};
use crate::curriculum::{Curriculum, ShiftRule, SlotDescriptor};
use crate::error::{Error, Result};

const CHINESE_WEEKDAYS: [(&str, Weekday); 7] = [
    ("一", Weekday::Mon),
    ("二", Weekday::Tue),
    ("三", Weekday::Wed),
    ("四", Weekday::Thu),
    ("五", Weekday::Fri),
    ("六", Weekday::Sat),
    ("日", Weekday::Sun),
];

/// Parses the parity column ("单"/"双" or "single"/"double")
fn parse_parity(value: &str) -> Option<WeekParity> {
    match value.trim().to_lowercase().as_str() {
        "单" | "单周" | "single" | "s" => Some(WeekParity::Single),
        "双" | "双周" | "double" | "d" => Some(WeekParity::Double),
        _ => None,
    }
}

/// Parses a weekday name such as "周三", "星期三", "Wed" or "wednesday"
fn parse_weekday(value: &str) -> Option<Weekday> {
    let trimmed = value.trim();
    let suffix = trimmed
        .strip_prefix("周")
        .or_else(|| trimmed.strip_prefix("星期"));
    if let Some(suffix) = suffix {
        if suffix == "天" {
            return Some(Weekday::Sun);
        }
        return CHINESE_WEEKDAYS
            .iter()
            .find(|(name, _)| *name == suffix)
            .map(|(_, day)| *day);
    }
    Weekday::from_str(trimmed).ok()
}

/// Splits a student list on "、" or ";"
fn parse_students(value: &str) -> Vec<String> {
    value
        .split(|c: char| matches!(c, '、' | ';' | '；'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses "YYYY-MM-DD"
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Timetable row parser. Holds the compiled patterns shared by every row.
pub struct CurriculumParser {
    numbers: Regex,
    course: Regex,
}

impl CurriculumParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            numbers: Regex::new(r"\d{1,2}")?,
            course: Regex::new(r"^(.+?)\s*[（(]\s*([^）)]+?)\s*[）)]\s*$")?,
        })
    }

    /// Parses a time range such as "上午9:00-11:30", "下午2:00-3:30" or "2:00-3:30 PM".
    ///
    /// An afternoon/evening marker moves hours before noon into the afternoon;
    /// without any marker the hours are taken as 24-hour clock values.
    pub fn parse_time_range(&self, value: &str) -> Option<(NaiveTime, NaiveTime)> {
        let numbers: Vec<u32> = self
            .numbers
            .find_iter(value)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        if numbers.len() != 4 {
            return None;
        }

        let lower = value.to_lowercase();
        let morning = value.contains("上午") || lower.contains("am");
        let afternoon = !morning && (value.contains("下午") || value.contains("晚上") || lower.contains("pm"));
        let hour = |h: u32| if afternoon && h < 12 { h + 12 } else { h };

        let start = NaiveTime::from_hms_opt(hour(numbers[0]), numbers[1], 0)?;
        let end = NaiveTime::from_hms_opt(hour(numbers[2]), numbers[3], 0)?;
        if end <= start {
            return None;
        }
        Some((start, end))
    }

    /// Splits "Course（Teacher）" into course name and teacher.
    pub fn parse_course(&self, value: &str) -> Option<(String, String)> {
        let captures = self.course.captures(value.trim())?;
        Some((captures[1].to_string(), captures[2].to_string()))
    }

    fn parse_record(&self, record: &StringRecord) -> std::result::Result<Curriculum, String> {
        if record.len() < 6 {
            return Err(format!("expected 6 columns, found {}", record.len()));
        }
        let field = |i: usize| record.get(i).unwrap_or("");

        let parity = parse_parity(field(0)).ok_or_else(|| format!("unknown week parity '{}'", field(0)))?;
        let weekday = parse_weekday(field(1)).ok_or_else(|| format!("unknown weekday '{}'", field(1)))?;
        let (start, end) = self
            .parse_time_range(field(2))
            .ok_or_else(|| format!("invalid time range '{}'", field(2)))?;
        let place = field(3).to_string();
        if place.is_empty() {
            return Err("place is empty".to_string());
        }
        let (name, teacher) = self
            .parse_course(field(4))
            .ok_or_else(|| format!("expected 'Course（Teacher）', found '{}'", field(4)))?;
        let students = parse_students(field(5));

        Ok(Curriculum {
            parity,
            weekday,
            start,
            end,
            place,
            name,
            teacher,
            students,
        })
    }
}

fn reader_for<P: AsRef<Path>>(path: P) -> Result<csv::Reader<std::fs::File>> {
    Ok(ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?)
}

/// Loads the recurring timetable.
///
/// Each row is `parity,weekday,time range,place,Course（Teacher）,students`.
/// Any malformed row fails the whole load; a timetable is never partially loaded.
pub fn load_curricula<P: AsRef<Path>>(path: P) -> Result<Vec<Curriculum>> {
    let path = path.as_ref();
    let parser = CurriculumParser::new()?;
    let mut reader = reader_for(path)?;
    let mut curricula = Vec::new();

    for result in reader.records() {
        let record = result?;
        // Skip blank lines
        if record.iter().all(str::is_empty) {
            continue;
        }
        let curriculum = parser.parse_record(&record).map_err(|reason| Error::Parse {
            path: path.to_path_buf(),
            line: line_of(&record),
            reason,
        })?;
        curricula.push(curriculum);
    }

    debug!(path = %path.display(), count = curricula.len(), "loaded curricula");
    Ok(curricula)
}

fn parse_slot(fields: &[&str]) -> std::result::Result<SlotDescriptor, String> {
    let date = parse_date(fields[0]).ok_or_else(|| format!("invalid date '{}'", fields[0]))?;
    let start = parse_clock(fields[1]).ok_or_else(|| format!("invalid start time '{}'", fields[1]))?;
    let end = parse_clock(fields[2]).ok_or_else(|| format!("invalid end time '{}'", fields[2]))?;
    Ok(SlotDescriptor {
        date,
        start,
        end,
        place: fields[3].to_string(),
    })
}

fn parse_shift_record(record: &StringRecord) -> std::result::Result<ShiftRule, String> {
    let fields: Vec<&str> = record.iter().collect();
    // 9 columns carry a leading course name; the older layout has 8.
    let (course, slots) = match fields.len() {
        9 => {
            let course = Some(fields[0].to_string()).filter(|c| !c.is_empty());
            (course, &fields[1..])
        }
        8 => (None, &fields[..]),
        n => return Err(format!("expected 8 or 9 columns, found {n}")),
    };
    Ok(ShiftRule {
        course,
        source: parse_slot(&slots[0..4])?,
        target: parse_slot(&slots[4..8])?,
    })
}

/// Loads the shift table, keeping file order.
///
/// Each row is `[course,]date,start,end,place,date,start,end,place` with the
/// source slot first and the target slot second.
pub fn load_shifts<P: AsRef<Path>>(path: P) -> Result<Vec<ShiftRule>> {
    let path = path.as_ref();
    let mut reader = reader_for(path)?;
    let mut shifts = Vec::new();

    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let rule = parse_shift_record(&record).map_err(|reason| Error::Parse {
            path: path.to_path_buf(),
            line: line_of(&record),
            reason,
        })?;
        shifts.push(rule);
    }

    debug!(path = %path.display(), count = shifts.len(), "loaded shift rules");
    Ok(shifts)
}

/// Loads the filler-message corpus: one message per non-empty line.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Runs `loader` on `path`, treating a missing file as an empty list.
pub fn load_optional<T, P, F>(path: P, loader: F) -> Result<Vec<T>>
where
    P: AsRef<Path>,
    F: FnOnce(&Path) -> Result<Vec<T>>,
{
    let path = path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "data file not found, treating as empty");
        return Ok(Vec::new());
    }
    loader(path)
}
