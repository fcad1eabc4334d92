//! The fixed period clock and parsing of pasted calendar exports into
//! period-granular bookings.
//!
//! A calendar export row is a triple of text fields:
//!
//! ```text
//! Main Building F301    2024/05/13 10:50    2024/05/13 15:00
//! ```
//!
//! which becomes a booking of room `F301` on 2024-05-13 for periods 2 and 3.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::limits::MAX_IMPORT_LABEL_LEN;
use crate::model::{Period, RejectedRow};

/// `(start, end)` of each period as `(hour, minute)`.
const PERIOD_CLOCK: [((u32, u32), (u32, u32)); Period::COUNT as usize] = [
    ((9, 0), (10, 40)),
    ((10, 50), (12, 30)),
    ((13, 20), (15, 0)),
    ((15, 10), (16, 50)),
    ((17, 0), (18, 40)),
    ((18, 50), (20, 30)),
];

fn clock((h, m): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

pub fn period_start(period: Period) -> NaiveTime {
    clock(PERIOD_CLOCK[period.index()].0)
}

pub fn period_end(period: Period) -> NaiveTime {
    clock(PERIOD_CLOCK[period.index()].1)
}

pub fn period_starting_at(t: NaiveTime) -> Option<Period> {
    Period::all().find(|p| period_start(*p) == t)
}

pub fn period_ending_at(t: NaiveTime) -> Option<Period> {
    Period::all().find(|p| period_end(*p) == t)
}

/// Inclusive run of periods from `start` through `end`.
pub fn expand_periods(start: Period, end: Period) -> Result<Vec<Period>, ScheduleError> {
    if end < start {
        return Err(ScheduleError::Backwards { start, end });
    }
    Ok(Period::all().filter(|p| (start..=end).contains(p)).collect())
}

pub fn parse_clock(s: &str) -> Result<NaiveTime, ScheduleError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ScheduleError::BadClock(s.to_string()))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ScheduleError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| ScheduleError::BadDate(s.to_string()))
}

/// `"2024/05/13 9:00"` → date and clock time.
pub fn parse_stamp(s: &str) -> Result<(NaiveDate, NaiveTime), ScheduleError> {
    let mut parts = s.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(time), None) => Ok((parse_date(date)?, parse_clock(time)?)),
        _ => Err(ScheduleError::BadStamp(s.trim().to_string())),
    }
}

/// Pull the room number off the end of a calendar location label.
///
/// Numbers are either four characters with an `F` (floor) or `H` (hall)
/// marker in front, like `F301` or `H201`, or six characters otherwise.
/// Labels shorter than that are taken whole.
pub fn extract_room_number(label: &str) -> Option<String> {
    let chars: Vec<char> = label.trim().chars().collect();
    let n = chars.len();
    if n == 0 {
        return None;
    }
    let take = if n >= 4 && matches!(chars[n - 4], 'F' | 'H') {
        4
    } else {
        n.min(6)
    };
    Some(chars[n - take..].iter().collect())
}

/// One raw row of a calendar export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    pub room: String,
    pub start: String,
    pub finish: String,
}

/// An import row resolved to a room, a date and the periods it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBooking {
    pub room: String,
    pub date: NaiveDate,
    pub periods: Vec<Period>,
}

pub fn parse_row(row: &ImportRow) -> Result<ParsedBooking, ScheduleError> {
    if row.room.len() > MAX_IMPORT_LABEL_LEN {
        return Err(ScheduleError::LabelTooLong);
    }
    let room = extract_room_number(&row.room)
        .ok_or_else(|| ScheduleError::BadRoomLabel(row.room.clone()))?;
    let (date, start_time) = parse_stamp(&row.start)?;
    let (finish_date, finish_time) = parse_stamp(&row.finish)?;
    if finish_date != date {
        return Err(ScheduleError::DateMismatch {
            start: date,
            finish: finish_date,
        });
    }
    let start = period_starting_at(start_time)
        .ok_or_else(|| ScheduleError::NotAPeriodStart(start_time.format("%H:%M").to_string()))?;
    let end = period_ending_at(finish_time)
        .ok_or_else(|| ScheduleError::NotAPeriodEnd(finish_time.format("%H:%M").to_string()))?;
    Ok(ParsedBooking {
        room,
        date,
        periods: expand_periods(start, end)?,
    })
}

/// Rows up to (not including) the first one with a blank room label; the
/// rest of a pasted export below that point is ignored.
pub fn rows_until_blank(rows: &[(usize, ImportRow)]) -> &[(usize, ImportRow)] {
    let end = rows
        .iter()
        .position(|(_, r)| r.room.trim().is_empty())
        .unwrap_or(rows.len());
    &rows[..end]
}

/// Pasted export text split into rows, each tagged with its 1-based line in
/// the text, plus the lines that did not split into three fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PastedImport {
    pub rows: Vec<(usize, ImportRow)>,
    pub rejected: Vec<RejectedRow>,
}

/// Split pasted text into rows: one per line, fields separated by tabs (or
/// commas when a line has no tab). Blank lines are skipped but still count
/// towards line numbers.
pub fn parse_import_text(text: &str) -> PastedImport {
    let mut pasted = PastedImport::default();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let sep = if line.contains('\t') { '\t' } else { ',' };
        let fields: Vec<&str> = line.split(sep).map(str::trim).collect();
        let [room, start, finish] = fields.as_slice() else {
            pasted.rejected.push(RejectedRow {
                line: i + 1,
                reason: ScheduleError::FieldCount { got: fields.len() }.to_string(),
            });
            continue;
        };
        pasted.rows.push((
            i + 1,
            ImportRow {
                room: room.to_string(),
                start: start.to_string(),
                finish: finish.to_string(),
            },
        ));
    }
    pasted
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    BadDate(String),
    BadClock(String),
    BadStamp(String),
    BadRoomLabel(String),
    LabelTooLong,
    NotAPeriodStart(String),
    NotAPeriodEnd(String),
    Backwards { start: Period, end: Period },
    DateMismatch { start: NaiveDate, finish: NaiveDate },
    FieldCount { got: usize },
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::BadDate(s) => write!(f, "invalid date: {s:?}"),
            ScheduleError::BadClock(s) => write!(f, "invalid time: {s:?}"),
            ScheduleError::BadStamp(s) => write!(f, "expected \"<date> <time>\", got {s:?}"),
            ScheduleError::BadRoomLabel(s) => write!(f, "no room number in {s:?}"),
            ScheduleError::LabelTooLong => write!(f, "room label too long"),
            ScheduleError::NotAPeriodStart(t) => write!(f, "{t} is not the start of a period"),
            ScheduleError::NotAPeriodEnd(t) => write!(f, "{t} is not the end of a period"),
            ScheduleError::Backwards { start, end } => {
                write!(f, "period range ends ({end}) before it starts ({start})")
            }
            ScheduleError::DateMismatch { start, finish } => {
                write!(f, "start date {start} and finish date {finish} differ")
            }
            ScheduleError::FieldCount { got } => write!(f, "expected 3 fields, got {got}"),
        }
    }
}

impl std::error::Error for ScheduleError {}
