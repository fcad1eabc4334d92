use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// One of the six fixed daily class periods, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Period(u8);

impl Period {
    pub const COUNT: u8 = 6;

    pub fn new(n: u8) -> Option<Self> {
        (1..=Self::COUNT).contains(&n).then_some(Self(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position, for indexing per-period arrays.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn all() -> impl Iterator<Item = Period> {
        (1..=Self::COUNT).map(Period)
    }
}

impl TryFrom<u8> for Period {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Period::new(n).ok_or_else(|| format!("period must be 1..={}, got {n}", Period::COUNT))
    }
}

impl From<Period> for u8 {
    fn from(p: Period) -> u8 {
        p.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Day of the week, Monday = 1 through Sunday = 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub const COUNT: u8 = 7;

    pub fn new(n: u8) -> Option<Self> {
        (1..=Self::COUNT).contains(&n).then_some(Self(n))
    }

    pub fn of(date: NaiveDate) -> Self {
        Self(date.weekday().number_from_monday() as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn all() -> impl Iterator<Item = DayOfWeek> {
        (1..=Self::COUNT).map(DayOfWeek)
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        DayOfWeek::new(n).ok_or_else(|| format!("day must be 1..={}, got {n}", DayOfWeek::COUNT))
    }
}

impl From<DayOfWeek> for u8 {
    fn from(d: DayOfWeek) -> u8 {
        d.0
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Noise rating a student gives after using a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NoiseLevel {
    Empty = 1,
    FewQuiet = 2,
    CrowdedQuiet = 3,
    Normal = 4,
    FewNoisy = 5,
    CrowdedNoisy = 6,
}

impl NoiseLevel {
    pub fn new(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Empty),
            2 => Some(Self::FewQuiet),
            3 => Some(Self::CrowdedQuiet),
            4 => Some(Self::Normal),
            5 => Some(Self::FewNoisy),
            6 => Some(Self::CrowdedNoisy),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Empty => "nobody was there",
            Self::FewQuiet => "a few people, quiet",
            Self::CrowdedQuiet => "crowded, quiet",
            Self::Normal => "normal",
            Self::FewNoisy => "a few people, noisy",
            Self::CrowdedNoisy => "crowded, noisy",
        }
    }
}

impl TryFrom<u8> for NoiseLevel {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        NoiseLevel::new(n).ok_or_else(|| format!("noise level must be 1..=6, got {n}"))
    }
}

impl From<NoiseLevel> for u8 {
    fn from(n: NoiseLevel) -> u8 {
        n as u8
    }
}

/// A post-use review submitted by a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub id: Ulid,
    pub student: String,
    pub room: String,
    pub period: Period,
    pub date: NaiveDate,
    pub occupancy: u32,
    pub noise: NoiseLevel,
}

/// Everything reserved against one room: its weekly schedule and its
/// date-specific bookings.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub number: String,
    pub capacity: u32,
    /// Weekly slots; the comment is never empty.
    pub recurring: BTreeMap<(DayOfWeek, Period), String>,
    /// Date-specific bookings → `reserved_by` (0 = administrative).
    pub temporary: BTreeMap<(NaiveDate, Period), u32>,
}

impl RoomState {
    pub fn new(number: String, capacity: u32) -> Self {
        Self {
            number,
            capacity,
            recurring: BTreeMap::new(),
            temporary: BTreeMap::new(),
        }
    }

    pub fn recurring_comment(&self, day: DayOfWeek, period: Period) -> Option<&str> {
        self.recurring.get(&(day, period)).map(String::as_str)
    }

    pub fn booking(&self, date: NaiveDate, period: Period) -> Option<u32> {
        self.temporary.get(&(date, period)).copied()
    }

    /// Bookings on a single date, in period order.
    pub fn bookings_on(&self, date: NaiveDate) -> impl Iterator<Item = (Period, u32)> + '_ {
        self.temporary
            .range((date, Period(1))..)
            .take_while(move |((d, _), _)| *d == date)
            .map(|((_, p), r)| (*p, *r))
    }

    /// Keys of bookings dated strictly before `cutoff`.
    pub fn bookings_before(&self, cutoff: NaiveDate) -> Vec<(NaiveDate, Period)> {
        self.temporary
            .keys()
            .take_while(|(d, _)| *d < cutoff)
            .copied()
            .collect()
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            number: self.number.clone(),
            capacity: self.capacity,
        }
    }
}

/// Journal events, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        number: String,
        capacity: u32,
    },
    RoomUpdated {
        number: String,
        capacity: u32,
    },
    RoomDeleted {
        number: String,
    },
    SlotSet {
        room: String,
        day: DayOfWeek,
        period: Period,
        comment: String,
    },
    SlotCleared {
        room: String,
        day: DayOfWeek,
        period: Period,
    },
    BookingAdded {
        room: String,
        date: NaiveDate,
        period: Period,
        reserved_by: u32,
    },
    BookingRemoved {
        room: String,
        date: NaiveDate,
        period: Period,
    },
    ReportSubmitted {
        report: UsageReport,
    },
}

impl Event {
    /// The room an event touches.
    pub fn room(&self) -> &str {
        match self {
            Event::RoomCreated { number, .. }
            | Event::RoomUpdated { number, .. }
            | Event::RoomDeleted { number } => number,
            Event::SlotSet { room, .. }
            | Event::SlotCleared { room, .. }
            | Event::BookingAdded { room, .. }
            | Event::BookingRemoved { room, .. } => room,
            Event::ReportSubmitted { report } => &report.room,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub number: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringSlot {
    pub day: DayOfWeek,
    pub period: Period,
    pub room: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryBooking {
    pub room: String,
    pub period: Period,
    pub date: NaiveDate,
    pub reserved_by: u32,
}

/// Why a room is or is not usable for a given date and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Occupancy {
    Free,
    Recurring { comment: String },
    Temporary { reserved_by: u32 },
}

impl Occupancy {
    pub fn is_free(&self) -> bool {
        matches!(self, Occupancy::Free)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatus {
    pub number: String,
    pub capacity: u32,
    pub floor: u8,
    pub occupancy: Occupancy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorGroup {
    pub floor: u8,
    pub rooms: Vec<RoomStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBoard {
    pub period: Period,
    pub floors: Vec<FloorGroup>,
}

/// One room's row of the weekly grid: `comments[day - 1][period - 1]`,
/// empty string where no slot exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRow {
    pub room: String,
    pub capacity: u32,
    pub comments: Vec<Vec<String>>,
}

/// Outcome of a single upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Created,
    Updated,
    Cleared,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridUpdateSummary {
    pub created: usize,
    pub updated: usize,
    pub cleared: usize,
    pub unchanged: usize,
}

impl GridUpdateSummary {
    pub fn record(&mut self, change: Change) {
        match change {
            Change::Created => self.created += 1,
            Change::Updated => self.updated += 1,
            Change::Cleared => self.cleared += 1,
            Change::Unchanged => self.unchanged += 1,
        }
    }
}

/// What a student fills in after using a room; the date is stamped by the
/// server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSubmission {
    pub student: String,
    pub room: String,
    pub period: Period,
    pub occupancy: u32,
    pub noise: NoiseLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based row of a structured submission, or line of pasted text.
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub rows_read: usize,
    pub created: usize,
    pub already_present: usize,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub room: String,
    pub reports: usize,
    pub mean_occupancy: f64,
    pub mean_noise: f64,
    /// Label of the noise level nearest the mean.
    pub noise_label: String,
}
