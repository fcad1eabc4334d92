//! Request and response bodies for the HTTP API.
//!
//! Engine query types already derive `Serialize` and are returned as they
//! are; the structs here cover request shapes and list envelopes.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::model::{Change, GridRow, Period, PeriodBoard, RoomInfo};
use crate::schedule::ImportRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rooms: usize,
    /// Open `/v1/events` streams.
    pub subscribers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomInfo>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub number: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoomRequest {
    pub capacity: u32,
}

/// `GET /v1/availability` query. Today when `date` is missing; all six
/// periods when `period` is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<NaiveDate>,
    pub period: Option<Period>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub boards: Vec<PeriodBoard>,
}

/// Start and end of one period, for labelling the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodTime {
    pub period: Period,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringGridResponse {
    pub periods: Vec<PeriodTime>,
    pub rooms: Vec<GridRow>,
}

/// One weekday of the grid: `columns[p - 1]` lists period `p`'s comments in
/// room-number order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridDayRequest {
    pub columns: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRequest {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeResponse {
    pub change: Change,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub room: String,
    pub date: NaiveDate,
    pub period: Period,
    #[serde(default)]
    pub reserved_by: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingsQuery {
    pub date: Option<NaiveDate>,
    pub room: Option<String>,
}

/// Either structured rows or text pasted from a calendar export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportRequest {
    pub rows: Option<Vec<ImportRow>>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportsQuery {
    pub room: Option<String>,
    pub date: Option<NaiveDate>,
}
