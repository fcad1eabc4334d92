//! HTTP handlers for the REST API.
//!
//! Each handler parses its request, calls into the engine and wraps the
//! result. Dates that the caller leaves out default to the server's local
//! date.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    Json,
};
use chrono::{Local, NaiveDate};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;

use super::dto::*;
use super::error::AppError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::state::AppState;
use crate::model::*;
use crate::schedule::{parse_import_text, period_end, period_start};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn day_param(n: u8) -> Result<DayOfWeek, AppError> {
    DayOfWeek::new(n).ok_or_else(|| AppError::BadRequest(format!("day must be 1..=7, got {n}")))
}

fn period_param(n: u8) -> Result<Period, AppError> {
    Period::new(n).ok_or_else(|| AppError::BadRequest(format!("period must be 1..=6, got {n}")))
}

// =============================================================================
// Public
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        rooms: state.engine.room_count(),
        subscribers: state.engine.notify.subscriber_count(),
    }))
}

/// GET /v1/rooms
pub async fn list_rooms(State(state): State<AppState>) -> HandlerResult<RoomListResponse> {
    let rooms = state.engine.list_rooms().await;
    let total = rooms.len();
    Ok(Json(RoomListResponse { rooms, total }))
}

/// GET /v1/availability?date=YYYY-MM-DD&period=N
///
/// Rooms grouped by floor with their occupancy. One board when a period is
/// given, six otherwise.
pub async fn get_availability(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> HandlerResult<AvailabilityResponse> {
    let date = query.date.unwrap_or_else(today);
    let boards = match query.period {
        Some(period) => vec![PeriodBoard {
            period,
            floors: state.engine.availability_board(date, period).await,
        }],
        None => state.engine.day_board(date).await,
    };
    Ok(Json(AvailabilityResponse { date, boards }))
}

/// POST /v1/reports
///
/// Record a usage report, dated today.
pub async fn submit_report(
    State(state): State<AppState>,
    ApiJson(submission): ApiJson<ReportSubmission>,
) -> Result<(StatusCode, Json<UsageReport>), AppError> {
    let report = state.engine.submit_report(submission, today()).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::RoomCreated { .. } => "room_created",
        Event::RoomUpdated { .. } => "room_updated",
        Event::RoomDeleted { .. } => "room_deleted",
        Event::SlotSet { .. } => "slot_set",
        Event::SlotCleared { .. } => "slot_cleared",
        Event::BookingAdded { .. } => "booking_added",
        Event::BookingRemoved { .. } => "booking_removed",
        Event::ReportSubmitted { .. } => "report_submitted",
    }
}

/// GET /v1/events
///
/// Server-sent stream of every committed change. A subscriber that falls
/// behind gets a `lagged` event with the number of changes it missed.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let mut rx = state.engine.notify.subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(SseEvent::default().event(event_name(&event)).data(data));
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("event subscriber lagged by {missed}");
                    yield Ok(SseEvent::default().event("lagged").data(missed.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Admin: rooms
// =============================================================================

/// POST /v1/admin/rooms
pub async fn create_room(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomInfo>), AppError> {
    let info = RoomInfo {
        number: request.number.clone(),
        capacity: request.capacity,
    };
    state.engine.create_room(request.number, request.capacity).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// PUT /v1/admin/rooms/{room}
pub async fn update_room(
    State(state): State<AppState>,
    ApiPath(room): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateRoomRequest>,
) -> HandlerResult<RoomInfo> {
    state.engine.update_room(&room, request.capacity).await?;
    Ok(Json(RoomInfo {
        number: room,
        capacity: request.capacity,
    }))
}

/// DELETE /v1/admin/rooms/{room}
pub async fn delete_room(
    State(state): State<AppState>,
    ApiPath(room): ApiPath<String>,
) -> Result<StatusCode, AppError> {
    state.engine.delete_room(&room).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Admin: weekly schedule
// =============================================================================

/// GET /v1/admin/recurring
pub async fn get_recurring_grid(
    State(state): State<AppState>,
) -> HandlerResult<RecurringGridResponse> {
    let periods = Period::all()
        .map(|period| PeriodTime {
            period,
            start: period_start(period),
            end: period_end(period),
        })
        .collect();
    Ok(Json(RecurringGridResponse {
        periods,
        rooms: state.engine.recurring_grid().await,
    }))
}

/// PUT /v1/admin/recurring/{day}
pub async fn submit_grid_day(
    State(state): State<AppState>,
    ApiPath(day): ApiPath<u8>,
    ApiJson(request): ApiJson<GridDayRequest>,
) -> HandlerResult<GridUpdateSummary> {
    let day = day_param(day)?;
    Ok(Json(state.engine.submit_grid_day(day, &request.columns).await?))
}

/// PUT /v1/admin/recurring/{day}/{period}/{room}
///
/// An empty comment clears the slot.
pub async fn set_recurring_slot(
    State(state): State<AppState>,
    ApiPath((day, period, room)): ApiPath<(u8, u8, String)>,
    ApiJson(request): ApiJson<SlotRequest>,
) -> HandlerResult<ChangeResponse> {
    let change = state
        .engine
        .set_recurring_comment(day_param(day)?, period_param(period)?, &room, &request.comment)
        .await?;
    Ok(Json(ChangeResponse { change }))
}

// =============================================================================
// Admin: temporary bookings
// =============================================================================

/// GET /v1/admin/bookings?date=&room=
pub async fn list_bookings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BookingsQuery>,
) -> HandlerResult<Vec<TemporaryBooking>> {
    Ok(Json(
        state
            .engine
            .temporary_bookings(query.date, query.room.as_deref())
            .await,
    ))
}

/// POST /v1/admin/bookings
pub async fn add_booking(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BookingRequest>,
) -> HandlerResult<ChangeResponse> {
    let change = state
        .engine
        .add_temporary_booking(&request.room, request.date, request.period, request.reserved_by)
        .await?;
    Ok(Json(ChangeResponse { change }))
}

/// DELETE /v1/admin/bookings/{date}/{period}/{room}
pub async fn cancel_booking(
    State(state): State<AppState>,
    ApiPath((date, period, room)): ApiPath<(NaiveDate, u8, String)>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .cancel_temporary_booking(&room, date, period_param(period)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/admin/bookings/import
///
/// Body is `{"rows": [...]}` or `{"text": "..."}` with pasted export lines.
pub async fn import_bookings(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ImportRequest>,
) -> HandlerResult<ImportReport> {
    let report = match (request.rows, request.text) {
        (Some(rows), None) => state.engine.import_bookings(&rows).await?,
        (None, Some(text)) => state.engine.import_pasted(parse_import_text(&text)).await?,
        _ => {
            return Err(AppError::BadRequest(
                "expected exactly one of \"rows\" or \"text\"".into(),
            ))
        }
    };
    Ok(Json(report))
}

// =============================================================================
// Admin: usage reports
// =============================================================================

/// GET /v1/admin/reports?room=&date=
pub async fn list_reports(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportsQuery>,
) -> HandlerResult<Vec<UsageReport>> {
    Ok(Json(
        state
            .engine
            .usage_reports(query.room.as_deref(), query.date)
            .await,
    ))
}

/// GET /v1/admin/reports/summary
pub async fn usage_summary(State(state): State<AppState>) -> HandlerResult<Vec<UsageSummary>> {
    Ok(Json(state.engine.usage_summary().await))
}
