//! Router configuration for the HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;
use crate::{auth, observability};

/// Pasted calendar exports are the largest bodies we accept.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        // Room registry
        .route("/rooms", post(handlers::create_room))
        .route(
            "/rooms/{room}",
            put(handlers::update_room).delete(handlers::delete_room),
        )
        // Weekly schedule
        .route("/recurring", get(handlers::get_recurring_grid))
        .route("/recurring/{day}", put(handlers::submit_grid_day))
        .route(
            "/recurring/{day}/{period}/{room}",
            put(handlers::set_recurring_slot),
        )
        // Temporary bookings
        .route(
            "/bookings",
            get(handlers::list_bookings).post(handlers::add_booking),
        )
        .route("/bookings/import", post(handlers::import_bookings))
        .route(
            "/bookings/{date}/{period}/{room}",
            delete(handlers::cancel_booking),
        )
        // Usage log
        .route("/reports", get(handlers::list_reports))
        .route("/reports/summary", get(handlers::usage_summary))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let api_v1 = Router::new()
        .route("/rooms", get(handlers::list_rooms))
        .route("/availability", get(handlers::get_availability))
        .route("/reports", post(handlers::submit_report))
        .route("/events", get(handlers::stream_events))
        .nest("/admin", admin);

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(middleware::from_fn(observability::track_requests))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
