//! JSON-over-HTTP surface.
//!
//! Public routes serve the availability board, the room list, usage report
//! submission and a change stream. Routes under `/v1/admin` edit the room
//! registry, the weekly grid and temporary bookings, and read the usage log;
//! they sit behind [`crate::auth::require_admin`].

pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, AppError};
pub use router::create_router;
pub use state::AppState;
