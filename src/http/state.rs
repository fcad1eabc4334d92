//! Application state for the HTTP server.

use std::sync::Arc;

use crate::engine::Engine;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Bearer token the admin routes expect.
    pub admin_token: Arc<str>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, admin_token: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            admin_token: admin_token.into(),
        }
    }
}
