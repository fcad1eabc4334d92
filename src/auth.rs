use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::http::{AppError, AppState};

/// Whether an `Authorization` header value carries `token` as a bearer token.
pub fn bearer_matches(header: Option<&str>, token: &str) -> bool {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|presented| !token.is_empty() && presented.trim() == token)
}

/// Gate for the admin routes.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if !bearer_matches(header, &state.admin_token) {
        metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
        tracing::warn!(path = %request.uri().path(), "admin request without a valid token");
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}
