//! Admin gate for the back-office routes. Stands in for the session layer of
//! the full deployment: requests present a bearer token which is compared to
//! the configured one in constant time.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::Error;
use crate::handlers::ApiError;
use crate::services::AppState;

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match header {
        Some(header) if header.starts_with("Bearer ") => {
            let token = &header[7..];
            if token_matches(token, &state.config.admin_token) {
                Ok(next.run(request).await)
            } else {
                Err(ApiError(Error::Unauthenticated))
            }
        }
        _ => Err(ApiError(Error::Unauthenticated)),
    }
}

fn token_matches(provided: &str, expected: &str) -> bool {
    // An unset token keeps the gated routes closed rather than open.
    if expected.is_empty() {
        return false;
    }
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
