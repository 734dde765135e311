pub mod health;
pub mod status;
pub mod turns;

use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::middleware::auth::require_admin;
use crate::services::AppState;

/// Envelope shared by every endpoint: `{ success, data, error }`.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub struct ApiError(pub Error);

impl<E> From<E> for ApiError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();

        // Internal detail stays in the log, not on the wire.
        let message = match &self.0 {
            Error::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        // DUPLICATE_PLATE carries the existing turn number so the caller can
        // tell the customer which turn already covers the vehicle.
        let data = match &self.0 {
            Error::DuplicatePlate { turn_number } => json!({ "numeroTurno": turn_number }),
            _ => serde_json::Value::Null,
        };

        let body = Json(json!({
            "success": false,
            "data": data,
            "error": message,
        }));
        (status, body).into_response()
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/api/workshops/:workshop_id/turns", post(turns::create_turn))
        .route(
            "/api/workshops/:workshop_id/status",
            get(status::workshop_status),
        )
        .route(
            "/api/workshops/:workshop_id/turns/cancel-by-plate",
            post(turns::cancel_by_plate),
        )
        .route("/api/turns/:turn_id/cancel", post(turns::cancel_turn))
        .route("/health", get(health::health_check));

    let admin = Router::new()
        .route("/api/workshops", get(status::list_workshops))
        .route("/api/workshops/:workshop_id/turns", get(turns::list_turns))
        .route("/api/turns/:turn_id/finalize", post(turns::finalize_turn))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
