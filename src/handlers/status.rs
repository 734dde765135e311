use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{ApiError, ApiResponse};
use crate::models::TurnSummary;
use crate::services::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub taller: String,
    pub capacidad: i32,
    #[serde(rename = "enTaller")]
    pub in_service: Vec<TurnSummary>,
    #[serde(rename = "enEspera")]
    pub waiting: Vec<TurnSummary>,
}

#[derive(Serialize)]
pub struct WorkshopView {
    pub id: Uuid,
    pub nombre: String,
    pub direccion: Option<String>,
    pub logo: Option<String>,
    pub capacidad: i32,
}

#[derive(Serialize)]
pub struct WorkshopList {
    pub talleres: Vec<WorkshopView>,
}

pub async fn workshop_status(
    State(state): State<Arc<AppState>>,
    Path(workshop_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.engine.status(workshop_id).await?;
    Ok(ApiResponse::ok(StatusResponse {
        taller: status.name,
        capacidad: status.capacity,
        in_service: status.in_service,
        waiting: status.waiting,
    }))
}

pub async fn list_workshops(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let workshops = state.directory.list().await?;
    Ok(ApiResponse::ok(WorkshopList {
        talleres: workshops
            .into_iter()
            .map(|w| WorkshopView {
                id: w.id,
                nombre: w.name,
                direccion: w.address,
                logo: w.logo,
                capacidad: w.capacity,
            })
            .collect(),
    }))
}
