use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{ApiError, ApiResponse};
use crate::error::Error;
use crate::models::turn::normalize_plate;
use crate::models::TurnDetail;
use crate::services::queue::NewTurn;
use crate::services::AppState;

#[derive(Deserialize)]
pub struct CreateTurnRequest {
    #[serde(rename = "nombreCliente")]
    pub customer_name: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "modeloVehiculo")]
    pub vehicle_model: String,
    #[serde(rename = "patente")]
    pub plate: String,
    #[serde(rename = "descripcionProblema", default)]
    pub problem: Option<String>,
}

#[derive(Serialize)]
pub struct CreatedTurn {
    pub id: Uuid,
    #[serde(rename = "numeroTurno")]
    pub turn_number: i32,
    #[serde(rename = "estado")]
    pub state: String,
}

#[derive(Deserialize)]
pub struct ListTurnsQuery {
    #[serde(rename = "patente")]
    pub plate: Option<String>,
}

#[derive(Serialize)]
pub struct TurnList {
    pub turnos: Vec<TurnDetail>,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    #[serde(rename = "patente")]
    pub plate: String,
}

#[derive(Serialize)]
pub struct CancelledTurn {
    #[serde(rename = "numeroTurno")]
    pub turn_number: i32,
    pub message: String,
}

#[derive(Serialize)]
pub struct Message {
    pub message: String,
}

/// Request-shape validation. Invariants the engine owns (plate uniqueness,
/// numbering, state transitions) are re-checked inside the transaction.
fn validate_create(req: &CreateTurnRequest) -> Result<(), Error> {
    if req.customer_name.trim().chars().count() < 2 {
        return Err(Error::Validation(
            "nombreCliente must be at least 2 characters".into(),
        ));
    }
    let digits = req.phone.len() >= 8
        && req.phone.len() <= 15
        && req.phone.bytes().all(|b| b.is_ascii_digit());
    if !digits {
        return Err(Error::Validation("telefono must be 8 to 15 digits".into()));
    }
    if req.vehicle_model.trim().is_empty() {
        return Err(Error::Validation("modeloVehiculo must not be empty".into()));
    }
    if normalize_plate(&req.plate).is_empty() {
        return Err(Error::Validation("patente must not be empty".into()));
    }
    if let Some(problem) = &req.problem {
        if problem.chars().count() > 255 {
            return Err(Error::Validation(
                "descripcionProblema must be at most 255 characters".into(),
            ));
        }
    }
    Ok(())
}

pub async fn create_turn(
    State(state): State<Arc<AppState>>,
    Path(workshop_id): Path<Uuid>,
    Json(req): Json<CreateTurnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_create(&req)?;

    let turn = state
        .engine
        .create(
            workshop_id,
            NewTurn {
                customer_name: req.customer_name.trim().to_string(),
                phone: req.phone,
                vehicle_model: req.vehicle_model.trim().to_string(),
                plate: req.plate,
                problem: req.problem,
            },
        )
        .await?;

    let body = CreatedTurn {
        id: turn.id,
        turn_number: turn.turn_number,
        state: turn.state.to_string(),
    };
    Ok((StatusCode::CREATED, ApiResponse::ok(body)))
}

pub async fn list_turns(
    State(state): State<Arc<AppState>>,
    Path(workshop_id): Path<Uuid>,
    Query(query): Query<ListTurnsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let turns = state
        .engine
        .list(workshop_id, query.plate.as_deref())
        .await?;

    Ok(ApiResponse::ok(TurnList {
        turnos: turns.iter().map(TurnDetail::from).collect(),
    }))
}

pub async fn finalize_turn(
    State(state): State<Arc<AppState>>,
    Path(turn_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.finalize(turn_id).await?;
    Ok(ApiResponse::ok(Message {
        message: "turno finalizado".into(),
    }))
}

pub async fn cancel_turn(
    State(state): State<Arc<AppState>>,
    Path(turn_id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.cancel(turn_id, &req.plate).await?;
    Ok(ApiResponse::ok(Message {
        message: "turno cancelado".into(),
    }))
}

pub async fn cancel_by_plate(
    State(state): State<Arc<AppState>>,
    Path(workshop_id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let turn = state.engine.cancel_by_plate(workshop_id, &req.plate).await?;
    Ok(ApiResponse::ok(CancelledTurn {
        turn_number: turn.turn_number,
        message: "turno cancelado".into(),
    }))
}
