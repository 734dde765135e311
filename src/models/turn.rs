//! Turn model and its state machine vocabulary.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    Waiting,
    InService,
    Finalized,
    Cancelled,
}

impl TurnState {
    /// FINALIZED and CANCELLED turns never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::Finalized | TurnState::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TurnState::Waiting => "WAITING",
            TurnState::InService => "IN_SERVICE",
            TurnState::Finalized => "FINALIZED",
            TurnState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(TurnState::Waiting),
            "IN_SERVICE" => Ok(TurnState::InService),
            "FINALIZED" => Ok(TurnState::Finalized),
            "CANCELLED" => Ok(TurnState::Cancelled),
            _ => Err(()),
        }
    }
}

/// Which timestamp column a state transition stamps. Each is written exactly
/// once, on first entry into the corresponding state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStamp {
    Started,
    Finalized,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub workshop_id: Uuid,
    /// Monotonic per workshop, never reused.
    pub turn_number: i32,
    pub customer_name: String,
    pub phone: String,
    pub vehicle_model: String,
    /// Normalised: trimmed and uppercased.
    pub plate: String,
    pub problem: Option<String>,
    pub state: TurnState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Turn {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Normalise a vehicle plate for storage and comparison.
pub fn normalize_plate(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Queue position exposed by the public status endpoint. No PII.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnSummary {
    #[serde(rename = "numeroTurno")]
    pub turn_number: i32,
    #[serde(rename = "estado")]
    pub state: String,
}

impl From<&Turn> for TurnSummary {
    fn from(turn: &Turn) -> Self {
        Self {
            turn_number: turn.turn_number,
            state: turn.state.to_string(),
        }
    }
}

/// Full turn record for the auth-gated listing endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnDetail {
    pub id: Uuid,
    #[serde(rename = "numeroTurno")]
    pub turn_number: i32,
    #[serde(rename = "nombreCliente")]
    pub customer_name: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "modeloVehiculo")]
    pub vehicle_model: String,
    #[serde(rename = "patente")]
    pub plate: String,
    #[serde(rename = "descripcionProblema")]
    pub problem: Option<String>,
    #[serde(rename = "estado")]
    pub state: String,
    #[serde(rename = "creadoEn")]
    pub created_at: String,
    #[serde(rename = "iniciadoEn")]
    pub started_at: Option<String>,
    #[serde(rename = "finalizadoEn")]
    pub finalized_at: Option<String>,
    #[serde(rename = "canceladoEn")]
    pub cancelled_at: Option<String>,
}

fn iso_seconds(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl From<&Turn> for TurnDetail {
    fn from(turn: &Turn) -> Self {
        Self {
            id: turn.id,
            turn_number: turn.turn_number,
            customer_name: turn.customer_name.clone(),
            phone: turn.phone.clone(),
            vehicle_model: turn.vehicle_model.clone(),
            plate: turn.plate.clone(),
            problem: turn.problem.clone(),
            state: turn.state.to_string(),
            created_at: iso_seconds(&turn.created_at),
            started_at: turn.started_at.as_ref().map(iso_seconds),
            finalized_at: turn.finalized_at.as_ref().map(iso_seconds),
            cancelled_at: turn.cancelled_at.as_ref().map(iso_seconds),
        }
    }
}
