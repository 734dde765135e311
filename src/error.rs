//! Typed errors for the queue engine and its HTTP surface.

use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The workshop already holds an active turn for this plate. Carries the
    /// existing turn's number so the caller can inform the customer.
    #[error("plate already has an active turn (#{turn_number})")]
    DuplicatePlate { turn_number: i32 },

    #[error("operation not allowed in state {state}")]
    StateConflict { state: &'static str },

    #[error("plate check failed")]
    Forbidden,

    #[error("authentication required")]
    Unauthenticated,

    #[error("deadline exceeded")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicatePlate { .. } | Error::StateConflict { .. } => StatusCode::CONFLICT,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("row"),
            other => Error::Internal(other.into()),
        }
    }
}
