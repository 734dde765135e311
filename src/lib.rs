pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod services;

pub use error::{Error, Result};
pub use services::AppState;
