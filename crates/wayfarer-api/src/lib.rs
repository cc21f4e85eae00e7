//! HTTP boundary for the photo ingestion service.

pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
