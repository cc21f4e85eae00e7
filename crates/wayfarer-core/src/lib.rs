//! Core types for the wayfarer media ingestion service.
//!
//! This crate holds configuration, the unified error taxonomy, and the domain
//! models shared by the processing, services, staging, and API crates.

pub mod config;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
