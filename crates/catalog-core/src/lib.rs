//! Catalog Core Library
//!
//! Domain models, error types and configuration shared by the catalog crates.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{DatabaseConfig, RetentionConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
