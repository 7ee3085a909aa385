//! Data models for the catalog
//!
//! Organized by domain. Each sub-module is re-exported so callers can import
//! everything from `catalog_core::models`.

mod analytics;
mod asset;
mod configuration;
mod conversion;
mod favorites;
mod file;
mod log_management;
mod media;
mod reporting;
mod stats;
mod stress_test;
mod sync;
mod user;

pub use analytics::*;
pub use asset::*;
pub use configuration::*;
pub use conversion::*;
pub use favorites::*;
pub use file::*;
pub use log_management::*;
pub use media::*;
pub use reporting::*;
pub use stats::*;
pub use stress_test::*;
pub use sync::*;
pub use user::*;
