//! Database repositories for the data access layer
//!
//! Repositories are organized into control/ (users, favorites, configuration,
//! analytics, assets), media/ (catalog items, files, duplicates, statistics), jobs/
//! (conversion, sync, stress tests) and reporting/ (errors, crashes, logs).
//! Each repository owns one domain area and shares a cloned [`Database`] handle.
//
// Connection, dialect and transaction plumbing
pub mod database;
pub mod transaction;
//
// Column encoding and aggregate helpers
pub mod json;
pub mod stats;
//
pub mod control;
pub mod jobs;
pub mod media;
pub mod reporting;

pub use database::{Database, Db, DbPool, Dialect};
pub use transaction::TransactionGuard;

pub use control::{
    AnalyticsRepository, AssetRepository, ConfigurationRepository, FavoritesRepository, UserRepository,
};
pub use jobs::{ConversionRepository, StressTestRepository, SyncRepository};
pub use media::{
    DirectoryAnalysisRepository, DuplicateEntityRepository, ExternalMetadataRepository, FileRepository,
    MediaCollectionRepository, MediaFileRepository, MediaItemRepository, StatsRepository, UserMetadataRepository,
};
pub use reporting::{CrashReportingRepository, ErrorReportingRepository, LogManagementRepository};
