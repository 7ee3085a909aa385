//! Catalog Data Access Layer
//!
//! Repositories over the catalog's SQL schema, for SQLite or PostgreSQL.

pub mod db;

pub use db::*;
