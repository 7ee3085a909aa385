//! Configuration module
//!
//! Database connection settings and retention windows used by the maintenance
//! commands. Values come from the environment (optionally via a `.env` file) and
//! fall back to defaults when a variable is missing or unparsable.

use std::env;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://catalog.db?mode=rwc";
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const IDLE_TIMEOUT_SECS: u64 = 600;
const MAX_LIFETIME_SECS: u64 = 1800;

const SESSION_RETENTION_DAYS: i64 = 30;
const REPORT_RETENTION_DAYS: i64 = 90;
const JOB_RETENTION_DAYS: i64 = 30;
const LOG_RETENTION_DAYS: i64 = 30;
const CONFIG_HISTORY_RETENTION_DAYS: i64 = 180;

/// Connection settings for the catalog database
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: MAX_CONNECTIONS,
            timeout_seconds: CONNECTION_TIMEOUT_SECS,
            idle_timeout_seconds: IDLE_TIMEOUT_SECS,
            max_lifetime_seconds: MAX_LIFETIME_SECS,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Build from an arbitrary key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            database_url: lookup("CATALOG_DATABASE_URL")
                .or_else(|| lookup("DATABASE_URL"))
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            timeout_seconds: lookup("DB_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            idle_timeout_seconds: lookup("DB_IDLE_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(IDLE_TIMEOUT_SECS),
            max_lifetime_seconds: lookup("DB_MAX_LIFETIME_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_LIFETIME_SECS),
            run_migrations: lookup("DB_RUN_MIGRATIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.backend().is_none() {
            return Err(anyhow::anyhow!(
                "CATALOG_DATABASE_URL must be a sqlite: or postgres:// connection string"
            ));
        }

        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS must be greater than 0"));
        }

        Ok(())
    }

    /// Backend named by the URL scheme, if it is one we can talk to.
    pub fn backend(&self) -> Option<&'static str> {
        let url = self.database_url.as_str();
        if url.starts_with("sqlite:") {
            Some("sqlite")
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some("postgres")
        } else {
            None
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_seconds)
    }
}

/// Retention windows (in days) applied by the cleanup command
#[derive(Clone, Debug)]
pub struct RetentionConfig {
    pub session_retention_days: i64,
    pub report_retention_days: i64,
    pub job_retention_days: i64,
    pub log_retention_days: i64,
    pub config_history_retention_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            session_retention_days: SESSION_RETENTION_DAYS,
            report_retention_days: REPORT_RETENTION_DAYS,
            job_retention_days: JOB_RETENTION_DAYS,
            log_retention_days: LOG_RETENTION_DAYS,
            config_history_retention_days: CONFIG_HISTORY_RETENTION_DAYS,
        }
    }
}

impl RetentionConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let days = |key: &str, default: i64| -> i64 {
            lookup(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        Self {
            session_retention_days: days("SESSION_RETENTION_DAYS", SESSION_RETENTION_DAYS),
            report_retention_days: days("REPORT_RETENTION_DAYS", REPORT_RETENTION_DAYS),
            job_retention_days: days("JOB_RETENTION_DAYS", JOB_RETENTION_DAYS),
            log_retention_days: days("LOG_RETENTION_DAYS", LOG_RETENTION_DAYS),
            config_history_retention_days: days(
                "CONFIG_HISTORY_RETENTION_DAYS",
                CONFIG_HISTORY_RETENTION_DAYS,
            ),
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let windows = [
            ("SESSION_RETENTION_DAYS", self.session_retention_days),
            ("REPORT_RETENTION_DAYS", self.report_retention_days),
            ("JOB_RETENTION_DAYS", self.job_retention_days),
            ("LOG_RETENTION_DAYS", self.log_retention_days),
            (
                "CONFIG_HISTORY_RETENTION_DAYS",
                self.config_history_retention_days,
            ),
        ];

        for (name, value) in windows {
            if value <= 0 {
                return Err(anyhow::anyhow!("{} must be greater than 0", name));
            }
        }

        Ok(())
    }

    pub fn session_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_retention_days)
    }

    pub fn report_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.report_retention_days)
    }

    pub fn job_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.job_retention_days)
    }

    pub fn log_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.log_retention_days)
    }

    pub fn config_history_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.config_history_retention_days)
    }
}
