//! Database handle shared by every repository
//!
//! The backend is picked at compile time: the `sqlite` feature (default) binds the
//! repositories to SQLite, `postgres` binds them to PostgreSQL. All literal SQL uses
//! `$N` placeholders, which both drivers accept. The few places where the two
//! dialects genuinely differ go through [`Dialect`] or [`Database::insert_returning_id`].

use anyhow::Context;
use catalog_core::{config::DatabaseConfig, AppError};
use sqlx::pool::PoolOptions;
use sqlx::QueryBuilder;

use super::transaction::TransactionGuard;

#[cfg(feature = "sqlite")]
pub type Db = sqlx::Sqlite;

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type Db = sqlx::Postgres;

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("catalog-db needs either the `sqlite` or the `postgres` feature");

pub type DbPool = sqlx::Pool<Db>;

#[cfg(feature = "sqlite")]
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgres");

/// SQL dialect of the compiled backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Dialect matching the enabled backend feature
    pub const fn current() -> Self {
        #[cfg(feature = "sqlite")]
        {
            Dialect::Sqlite
        }
        #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
        {
            Dialect::Postgres
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    pub fn is_sqlite(&self) -> bool {
        matches!(self, Dialect::Sqlite)
    }

    pub fn is_postgres(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Elapsed seconds between two timestamp expressions, as a floating point value.
    pub fn seconds_between(&self, end: &str, start: &str) -> String {
        match self {
            Dialect::Sqlite => format!("((julianday({}) - julianday({})) * 86400.0)", end, start),
            Dialect::Postgres => format!("EXTRACT(EPOCH FROM ({} - {}))", end, start),
        }
    }

    /// Elapsed hours between two timestamp expressions, as a floating point value.
    pub fn hours_between(&self, end: &str, start: &str) -> String {
        match self {
            Dialect::Sqlite => format!("((julianday({}) - julianday({})) * 24.0)", end, start),
            Dialect::Postgres => format!("(EXTRACT(EPOCH FROM ({} - {})) / 3600.0)", end, start),
        }
    }

    /// Calendar day of a timestamp expression.
    pub fn date_of(&self, column: &str) -> String {
        match self {
            Dialect::Sqlite => format!("DATE({})", column),
            Dialect::Postgres => format!("CAST({} AS DATE)", column),
        }
    }

    /// Calendar month of a timestamp expression as `YYYY-MM` text.
    pub fn month_of(&self, column: &str) -> String {
        match self {
            Dialect::Sqlite => format!("strftime('%Y-%m', {})", column),
            Dialect::Postgres => format!("to_char({}, 'YYYY-MM')", column),
        }
    }
}

/// Connection pool plus the dialect it speaks
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    dialect: Dialect,
}

impl Database {
    /// Connect using the given settings and apply migrations when enabled.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let dialect = Dialect::current();
        if config.backend() != Some(dialect.name()) {
            return Err(AppError::InvalidInput(format!(
                "database url does not match the compiled {} backend",
                dialect.name()
            )));
        }

        tracing::info!(backend = dialect.name(), "Connecting to database...");
        let pool = PoolOptions::<Db>::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .connect(&config.database_url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            backend = dialect.name(),
            "Database connected successfully"
        );

        let db = Self::from_pool(pool);
        if config.run_migrations {
            db.migrate().await?;
        }

        Ok(db)
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            pool,
            dialect: Dialect::current(),
        }
    }

    /// Apply the embedded migrations for the compiled backend
    pub async fn migrate(&self) -> Result<(), AppError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!(backend = self.dialect.name(), "Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn begin(&self) -> Result<TransactionGuard<'_>, AppError> {
        Ok(TransactionGuard::begin(&self.pool).await?)
    }

    /// Execute an INSERT and return the id of the new row.
    ///
    /// SQLite reports it through `last_insert_rowid()`, PostgreSQL needs a
    /// `RETURNING id` clause appended to the statement.
    pub async fn insert_returning_id(&self, mut query: QueryBuilder<'_, Db>) -> Result<i64, AppError> {
        #[cfg(feature = "sqlite")]
        {
            let result = query.build().execute(&self.pool).await?;
            Ok(result.last_insert_rowid())
        }

        #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
        {
            query.push(" RETURNING id");
            let id = query
                .build_query_scalar::<i64>()
                .fetch_one(&self.pool)
                .await?;
            Ok(id)
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
