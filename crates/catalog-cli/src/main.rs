//! catalog: maintenance commands for the media catalog database.
//!
//! Reads CATALOG_DATABASE_URL (or DATABASE_URL) plus the DB_* pool settings and
//! the *_RETENTION_DAYS windows from the environment or a `.env` file.

use anyhow::Context;
use catalog_cli::{
    init_tracing, render_duplicates, render_summary, CatalogSummary, OutputFormat, RetentionCutoffs,
};
use catalog_core::{
    models::{CrashReportFilters, ErrorReportFilters},
    DatabaseConfig, RetentionConfig,
};
use catalog_db::{
    AnalyticsRepository, ConfigurationRepository, ConversionRepository, CrashReportingRepository, Database,
    DuplicateEntityRepository, ErrorReportingRepository, LogManagementRepository, MediaItemRepository,
    StressTestRepository, SyncRepository, UserRepository,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "catalog", about = "Media catalog database maintenance")]
struct Cli {
    /// Connection string, overrides CATALOG_DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Print catalog-wide counters
    Stats {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Also report crash and error statistics for this user
        #[arg(long)]
        user: Option<i64>,
    },
    /// Delete data older than the configured retention windows
    Cleanup {
        /// Only print what would be cleaned up
        #[arg(long)]
        dry_run: bool,
    },
    /// List media items sharing title, type and year
    Duplicates {
        /// Maximum number of groups
        #[arg(long, default_value = "20")]
        limit: i64,
        /// Offset for pagination
        #[arg(long, default_value = "0")]
        offset: i64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Serialize)]
struct CleanupResult {
    target: &'static str,
    removed: u64,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn collect_summary(db: &Database, user: Option<i64>) -> anyhow::Result<CatalogSummary> {
    let media = MediaItemRepository::new(db.clone());

    let (crash_statistics, error_statistics) = match user {
        Some(user_id) => (
            Some(
                CrashReportingRepository::new(db.clone())
                    .get_crash_statistics(user_id, &CrashReportFilters::default())
                    .await?,
            ),
            Some(
                ErrorReportingRepository::new(db.clone())
                    .get_error_statistics(user_id, &ErrorReportFilters::default())
                    .await?,
            ),
        ),
        None => (None, None),
    };

    let configuration_version = ConfigurationRepository::new(db.clone())
        .get_configuration()
        .await?
        .map(|config| config.version);

    Ok(CatalogSummary {
        backend: db.dialect().name().to_string(),
        configuration_version,
        total_users: AnalyticsRepository::new(db.clone()).get_total_users().await?,
        total_media_items: media.count().await?,
        media_items_by_type: media.count_by_type().await?.into_iter().collect(),
        duplicate_groups: DuplicateEntityRepository::new(db.clone()).count_duplicates().await?,
        active_conversion_jobs: ConversionRepository::new(db.clone()).get_active_jobs_count().await?,
        crash_statistics,
        error_statistics,
    })
}

async fn run_cleanup(db: &Database, retention: &RetentionConfig) -> anyhow::Result<Vec<CleanupResult>> {
    let cutoffs = RetentionCutoffs::from_config(retention, Utc::now());
    let jobs = ConversionRepository::new(db.clone());
    let logs = LogManagementRepository::new(db.clone());

    let mut results = vec![
        CleanupResult {
            target: "user sessions",
            removed: UserRepository::new(db.clone())
                .cleanup_expired_sessions(retention.session_retention())
                .await?,
        },
        CleanupResult {
            target: "error reports",
            removed: ErrorReportingRepository::new(db.clone())
                .cleanup_old_reports(cutoffs.reports)
                .await?,
        },
        CleanupResult {
            target: "crash reports",
            removed: CrashReportingRepository::new(db.clone())
                .cleanup_old_reports(cutoffs.reports)
                .await?,
        },
        CleanupResult {
            target: "conversion jobs",
            removed: jobs.cleanup_jobs(cutoffs.jobs).await?,
        },
        CleanupResult {
            target: "sync sessions",
            removed: SyncRepository::new(db.clone()).cleanup_sessions(cutoffs.jobs).await?,
        },
        CleanupResult {
            target: "stress test executions",
            removed: StressTestRepository::new(db.clone())
                .cleanup_old_executions(cutoffs.jobs)
                .await?,
        },
        CleanupResult {
            target: "log collections",
            removed: logs.cleanup_old_collections(cutoffs.logs).await?,
        },
        CleanupResult {
            target: "configuration history",
            removed: ConfigurationRepository::new(db.clone())
                .cleanup_old_history(cutoffs.config_history)
                .await?,
        },
    ];

    // Expired shares are deactivated rather than deleted
    results.push(CleanupResult {
        target: "expired log shares",
        removed: logs.cleanup_expired_shares().await?,
    });

    Ok(results)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = DatabaseConfig::from_env().context("Invalid database configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
        config.validate().context("Invalid --database-url")?;
    }
    if matches!(cli.command, Commands::Migrate) {
        config.run_migrations = false;
    }

    let db = Database::connect(&config)
        .await
        .context("Failed to connect to the catalog database")?;

    match cli.command {
        Commands::Migrate => {
            db.migrate().await?;
            println!("Migrations applied ({})", db.dialect().name());
        }
        Commands::Stats { format, user } => {
            let summary = collect_summary(&db, user).await?;
            match format {
                OutputFormat::Json => print_json(&summary)?,
                OutputFormat::Table => print!("{}", render_summary(&summary)),
            }
        }
        Commands::Cleanup { dry_run } => {
            let retention = RetentionConfig::from_env().context("Invalid retention configuration")?;
            if dry_run {
                let cutoffs = RetentionCutoffs::from_config(&retention, Utc::now());
                for (target, cutoff) in cutoffs.targets() {
                    println!("{:<24} older than {}", target, cutoff.to_rfc3339());
                }
            } else {
                let results = run_cleanup(&db, &retention).await?;
                let total: u64 = results.iter().map(|r| r.removed).sum();
                for result in &results {
                    println!("{:<24} {:>8}", result.target, result.removed);
                }
                tracing::info!(total, "Cleanup finished");
            }
        }
        Commands::Duplicates { limit, offset, format } => {
            let (groups, total) = DuplicateEntityRepository::new(db.clone())
                .get_duplicate_groups(limit, offset)
                .await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "groups": groups, "total": total }))?,
                OutputFormat::Table => print!("{}", render_duplicates(&groups, total)),
            }
        }
    }

    db.close().await;
    Ok(())
}
