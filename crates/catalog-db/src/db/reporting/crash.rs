use catalog_core::{
    models::{CrashReport, CrashReportFilters, CrashStatistics, CrashTrend, TopCrash, REPORT_STATUS_RESOLVED},
    AppError,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::{json, stats};

const CRASH_COLUMNS: &str = r#"
    id, user_id, signal, message, stack_trace, context, system_info,
    fingerprint, status, reported_at, resolved_at
"#;

/// Days covered by the crash rate
const CRASH_RATE_DAYS: i64 = 30;

#[derive(Debug, FromRow)]
struct CrashRow {
    id: i64,
    user_id: i64,
    signal: String,
    message: String,
    stack_trace: Option<String>,
    context: Option<String>,
    system_info: Option<String>,
    fingerprint: String,
    status: String,
    reported_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<CrashRow> for CrashReport {
    type Error = AppError;

    fn try_from(row: CrashRow) -> Result<Self, Self::Error> {
        Ok(CrashReport {
            id: row.id,
            user_id: row.user_id,
            signal: row.signal,
            message: row.message,
            stack_trace: row.stack_trace,
            context: json::decode(row.context.as_deref())?.unwrap_or_default(),
            system_info: json::decode(row.system_info.as_deref())?.unwrap_or_default(),
            fingerprint: row.fingerprint,
            status: row.status,
            reported_at: row.reported_at,
            resolved_at: row.resolved_at,
        })
    }
}

/// `<select> WHERE user_id = ?` narrowed by the signal and date range of `filters`
fn scoped<'a>(select: &str, user_id: i64, filters: &'a CrashReportFilters) -> QueryBuilder<'a, Db> {
    let mut qb = QueryBuilder::<Db>::new(select);
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(signal) = filters.signal.as_deref() {
        qb.push(" AND signal = ").push_bind(signal);
    }
    if let Some(start) = filters.start_date {
        qb.push(" AND reported_at >= ").push_bind(start);
    }
    if let Some(end) = filters.end_date {
        qb.push(" AND reported_at <= ").push_bind(end);
    }
    qb
}

/// Crash reports and crash analytics
#[derive(Clone)]
pub struct CrashReportingRepository {
    db: Database,
}

impl CrashReportingRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, report), fields(db.table = "crash_reports", db.operation = "insert", user_id = %report.user_id))]
    pub async fn create(&self, report: &mut CrashReport) -> Result<i64, AppError> {
        report.reported_at = json::or_now(report.reported_at, Utc::now());
        let context = json::encode(&report.context)?;
        let system_info = json::encode(&report.system_info)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO crash_reports (user_id, signal, message, stack_trace, context, system_info, \
             fingerprint, status, reported_at, resolved_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(report.user_id)
            .push_bind(&report.signal)
            .push_bind(&report.message)
            .push_bind(report.stack_trace.as_deref())
            .push_bind(context)
            .push_bind(system_info)
            .push_bind(&report.fingerprint)
            .push_bind(&report.status)
            .push_bind(report.reported_at)
            .push_bind(report.resolved_at);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        report.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "crash_reports", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<CrashReport, AppError> {
        let sql = format!("SELECT {} FROM crash_reports WHERE id = $1", CRASH_COLUMNS);
        let row = sqlx::query_as::<Db, CrashRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("crash report not found".to_string()))?;
        row.try_into()
    }

    #[tracing::instrument(skip(self, report), fields(db.table = "crash_reports", db.operation = "update", db.record_id = %report.id))]
    pub async fn update(&self, report: &CrashReport) -> Result<(), AppError> {
        let context = json::encode(&report.context)?;
        let system_info = json::encode(&report.system_info)?;

        sqlx::query(
            r#"
            UPDATE crash_reports
            SET signal = $1, message = $2, stack_trace = $3, context = $4, system_info = $5,
                fingerprint = $6, status = $7, resolved_at = $8
            WHERE id = $9
            "#,
        )
        .bind(&report.signal)
        .bind(&report.message)
        .bind(report.stack_trace.as_deref())
        .bind(context)
        .bind(system_info)
        .bind(&report.fingerprint)
        .bind(&report.status)
        .bind(report.resolved_at)
        .bind(report.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// A user's crashes, newest first
    #[tracing::instrument(skip(self, filters), fields(db.table = "crash_reports", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_by_user(&self, user_id: i64, filters: &CrashReportFilters) -> Result<Vec<CrashReport>, AppError> {
        let mut qb = scoped(&format!("SELECT {} FROM crash_reports", CRASH_COLUMNS), user_id, filters);
        if let Some(status) = filters.status.as_deref() {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.push(" ORDER BY reported_at DESC, id DESC");
        if filters.limit > 0 {
            qb.push(" LIMIT ").push_bind(filters.limit);
            if filters.offset > 0 {
                qb.push(" OFFSET ").push_bind(filters.offset);
            }
        }

        let rows = qb.build_query_as::<CrashRow>().fetch_all(self.db.pool()).await?;
        rows.into_iter().map(CrashReport::try_from).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "crash_reports", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM crash_reports WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Crashes the user reported within `window` of now
    #[tracing::instrument(skip(self), fields(db.table = "crash_reports", db.operation = "count", user_id = %user_id))]
    pub async fn get_recent_crash_count(&self, user_id: i64, window: Duration) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM crash_reports WHERE user_id = $1 AND reported_at > $2")
                .bind(user_id)
                .bind(Utc::now() - window)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "crash_reports", db.operation = "select_list"))]
    pub async fn get_crashes_by_fingerprint(&self, fingerprint: &str, limit: i64) -> Result<Vec<CrashReport>, AppError> {
        let sql = format!(
            "SELECT {} FROM crash_reports WHERE fingerprint = $1 ORDER BY reported_at DESC, id DESC LIMIT $2",
            CRASH_COLUMNS
        );
        let rows = sqlx::query_as::<Db, CrashRow>(&sql)
            .bind(fingerprint)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(CrashReport::try_from).collect()
    }

    /// Delete reports filed before `older_than`
    #[tracing::instrument(skip(self), fields(db.table = "crash_reports", db.operation = "delete"))]
    pub async fn cleanup_old_reports(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM crash_reports WHERE reported_at < $1")
            .bind(older_than)
            .execute(self.db.pool())
            .await?;

        let removed = result.rows_affected();
        tracing::info!(removed, "Cleaned up crash reports");
        Ok(removed)
    }

    /// Signal and date range in `filters` narrow every figure; status and paging are ignored
    #[tracing::instrument(skip(self, filters), fields(db.table = "crash_reports", db.operation = "aggregate", user_id = %user_id))]
    pub async fn get_crash_statistics(
        &self,
        user_id: i64,
        filters: &CrashReportFilters,
    ) -> Result<CrashStatistics, AppError> {
        let now = Utc::now();

        let total_crashes: i64 = scoped("SELECT COUNT(*) FROM crash_reports", user_id, filters)
            .build_query_scalar()
            .fetch_one(self.db.pool())
            .await?;

        let mut by_signal = scoped("SELECT signal, COUNT(*) FROM crash_reports", user_id, filters);
        by_signal.push(" GROUP BY signal");
        let by_signal: Vec<(String, i64)> = by_signal.build_query_as().fetch_all(self.db.pool()).await?;

        let mut recent = scoped("SELECT COUNT(*) FROM crash_reports", user_id, filters);
        recent.push(" AND reported_at > ").push_bind(now - Duration::hours(24));
        let recent_crashes: i64 = recent.build_query_scalar().fetch_one(self.db.pool()).await?;

        let mut resolved = scoped("SELECT COUNT(*) FROM crash_reports", user_id, filters);
        resolved.push(" AND status = ").push_bind(REPORT_STATUS_RESOLVED);
        let resolved_crashes: i64 = resolved.build_query_scalar().fetch_one(self.db.pool()).await?;

        let hours = self.db.dialect().hours_between("resolved_at", "reported_at");
        let mut avg = scoped(
            &format!("SELECT CAST(AVG({}) AS DOUBLE PRECISION) FROM crash_reports", hours),
            user_id,
            filters,
        );
        avg.push(" AND resolved_at IS NOT NULL");
        let avg_resolution: Option<f64> = avg.build_query_scalar().fetch_one(self.db.pool()).await?;

        let mut last_month = scoped("SELECT COUNT(*) FROM crash_reports", user_id, filters);
        last_month
            .push(" AND reported_at > ")
            .push_bind(now - Duration::days(CRASH_RATE_DAYS));
        let last_month: i64 = last_month.build_query_scalar().fetch_one(self.db.pool()).await?;

        Ok(CrashStatistics {
            total_crashes,
            crashes_by_signal: stats::to_count_map(by_signal),
            recent_crashes,
            resolved_crashes,
            avg_resolution_time: avg_resolution.unwrap_or(0.0),
            crash_rate: last_month as f64 / CRASH_RATE_DAYS as f64,
        })
    }

    /// Most frequent fingerprints reported between `start` and `end`
    #[tracing::instrument(skip(self), fields(db.table = "crash_reports", db.operation = "aggregate", user_id = %user_id))]
    pub async fn get_top_crashes(
        &self,
        user_id: i64,
        limit: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TopCrash>, AppError> {
        let top = sqlx::query_as::<Db, TopCrash>(
            r#"
            SELECT fingerprint, COUNT(*) AS count, MAX(reported_at) AS last_seen,
                   MIN(reported_at) AS first_seen, MAX(message) AS message, MAX(signal) AS signal
            FROM crash_reports
            WHERE user_id = $1 AND reported_at BETWEEN $2 AND $3
            GROUP BY fingerprint
            ORDER BY COUNT(*) DESC, fingerprint ASC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(top)
    }

    /// Crashes per calendar day over the last `days` days, oldest first
    #[tracing::instrument(skip(self), fields(db.table = "crash_reports", db.operation = "aggregate", user_id = %user_id))]
    pub async fn get_crash_trends(&self, user_id: i64, days: i64) -> Result<Vec<CrashTrend>, AppError> {
        let day = self.db.dialect().date_of("reported_at");
        let sql = format!(
            "SELECT {day} AS date, COUNT(*) AS count FROM crash_reports \
             WHERE user_id = $1 AND reported_at > $2 \
             GROUP BY {day} ORDER BY {day} ASC",
        );
        let trends = sqlx::query_as::<Db, CrashTrend>(&sql)
            .bind(user_id)
            .bind(Utc::now() - Duration::days(days))
            .fetch_all(self.db.pool())
            .await?;
        Ok(trends)
    }
}
