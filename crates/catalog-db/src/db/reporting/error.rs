use catalog_core::{
    models::{ErrorReport, ErrorReportFilters, ErrorStatistics, TopError, REPORT_STATUS_RESOLVED},
    AppError,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::{json, stats};

const ERROR_COLUMNS: &str = r#"
    id, user_id, level, message, error_code, component, stack_trace,
    context, system_info, user_agent, url, fingerprint, status,
    reported_at, resolved_at
"#;

#[derive(Debug, FromRow)]
struct ErrorRow {
    id: i64,
    user_id: i64,
    level: String,
    message: String,
    error_code: Option<String>,
    component: Option<String>,
    stack_trace: Option<String>,
    context: Option<String>,
    system_info: Option<String>,
    user_agent: Option<String>,
    url: Option<String>,
    fingerprint: String,
    status: String,
    reported_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ErrorRow> for ErrorReport {
    type Error = AppError;

    fn try_from(row: ErrorRow) -> Result<Self, Self::Error> {
        Ok(ErrorReport {
            id: row.id,
            user_id: row.user_id,
            level: row.level,
            message: row.message,
            error_code: row.error_code,
            component: row.component,
            stack_trace: row.stack_trace,
            context: json::decode(row.context.as_deref())?.unwrap_or_default(),
            system_info: json::decode(row.system_info.as_deref())?.unwrap_or_default(),
            user_agent: row.user_agent,
            url: row.url,
            fingerprint: row.fingerprint,
            status: row.status,
            reported_at: row.reported_at,
            resolved_at: row.resolved_at,
        })
    }
}

fn scoped<'a>(select: &str, user_id: i64, filters: &'a ErrorReportFilters) -> QueryBuilder<'a, Db> {
    let mut qb = QueryBuilder::<Db>::new(select);
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(level) = filters.level.as_deref() {
        qb.push(" AND level = ").push_bind(level);
    }
    if let Some(component) = filters.component.as_deref() {
        qb.push(" AND component = ").push_bind(component);
    }
    if let Some(start) = filters.start_date {
        qb.push(" AND reported_at >= ").push_bind(start);
    }
    if let Some(end) = filters.end_date {
        qb.push(" AND reported_at <= ").push_bind(end);
    }
    qb
}

#[derive(Clone)]
pub struct ErrorReportingRepository {
    db: Database,
}

impl ErrorReportingRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, report), fields(db.table = "error_reports", db.operation = "insert", user_id = %report.user_id))]
    pub async fn create(&self, report: &mut ErrorReport) -> Result<i64, AppError> {
        report.reported_at = json::or_now(report.reported_at, Utc::now());
        let context = json::encode(&report.context)?;
        let system_info = json::encode(&report.system_info)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO error_reports (user_id, level, message, error_code, component, stack_trace, \
             context, system_info, user_agent, url, fingerprint, status, reported_at, resolved_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(report.user_id)
            .push_bind(&report.level)
            .push_bind(&report.message)
            .push_bind(report.error_code.as_deref())
            .push_bind(report.component.as_deref())
            .push_bind(report.stack_trace.as_deref())
            .push_bind(context)
            .push_bind(system_info)
            .push_bind(report.user_agent.as_deref())
            .push_bind(report.url.as_deref())
            .push_bind(&report.fingerprint)
            .push_bind(&report.status)
            .push_bind(report.reported_at)
            .push_bind(report.resolved_at);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        report.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "error_reports", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<ErrorReport, AppError> {
        let sql = format!("SELECT {} FROM error_reports WHERE id = $1", ERROR_COLUMNS);
        let row = sqlx::query_as::<Db, ErrorRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("error report not found".to_string()))?;
        row.try_into()
    }

    #[tracing::instrument(skip(self, report), fields(db.table = "error_reports", db.operation = "update", db.record_id = %report.id))]
    pub async fn update(&self, report: &ErrorReport) -> Result<(), AppError> {
        let context = json::encode(&report.context)?;
        let system_info = json::encode(&report.system_info)?;

        sqlx::query(
            r#"
            UPDATE error_reports
            SET level = $1, message = $2, error_code = $3, component = $4, stack_trace = $5,
                context = $6, system_info = $7, user_agent = $8, url = $9, fingerprint = $10,
                status = $11, resolved_at = $12
            WHERE id = $13
            "#,
        )
        .bind(&report.level)
        .bind(&report.message)
        .bind(report.error_code.as_deref())
        .bind(report.component.as_deref())
        .bind(report.stack_trace.as_deref())
        .bind(context)
        .bind(system_info)
        .bind(report.user_agent.as_deref())
        .bind(report.url.as_deref())
        .bind(&report.fingerprint)
        .bind(&report.status)
        .bind(report.resolved_at)
        .bind(report.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "error_reports", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM error_reports WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, filters), fields(db.table = "error_reports", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_by_user(&self, user_id: i64, filters: &ErrorReportFilters) -> Result<Vec<ErrorReport>, AppError> {
        let mut qb = scoped(&format!("SELECT {} FROM error_reports", ERROR_COLUMNS), user_id, filters);
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

        let rows = qb.build_query_as::<ErrorRow>().fetch_all(self.db.pool()).await?;
        rows.into_iter().map(ErrorReport::try_from).collect()
    }

    pub async fn get_error_count_in_last_hour(&self, user_id: i64) -> Result<i64, AppError> {
        self.get_recent_error_count(user_id, Duration::hours(1)).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "error_reports", db.operation = "count", user_id = %user_id))]
    pub async fn get_recent_error_count(&self, user_id: i64, window: Duration) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM error_reports WHERE user_id = $1 AND reported_at > $2")
                .bind(user_id)
                .bind(Utc::now() - window)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "error_reports", db.operation = "select_list"))]
    pub async fn get_errors_by_fingerprint(&self, fingerprint: &str, limit: i64) -> Result<Vec<ErrorReport>, AppError> {
        let sql = format!(
            "SELECT {} FROM error_reports WHERE fingerprint = $1 ORDER BY reported_at DESC, id DESC LIMIT $2",
            ERROR_COLUMNS
        );
        let rows = sqlx::query_as::<Db, ErrorRow>(&sql)
            .bind(fingerprint)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(ErrorReport::try_from).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "error_reports", db.operation = "delete"))]
    pub async fn cleanup_old_reports(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM error_reports WHERE reported_at < $1")
            .bind(older_than)
            .execute(self.db.pool())
            .await?;

        let removed = result.rows_affected();
        tracing::info!(removed, "Cleaned up error reports");
        Ok(removed)
    }

    /// Level, component and date range in `filters` narrow every figure
    #[tracing::instrument(skip(self, filters), fields(db.table = "error_reports", db.operation = "aggregate", user_id = %user_id))]
    pub async fn get_error_statistics(
        &self,
        user_id: i64,
        filters: &ErrorReportFilters,
    ) -> Result<ErrorStatistics, AppError> {
        let total_errors: i64 = scoped("SELECT COUNT(*) FROM error_reports", user_id, filters)
            .build_query_scalar()
            .fetch_one(self.db.pool())
            .await?;

        let mut by_level = scoped("SELECT level, COUNT(*) FROM error_reports", user_id, filters);
        by_level.push(" GROUP BY level");
        let by_level: Vec<(String, i64)> = by_level.build_query_as().fetch_all(self.db.pool()).await?;

        let mut by_component = scoped(
            "SELECT COALESCE(component, 'unknown'), COUNT(*) FROM error_reports",
            user_id,
            filters,
        );
        by_component.push(" GROUP BY component ORDER BY COUNT(*) DESC, component ASC LIMIT 10");
        let by_component: Vec<(String, i64)> = by_component.build_query_as().fetch_all(self.db.pool()).await?;

        let mut recent = scoped("SELECT COUNT(*) FROM error_reports", user_id, filters);
        recent
            .push(" AND reported_at > ")
            .push_bind(Utc::now() - Duration::hours(24));
        let recent_errors: i64 = recent.build_query_scalar().fetch_one(self.db.pool()).await?;

        let mut resolved = scoped("SELECT COUNT(*) FROM error_reports", user_id, filters);
        resolved.push(" AND status = ").push_bind(REPORT_STATUS_RESOLVED);
        let resolved_errors: i64 = resolved.build_query_scalar().fetch_one(self.db.pool()).await?;

        let hours = self.db.dialect().hours_between("resolved_at", "reported_at");
        let mut avg = scoped(
            &format!("SELECT CAST(AVG({}) AS DOUBLE PRECISION) FROM error_reports", hours),
            user_id,
            filters,
        );
        avg.push(" AND resolved_at IS NOT NULL");
        let avg_resolution: Option<f64> = avg.build_query_scalar().fetch_one(self.db.pool()).await?;

        Ok(ErrorStatistics {
            total_errors,
            errors_by_level: stats::to_count_map(by_level),
            errors_by_component: stats::to_count_map(by_component),
            recent_errors,
            resolved_errors,
            avg_resolution_time: avg_resolution.unwrap_or(0.0),
        })
    }

    /// Most frequent fingerprints reported between `start` and `end`
    #[tracing::instrument(skip(self), fields(db.table = "error_reports", db.operation = "aggregate", user_id = %user_id))]
    pub async fn get_top_errors(
        &self,
        user_id: i64,
        limit: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TopError>, AppError> {
        let top = sqlx::query_as::<Db, TopError>(
            r#"
            SELECT fingerprint, COUNT(*) AS count, MAX(reported_at) AS last_seen,
                   MIN(reported_at) AS first_seen, MAX(message) AS message,
                   MAX(component) AS component, MAX(level) AS level
            FROM error_reports
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
}
