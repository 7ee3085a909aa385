use catalog_core::{
    models::{
        AccessPatterns, DuplicateGroupStats, DuplicateSort, DuplicateStats, FileTypeStats, GrowthTrends,
        MonthlyGrowth, NewScanHistory, OverallStats, ScanHistoryItem, SizeDistribution, StorageRootStats,
    },
    AppError,
};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::stats::{daily_series, growth_rate, wasted_space, window_start};

/// Live regular files
const LIVE_FILES: &str = " FROM files f WHERE f.is_directory = FALSE AND f.deleted = FALSE";

const TOP_ACCESS_ENTRIES: i64 = 5;

#[derive(Debug, FromRow)]
struct DuplicateGroupRow {
    group_id: i64,
    file_count: i64,
    total_size: i64,
    sample_path: Option<String>,
}

impl From<DuplicateGroupRow> for DuplicateGroupStats {
    fn from(row: DuplicateGroupRow) -> Self {
        DuplicateGroupStats {
            group_id: row.group_id,
            file_count: row.file_count,
            total_size: row.total_size,
            wasted_space: wasted_space(row.total_size, row.file_count),
            sample_path: row.sample_path,
        }
    }
}

#[derive(Debug, FromRow)]
struct MonthRow {
    month: String,
    files_added: i64,
    size_added: i64,
}

fn push_root_filter<'a>(qb: &mut QueryBuilder<'a, Db>, storage_root: Option<&'a str>) {
    if let Some(name) = storage_root {
        qb.push(" AND f.storage_root_id = (SELECT id FROM storage_roots WHERE name = ")
            .push_bind(name)
            .push(")");
    }
}

/// Read-only catalog statistics over files and storage roots, plus the scan log
#[derive(Clone)]
pub struct StatsRepository {
    db: Database,
}

impl StatsRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    pub async fn get_overall_stats(&self) -> Result<OverallStats, AppError> {
        let stats = sqlx::query_as::<Db, OverallStats>(
            r#"
            SELECT
                COUNT(CASE WHEN is_directory = FALSE AND deleted = FALSE THEN 1 END) AS total_files,
                COUNT(CASE WHEN is_directory = TRUE AND deleted = FALSE THEN 1 END) AS total_directories,
                CAST(COALESCE(SUM(CASE WHEN is_directory = FALSE AND deleted = FALSE THEN size ELSE 0 END), 0) AS BIGINT) AS total_size,
                COUNT(CASE WHEN is_duplicate = TRUE AND deleted = FALSE THEN 1 END) AS total_duplicates,
                COUNT(DISTINCT CASE WHEN is_duplicate = TRUE AND deleted = FALSE THEN duplicate_group_id END) AS duplicate_groups,
                (SELECT COUNT(*) FROM storage_roots) AS storage_roots_count,
                (SELECT COUNT(*) FROM storage_roots WHERE enabled = TRUE) AS active_storage_roots,
                MAX(CASE WHEN deleted = FALSE THEN last_scan_at END) AS last_scan_time
            FROM files
            "#,
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok(stats)
    }

    /// Totals for one storage root; `NotFound` when no root has that name.
    #[tracing::instrument(skip(self), fields(db.table = "storage_roots", db.operation = "aggregate"))]
    pub async fn get_storage_root_stats(&self, name: &str) -> Result<StorageRootStats, AppError> {
        let stats = sqlx::query_as::<Db, StorageRootStats>(
            r#"
            SELECT
                sr.name,
                COUNT(CASE WHEN f.is_directory = FALSE AND f.deleted = FALSE THEN 1 END) AS total_files,
                COUNT(CASE WHEN f.is_directory = TRUE AND f.deleted = FALSE THEN 1 END) AS total_directories,
                CAST(COALESCE(SUM(CASE WHEN f.is_directory = FALSE AND f.deleted = FALSE THEN f.size ELSE 0 END), 0) AS BIGINT) AS total_size,
                COUNT(CASE WHEN f.is_duplicate = TRUE AND f.deleted = FALSE THEN 1 END) AS duplicate_files,
                COUNT(DISTINCT CASE WHEN f.is_duplicate = TRUE AND f.deleted = FALSE THEN f.duplicate_group_id END) AS duplicate_groups,
                MAX(CASE WHEN f.deleted = FALSE THEN f.last_scan_at END) AS last_scan_time,
                sr.enabled AS is_online
            FROM storage_roots sr
            LEFT JOIN files f ON f.storage_root_id = sr.id
            WHERE sr.name = $1
            GROUP BY sr.id, sr.name, sr.enabled
            "#,
        )
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;

        stats.ok_or_else(|| AppError::NotFound(format!("storage root '{}' not found", name)))
    }

    /// Most common `(file_type, extension)` pairs, missing values reported as
    /// "unknown" and "none".
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    pub async fn get_file_type_stats(
        &self,
        storage_root: Option<&str>,
        limit: i64,
    ) -> Result<Vec<FileTypeStats>, AppError> {
        let mut qb = QueryBuilder::<Db>::new(
            "SELECT COALESCE(f.file_type, 'unknown') AS file_type, COALESCE(f.extension, 'none') AS extension, \
             COUNT(*) AS count, CAST(COALESCE(SUM(f.size), 0) AS BIGINT) AS total_size, \
             CAST(AVG(f.size) AS DOUBLE PRECISION) AS average_size",
        );
        qb.push(LIVE_FILES);
        push_root_filter(&mut qb, storage_root);
        qb.push(
            " GROUP BY COALESCE(f.file_type, 'unknown'), COALESCE(f.extension, 'none') \
             ORDER BY count DESC, file_type, extension LIMIT ",
        )
        .push_bind(limit);

        let stats = qb
            .build_query_as::<FileTypeStats>()
            .fetch_all(self.db.pool())
            .await?;
        Ok(stats)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    pub async fn get_size_distribution(&self, storage_root: Option<&str>) -> Result<SizeDistribution, AppError> {
        let mut qb = QueryBuilder::<Db>::new(
            r#"
            SELECT
                COUNT(CASE WHEN f.size < 1024 THEN 1 END) AS tiny,
                COUNT(CASE WHEN f.size >= 1024 AND f.size < 1048576 THEN 1 END) AS small,
                COUNT(CASE WHEN f.size >= 1048576 AND f.size < 10485760 THEN 1 END) AS medium,
                COUNT(CASE WHEN f.size >= 10485760 AND f.size < 104857600 THEN 1 END) AS large,
                COUNT(CASE WHEN f.size >= 104857600 AND f.size < 1073741824 THEN 1 END) AS huge,
                COUNT(CASE WHEN f.size >= 1073741824 THEN 1 END) AS massive
            "#,
        );
        qb.push(LIVE_FILES);
        push_root_filter(&mut qb, storage_root);

        let distribution = qb
            .build_query_as::<SizeDistribution>()
            .fetch_one(self.db.pool())
            .await?;
        Ok(distribution)
    }

    /// Duplicate totals over live files that belong to a group.
    ///
    /// Wasted space counts every copy but one, sized by the largest member.
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    pub async fn get_duplicate_stats(&self, storage_root: Option<&str>) -> Result<DuplicateStats, AppError> {
        let mut qb = QueryBuilder::<Db>::new(
            "WITH duplicate_analysis AS (SELECT f.duplicate_group_id, COUNT(*) AS group_size, MAX(f.size) AS file_size",
        );
        qb.push(LIVE_FILES)
            .push(" AND f.is_duplicate = TRUE AND f.duplicate_group_id IS NOT NULL");
        push_root_filter(&mut qb, storage_root);
        qb.push(
            r#"
             GROUP BY f.duplicate_group_id)
            SELECT
                CAST(COALESCE(SUM(group_size), 0) AS BIGINT) AS total_duplicates,
                COUNT(*) AS duplicate_groups,
                CAST(COALESCE(SUM((group_size - 1) * file_size), 0) AS BIGINT) AS wasted_space,
                CAST(COALESCE(MAX(group_size), 0) AS BIGINT) AS largest_duplicate_group,
                CAST(COALESCE(AVG(group_size), 0) AS DOUBLE PRECISION) AS average_group_size
            FROM duplicate_analysis
            "#,
        );

        let stats = qb
            .build_query_as::<DuplicateStats>()
            .fetch_one(self.db.pool())
            .await?;
        Ok(stats)
    }

    /// Largest duplicate groups by member count or total size.
    ///
    /// With a storage root, groups with at least one live member on that root
    /// are listed, counting members on every root.
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    pub async fn get_top_duplicate_groups(
        &self,
        sort: DuplicateSort,
        limit: i64,
        storage_root: Option<&str>,
    ) -> Result<Vec<DuplicateGroupStats>, AppError> {
        let mut qb = QueryBuilder::<Db>::new(
            "SELECT f.duplicate_group_id AS group_id, COUNT(*) AS file_count, \
             CAST(COALESCE(SUM(f.size), 0) AS BIGINT) AS total_size, MIN(f.path) AS sample_path",
        );
        qb.push(LIVE_FILES)
            .push(" AND f.is_duplicate = TRUE AND f.duplicate_group_id IS NOT NULL");
        if let Some(name) = storage_root {
            qb.push(
                " AND f.duplicate_group_id IN (SELECT m.duplicate_group_id FROM files m \
                 JOIN storage_roots sr ON m.storage_root_id = sr.id \
                 WHERE m.deleted = FALSE AND m.duplicate_group_id IS NOT NULL AND sr.name = ",
            )
            .push_bind(name)
            .push(")");
        }
        qb.push(" GROUP BY f.duplicate_group_id ORDER BY ");
        qb.push(match sort {
            DuplicateSort::Count => "file_count DESC",
            DuplicateSort::Size => "total_size DESC",
        });
        qb.push(", group_id LIMIT ").push_bind(limit);

        let rows = qb
            .build_query_as::<DuplicateGroupRow>()
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(DuplicateGroupStats::from).collect())
    }

    /// Access counts over the last `days` days.
    ///
    /// Popular extensions and directories rank the files accessed in the window.
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    pub async fn get_access_patterns(&self, storage_root: Option<&str>, days: u32) -> Result<AccessPatterns, AppError> {
        let now = Utc::now();
        let cutoff = now - Duration::days(i64::from(days));

        let mut qb = QueryBuilder::<Db>::new("SELECT COUNT(CASE WHEN f.accessed_at > ");
        qb.push_bind(cutoff).push(
            " THEN 1 END) AS recently_accessed, COUNT(CASE WHEN f.accessed_at IS NULL THEN 1 END) AS never_accessed",
        );
        qb.push(LIVE_FILES);
        push_root_filter(&mut qb, storage_root);
        let (recently_accessed, never_accessed): (i64, i64) = qb
            .build_query_as()
            .fetch_one(self.db.pool())
            .await?;

        let window = days as usize;
        let today = now.date_naive();
        let first_day = window_start(today, window).and_time(NaiveTime::MIN).and_utc();
        let day = self.db.dialect().date_of("f.accessed_at");
        let mut qb = QueryBuilder::<Db>::new(format!("SELECT {day} AS day, COUNT(*) AS accesses"));
        qb.push(LIVE_FILES)
            .push(" AND f.accessed_at >= ")
            .push_bind(first_day);
        push_root_filter(&mut qb, storage_root);
        qb.push(format!(" GROUP BY {day}"));
        let per_day: Vec<(NaiveDate, i64)> = qb
            .build_query_as()
            .fetch_all(self.db.pool())
            .await?;

        let mut qb = QueryBuilder::<Db>::new("SELECT f.extension");
        qb.push(LIVE_FILES)
            .push(" AND f.extension IS NOT NULL AND f.accessed_at > ")
            .push_bind(cutoff);
        push_root_filter(&mut qb, storage_root);
        qb.push(" GROUP BY f.extension ORDER BY COUNT(*) DESC, f.extension LIMIT ")
            .push_bind(TOP_ACCESS_ENTRIES);
        let popular_extensions: Vec<String> = qb
            .build_query_scalar()
            .fetch_all(self.db.pool())
            .await?;

        let mut qb = QueryBuilder::<Db>::new("SELECT d.path FROM files f JOIN files d ON f.parent_id = d.id");
        qb.push(" WHERE f.is_directory = FALSE AND f.deleted = FALSE AND f.accessed_at > ")
            .push_bind(cutoff);
        push_root_filter(&mut qb, storage_root);
        qb.push(" GROUP BY d.path ORDER BY COUNT(*) DESC, d.path LIMIT ")
            .push_bind(TOP_ACCESS_ENTRIES);
        let popular_directories: Vec<String> = qb
            .build_query_scalar()
            .fetch_all(self.db.pool())
            .await?;

        Ok(AccessPatterns {
            recently_accessed,
            never_accessed,
            access_frequency: daily_series(&per_day, today, window),
            popular_extensions,
            popular_directories,
        })
    }

    /// Files added per month over the last `months` months, with running totals
    /// that start from the live files created before the window.
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    pub async fn get_growth_trends(&self, storage_root: Option<&str>, months: u32) -> Result<GrowthTrends, AppError> {
        let cutoff = Utc::now()
            .checked_sub_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut qb = QueryBuilder::<Db>::new("SELECT COUNT(*), CAST(COALESCE(SUM(f.size), 0) AS BIGINT)");
        qb.push(LIVE_FILES).push(" AND f.created_at <= ").push_bind(cutoff);
        push_root_filter(&mut qb, storage_root);
        let (base_files, base_size): (i64, i64) = qb
            .build_query_as()
            .fetch_one(self.db.pool())
            .await?;

        let month = self.db.dialect().month_of("f.created_at");
        let mut qb = QueryBuilder::<Db>::new(format!(
            "SELECT {month} AS month, COUNT(*) AS files_added, \
             CAST(COALESCE(SUM(f.size), 0) AS BIGINT) AS size_added",
        ));
        qb.push(LIVE_FILES).push(" AND f.created_at > ").push_bind(cutoff);
        push_root_filter(&mut qb, storage_root);
        qb.push(format!(" GROUP BY {month} ORDER BY {month}"));
        let rows = qb
            .build_query_as::<MonthRow>()
            .fetch_all(self.db.pool())
            .await?;

        let (mut total_files, mut total_size) = (base_files, base_size);
        let monthly_growth: Vec<MonthlyGrowth> = rows
            .into_iter()
            .map(|row| {
                total_files += row.files_added;
                total_size += row.size_added;
                MonthlyGrowth {
                    month: row.month,
                    files_added: row.files_added,
                    size_added: row.size_added,
                    total_files,
                    total_size,
                }
            })
            .collect();

        let file_growth_rate = growth_rate(base_files, total_files);
        let size_growth_rate = growth_rate(base_size, total_size);
        Ok(GrowthTrends {
            monthly_growth,
            total_growth_rate: (file_growth_rate + size_growth_rate) / 2.0,
            file_growth_rate,
            size_growth_rate,
        })
    }

    /// Page of recorded scans, newest first, with the total matching count.
    #[tracing::instrument(skip(self), fields(db.table = "scan_history", db.operation = "select_list"))]
    pub async fn get_scan_history(
        &self,
        storage_root: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ScanHistoryItem>, i64), AppError> {
        let from = " FROM scan_history sh JOIN storage_roots sr ON sh.storage_root_id = sr.id";

        let mut count_qb = QueryBuilder::<Db>::new(format!("SELECT COUNT(*){}", from));
        if let Some(name) = storage_root {
            count_qb.push(" WHERE sr.name = ").push_bind(name);
        }
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.db.pool())
            .await?;

        let mut qb = QueryBuilder::<Db>::new(format!(
            "SELECT sh.id, sr.name AS storage_root_name, sh.scan_type, sh.status, sh.start_time, sh.end_time, \
             sh.files_processed, sh.files_added, sh.files_updated, sh.files_deleted, sh.error_count, \
             sh.error_message{}",
            from
        ));
        if let Some(name) = storage_root {
            qb.push(" WHERE sr.name = ").push_bind(name);
        }
        qb.push(" ORDER BY sh.start_time DESC, sh.id DESC LIMIT ")
            .push_bind(limit.max(0))
            .push(" OFFSET ")
            .push_bind(offset.max(0));

        let items = qb
            .build_query_as::<ScanHistoryItem>()
            .fetch_all(self.db.pool())
            .await?;
        Ok((items, total))
    }

    #[tracing::instrument(skip(self, scan), fields(db.table = "scan_history", db.operation = "insert", storage_root_id = scan.storage_root_id))]
    pub async fn create_scan_history(&self, scan: &NewScanHistory) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO scan_history (storage_root_id, scan_type, status, start_time, end_time, \
             files_processed, files_added, files_updated, files_deleted, error_count, error_message) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(scan.storage_root_id)
            .push_bind(&scan.scan_type)
            .push_bind(&scan.status)
            .push_bind(scan.start_time)
            .push_bind(scan.end_time)
            .push_bind(scan.files_processed)
            .push_bind(scan.files_added)
            .push_bind(scan.files_updated)
            .push_bind(scan.files_deleted)
            .push_bind(scan.error_count)
            .push_bind(scan.error_message.as_deref());
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }
}
