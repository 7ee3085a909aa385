use catalog_core::{
    models::{
        DirectoryInfo, File, FileMetadata, FileWithMetadata, NewFile, NewStorageRoot,
        PaginationOptions, SearchFilter, SearchResult, SortOptions, StorageRoot,
    },
    AppError,
};
use chrono::Utc;
use sqlx::QueryBuilder;

use crate::db::database::{Database, Db};

const FILE_SELECT: &str = r#"
    SELECT f.id, f.storage_root_id, sr.name AS storage_root_name, f.path, f.name, f.extension,
           f.mime_type, f.file_type, f.size, f.is_directory, f.created_at, f.modified_at,
           f.accessed_at, f.deleted, f.deleted_at, f.last_scan_at, f.last_verified_at,
           f.md5, f.sha256, f.sha1, f.blake3, f.quick_hash, f.is_duplicate,
           f.duplicate_group_id, f.parent_id
"#;

const FILE_FROM: &str = " FROM files f JOIN storage_roots sr ON f.storage_root_id = sr.id";

const ROOT_COLUMNS: &str = r#"
    id, name, protocol, host, port, path, username, password, domain,
    mount_point, options, url, enabled, max_depth,
    enable_duplicate_detection, enable_metadata_extraction, include_patterns,
    exclude_patterns, created_at, updated_at, last_scan_at
"#;

#[derive(Debug, Clone, Copy)]
enum DirectoryOrder {
    TotalSize,
    DuplicateCount,
}

impl DirectoryOrder {
    fn column(self) -> &'static str {
        match self {
            DirectoryOrder::TotalSize => "total_size",
            DirectoryOrder::DuplicateCount => "duplicate_count",
        }
    }
}

/// Split a path into its parent directory and final component.
///
/// Top-level entries ("/name") and bare names have no parent directory.
pub fn split_parent(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some(("", name)) => (None, name),
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    }
}

/// Rewrite `path` from under `old_root` to under `new_root`.
///
/// Only whole path components match: `/ab/x` is not under `/a`.
pub fn rebase_path(path: &str, old_root: &str, new_root: &str) -> String {
    if path == old_root {
        return new_root.to_string();
    }
    match path.strip_prefix(old_root) {
        Some(rest) if rest.starts_with('/') => format!("{}{}", new_root, rest),
        _ => path.to_string(),
    }
}

/// Escape `\`, `%` and `_` so `value` matches literally in a `LIKE ... ESCAPE '\'` pattern
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_search_filters<'a>(qb: &mut QueryBuilder<'a, Db>, filter: &'a SearchFilter) {
    qb.push(" WHERE 1=1");

    if !filter.include_deleted {
        qb.push(" AND f.deleted = FALSE");
    }
    if !filter.query.is_empty() {
        let pattern = format!("%{}%", filter.query);
        qb.push(" AND (f.name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR f.path LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if !filter.path.is_empty() {
        qb.push(" AND f.path LIKE ").push_bind(format!("%{}%", filter.path));
    }
    if !filter.name.is_empty() {
        qb.push(" AND f.name LIKE ").push_bind(format!("%{}%", filter.name));
    }
    if !filter.extension.is_empty() {
        qb.push(" AND f.extension = ").push_bind(&filter.extension);
    }
    if !filter.file_type.is_empty() {
        qb.push(" AND f.file_type = ").push_bind(&filter.file_type);
    }
    if !filter.mime_type.is_empty() {
        qb.push(" AND f.mime_type = ").push_bind(&filter.mime_type);
    }
    if !filter.storage_roots.is_empty() {
        qb.push(" AND sr.name IN (");
        let mut names = qb.separated(", ");
        for root in &filter.storage_roots {
            names.push_bind(root);
        }
        names.push_unseparated(")");
    }
    if let Some(min_size) = filter.min_size {
        qb.push(" AND f.size >= ").push_bind(min_size);
    }
    if let Some(max_size) = filter.max_size {
        qb.push(" AND f.size <= ").push_bind(max_size);
    }
    if let Some(after) = filter.modified_after {
        qb.push(" AND f.modified_at >= ").push_bind(after);
    }
    if let Some(before) = filter.modified_before {
        qb.push(" AND f.modified_at <= ").push_bind(before);
    }
    if filter.only_duplicates {
        qb.push(" AND f.is_duplicate = TRUE");
    } else if filter.exclude_duplicates {
        qb.push(" AND f.is_duplicate = FALSE");
    }
    if !filter.include_directories {
        qb.push(" AND f.is_directory = FALSE");
    }
}

fn push_directory_filter<'a>(qb: &mut QueryBuilder<'a, Db>, storage_root_name: &'a str, path: &str) {
    qb.push(" WHERE sr.name = ")
        .push_bind(storage_root_name)
        .push(" AND f.deleted = FALSE");

    if path == "/" || path.is_empty() {
        qb.push(" AND f.parent_id IS NULL");
    } else {
        let prefix = escape_like(path);
        qb.push(" AND f.path LIKE ")
            .push_bind(format!("{}/%", prefix))
            .push(" ESCAPE '\\' AND f.path NOT LIKE ")
            .push_bind(format!("{}/%/%", prefix))
            .push(" ESCAPE '\\'");
    }
}

/// Storage roots, scanned files and their key/value metadata
#[derive(Clone)]
pub struct FileRepository {
    db: Database,
}

impl FileRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, root), fields(db.table = "storage_roots", db.operation = "insert", name = %root.name))]
    pub async fn create_storage_root(&self, root: &NewStorageRoot) -> Result<i64, AppError> {
        let now = Utc::now();
        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO storage_roots (name, protocol, host, port, path, username, password, domain, \
             mount_point, options, url, enabled, max_depth, enable_duplicate_detection, \
             enable_metadata_extraction, include_patterns, exclude_patterns, created_at, updated_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(&root.name)
            .push_bind(&root.protocol)
            .push_bind(root.host.as_deref())
            .push_bind(root.port)
            .push_bind(root.path.as_deref())
            .push_bind(root.username.as_deref())
            .push_bind(root.password.as_deref())
            .push_bind(root.domain.as_deref())
            .push_bind(root.mount_point.as_deref())
            .push_bind(root.options.as_deref())
            .push_bind(root.url.as_deref())
            .push_bind(root.enabled)
            .push_bind(root.max_depth)
            .push_bind(root.enable_duplicate_detection)
            .push_bind(root.enable_metadata_extraction)
            .push_bind(root.include_patterns.as_deref())
            .push_bind(root.exclude_patterns.as_deref())
            .push_bind(now)
            .push_bind(now);
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_roots", db.operation = "select_list"))]
    pub async fn get_storage_roots(&self) -> Result<Vec<StorageRoot>, AppError> {
        let sql = format!("SELECT {} FROM storage_roots ORDER BY name", ROOT_COLUMNS);
        let roots = sqlx::query_as::<Db, StorageRoot>(&sql)
            .fetch_all(self.db.pool())
            .await?;
        Ok(roots)
    }

    #[tracing::instrument(skip(self, file), fields(db.table = "files", db.operation = "insert", path = %file.path))]
    pub async fn create_file(&self, file: &NewFile) -> Result<i64, AppError> {
        let now = Utc::now();
        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO files (storage_root_id, path, name, extension, mime_type, file_type, size, \
             is_directory, created_at, modified_at, deleted, last_scan_at, md5, sha256, sha1, blake3, \
             quick_hash, is_duplicate, duplicate_group_id, parent_id) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(file.storage_root_id)
            .push_bind(&file.path)
            .push_bind(&file.name)
            .push_bind(file.extension.as_deref())
            .push_bind(file.mime_type.as_deref())
            .push_bind(file.file_type.as_deref())
            .push_bind(file.size)
            .push_bind(file.is_directory)
            .push_bind(now)
            .push_bind(file.modified_at.unwrap_or(now))
            .push_bind(false)
            .push_bind(now)
            .push_bind(file.md5.as_deref())
            .push_bind(file.sha256.as_deref())
            .push_bind(file.sha1.as_deref())
            .push_bind(file.blake3.as_deref())
            .push_bind(file.quick_hash.as_deref())
            .push_bind(file.is_duplicate)
            .push_bind(file.duplicate_group_id)
            .push_bind(file.parent_id);
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    #[tracing::instrument(skip(self, value), fields(db.table = "file_metadata", db.operation = "insert", file_id = %file_id))]
    pub async fn add_file_metadata(
        &self,
        file_id: i64,
        key: &str,
        value: &str,
        data_type: &str,
    ) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Db>::new("INSERT INTO file_metadata (file_id, key, value, data_type) VALUES (");
        let mut values = qb.separated(", ");
        values
            .push_bind(file_id)
            .push_bind(key)
            .push_bind(value)
            .push_bind(data_type);
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    /// File with its storage root name and metadata
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = %id))]
    pub async fn get_file_by_id(&self, id: i64) -> Result<FileWithMetadata, AppError> {
        let sql = format!("{}{} WHERE f.id = $1", FILE_SELECT, FILE_FROM);
        let file = sqlx::query_as::<Db, File>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("file not found".to_string()))?;

        let metadata = self.get_file_metadata(id).await?;
        Ok(FileWithMetadata { file, metadata })
    }

    /// Direct children of `path` within a storage root
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select_list", storage_root = %storage_root_name))]
    pub async fn get_directory_contents(
        &self,
        storage_root_name: &str,
        path: &str,
        pagination: PaginationOptions,
        sort: SortOptions,
    ) -> Result<SearchResult, AppError> {
        let mut count_qb = QueryBuilder::<Db>::new(format!("SELECT COUNT(*){}", FILE_FROM));
        push_directory_filter(&mut count_qb, storage_root_name, path);
        let total_count: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.db.pool())
            .await?;

        let mut qb = QueryBuilder::<Db>::new(format!("{}{}", FILE_SELECT, FILE_FROM));
        push_directory_filter(&mut qb, storage_root_name, path);
        qb.push(sort.order_by_clause())
            .push(" LIMIT ")
            .push_bind(pagination.limit)
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let files = qb
            .build_query_as::<File>()
            .fetch_all(self.db.pool())
            .await?
            .into_iter()
            .map(|file| FileWithMetadata {
                file,
                metadata: Vec::new(),
            })
            .collect();

        Ok(SearchResult {
            files,
            total_count,
            page: pagination.page,
            limit: pagination.limit,
            total_pages: pagination.total_pages(total_count),
        })
    }

    #[tracing::instrument(skip(self, filter), fields(db.table = "files", db.operation = "search"))]
    pub async fn search_files(
        &self,
        filter: &SearchFilter,
        pagination: PaginationOptions,
        sort: SortOptions,
    ) -> Result<SearchResult, AppError> {
        let mut count_qb = QueryBuilder::<Db>::new(format!("SELECT COUNT(*){}", FILE_FROM));
        push_search_filters(&mut count_qb, filter);
        let total_count: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.db.pool())
            .await?;

        let mut qb = QueryBuilder::<Db>::new(format!("{}{}", FILE_SELECT, FILE_FROM));
        push_search_filters(&mut qb, filter);
        qb.push(sort.order_by_clause())
            .push(" LIMIT ")
            .push_bind(pagination.limit)
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = qb
            .build_query_as::<File>()
            .fetch_all(self.db.pool())
            .await?;

        let mut files = Vec::with_capacity(rows.len());
        for file in rows {
            let metadata = self.get_file_metadata(file.id).await?;
            files.push(FileWithMetadata { file, metadata });
        }

        Ok(SearchResult {
            files,
            total_count,
            page: pagination.page,
            limit: pagination.limit,
            total_pages: pagination.total_pages(total_count),
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    pub async fn get_directories_sorted_by_size(
        &self,
        storage_root_name: &str,
        pagination: PaginationOptions,
        ascending: bool,
    ) -> Result<Vec<DirectoryInfo>, AppError> {
        self.directories_sorted(storage_root_name, pagination, ascending, DirectoryOrder::TotalSize)
            .await
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    pub async fn get_directories_sorted_by_duplicates(
        &self,
        storage_root_name: &str,
        pagination: PaginationOptions,
        ascending: bool,
    ) -> Result<Vec<DirectoryInfo>, AppError> {
        self.directories_sorted(
            storage_root_name,
            pagination,
            ascending,
            DirectoryOrder::DuplicateCount,
        )
        .await
    }

    async fn directories_sorted(
        &self,
        storage_root_name: &str,
        pagination: PaginationOptions,
        ascending: bool,
        order: DirectoryOrder,
    ) -> Result<Vec<DirectoryInfo>, AppError> {
        let direction = if ascending { "ASC" } else { "DESC" };
        let sql = format!(
            r#"
            SELECT f.path AS path, f.name AS name, sr.name AS storage_root_name,
                   COUNT(CASE WHEN f2.is_directory = FALSE THEN 1 END) AS file_count,
                   COUNT(CASE WHEN f2.is_directory = TRUE THEN 1 END) AS directory_count,
                   CAST(COALESCE(SUM(CASE WHEN f2.is_directory = FALSE THEN f2.size ELSE 0 END), 0) AS BIGINT) AS total_size,
                   COUNT(CASE WHEN f2.is_duplicate = TRUE THEN 1 END) AS duplicate_count,
                   MAX(f.modified_at) AS modified_at
            FROM files f
            JOIN storage_roots sr ON f.storage_root_id = sr.id
            LEFT JOIN files f2 ON SUBSTR(f2.path, 1, LENGTH(f.path) + 1) = f.path || '/'
                AND f2.storage_root_id = f.storage_root_id
                AND f2.deleted = FALSE
            WHERE f.is_directory = TRUE AND f.deleted = FALSE AND sr.name = $1
            GROUP BY f.path, f.name, sr.name
            ORDER BY {} {}, f.path ASC
            LIMIT $2 OFFSET $3
            "#,
            order.column(),
            direction
        );

        let directories = sqlx::query_as::<Db, DirectoryInfo>(&sql)
            .bind(storage_root_name)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(self.db.pool())
            .await?;
        Ok(directories)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    pub async fn get_file_by_path_and_storage(
        &self,
        path: &str,
        storage_root_name: &str,
    ) -> Result<Option<File>, AppError> {
        let sql = format!("{}{} WHERE f.path = $1 AND sr.name = $2", FILE_SELECT, FILE_FROM);
        let file = sqlx::query_as::<Db, File>(&sql)
            .bind(path)
            .bind(storage_root_name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(file)
    }

    /// Live files whose md5, sha256, sha1, blake3 or quick hash equals `hash`
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select_list"))]
    pub async fn get_files_with_hash(
        &self,
        hash: &str,
        storage_root_name: &str,
    ) -> Result<Vec<File>, AppError> {
        let sql = format!(
            "{}{} WHERE (f.md5 = $1 OR f.sha256 = $1 OR f.sha1 = $1 OR f.blake3 = $1 OR f.quick_hash = $1) \
             AND sr.name = $2 AND f.deleted = FALSE ORDER BY f.id",
            FILE_SELECT, FILE_FROM
        );
        let files = sqlx::query_as::<Db, File>(&sql)
            .bind(hash)
            .bind(storage_root_name)
            .fetch_all(self.db.pool())
            .await?;
        Ok(files)
    }

    /// Move a file: new path and name, parent re-resolved from the directory part
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %file_id))]
    pub async fn update_file_path(&self, file_id: i64, new_path: &str) -> Result<(), AppError> {
        let (dir, name) = split_parent(new_path);

        let parent_id: Option<i64> = match dir {
            Some(dir) if dir != "." => {
                sqlx::query_scalar(
                    r#"
                    SELECT id FROM files
                    WHERE path = $1 AND is_directory = TRUE
                      AND storage_root_id = (SELECT storage_root_id FROM files WHERE id = $2)
                    LIMIT 1
                    "#,
                )
                .bind(dir)
                .bind(file_id)
                .fetch_optional(self.db.pool())
                .await?
            }
            _ => None,
        };

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE files
            SET path = $1, name = $2, parent_id = $3, modified_at = $4, last_scan_at = $4
            WHERE id = $5
            "#,
        )
        .bind(new_path)
        .bind(name)
        .bind(parent_id)
        .bind(now)
        .bind(file_id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Rename a directory and everything below it, parents before children
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update"))]
    pub async fn update_directory_paths(
        &self,
        old_path: &str,
        new_path: &str,
        storage_root_name: &str,
    ) -> Result<(), AppError> {
        let entries: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT id, path FROM files
            WHERE storage_root_id = (SELECT id FROM storage_roots WHERE name = $1)
              AND (path = $2 OR path LIKE $3 ESCAPE '\')
            ORDER BY LENGTH(path) ASC, id ASC
            "#,
        )
        .bind(storage_root_name)
        .bind(old_path)
        .bind(format!("{}/%", escape_like(old_path)))
        .fetch_all(self.db.pool())
        .await?;

        for (id, path) in &entries {
            let updated = rebase_path(path, old_path, new_path);
            self.update_file_path(*id, &updated).await?;
        }

        tracing::debug!(updated = entries.len(), "Directory paths rewritten");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %file_id))]
    pub async fn mark_file_as_deleted(&self, file_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE files SET deleted = TRUE, deleted_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(file_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %file_id))]
    pub async fn restore_deleted_file(&self, file_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE files SET deleted = FALSE, deleted_at = NULL, last_scan_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(file_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Record a new size and quick hash without a full rescan
    #[tracing::instrument(skip(self, quick_hash), fields(db.table = "files", db.operation = "update", db.record_id = %file_id))]
    pub async fn update_file_metadata(
        &self,
        file_id: i64,
        size: i64,
        quick_hash: Option<&str>,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE files SET size = $1, quick_hash = $2, last_scan_at = $3, modified_at = $3 WHERE id = $4",
        )
        .bind(size)
        .bind(quick_hash)
        .bind(now)
        .bind(file_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn get_file_metadata(&self, file_id: i64) -> Result<Vec<FileMetadata>, AppError> {
        let metadata = sqlx::query_as::<Db, FileMetadata>(
            "SELECT id, file_id, key, value, data_type FROM file_metadata WHERE file_id = $1 ORDER BY key",
        )
        .bind(file_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(metadata)
    }
}
