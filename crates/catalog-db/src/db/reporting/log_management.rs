use catalog_core::{
    models::{LogCollection, LogEntry, LogEntryFilters, LogShare, LogStatistics},
    AppError,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::{json, stats};

const COLLECTION_COLUMNS: &str = r#"
    id, user_id, name, description, components, log_level, start_time,
    end_time, created_at, completed_at, status, entry_count, filters
"#;

const ENTRY_COLUMNS: &str = "id, collection_id, timestamp, level, component, message, context";

const SHARE_COLUMNS: &str = r#"
    id, collection_id, user_id, share_token, share_type, expires_at,
    created_at, accessed_at, is_active, permissions, recipients
"#;

#[derive(Debug, FromRow)]
struct CollectionRow {
    id: i64,
    user_id: i64,
    name: String,
    description: Option<String>,
    components: Option<String>,
    log_level: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: String,
    entry_count: i64,
    filters: Option<String>,
}

impl TryFrom<CollectionRow> for LogCollection {
    type Error = AppError;

    fn try_from(row: CollectionRow) -> Result<Self, Self::Error> {
        Ok(LogCollection {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            components: json::decode(row.components.as_deref())?.unwrap_or_default(),
            log_level: row.log_level,
            start_time: row.start_time,
            end_time: row.end_time,
            created_at: row.created_at,
            completed_at: row.completed_at,
            status: row.status,
            entry_count: row.entry_count,
            filters: json::decode(row.filters.as_deref())?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: i64,
    collection_id: i64,
    timestamp: DateTime<Utc>,
    level: String,
    component: String,
    message: String,
    context: Option<String>,
}

impl TryFrom<EntryRow> for LogEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(LogEntry {
            id: row.id,
            collection_id: row.collection_id,
            timestamp: row.timestamp,
            level: row.level,
            component: row.component,
            message: row.message,
            context: json::decode(row.context.as_deref())?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, FromRow)]
struct ShareRow {
    id: i64,
    collection_id: i64,
    user_id: i64,
    share_token: String,
    share_type: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    accessed_at: Option<DateTime<Utc>>,
    is_active: bool,
    permissions: Option<String>,
    recipients: Option<String>,
}

impl TryFrom<ShareRow> for LogShare {
    type Error = AppError;

    fn try_from(row: ShareRow) -> Result<Self, Self::Error> {
        Ok(LogShare {
            id: row.id,
            collection_id: row.collection_id,
            user_id: row.user_id,
            share_token: row.share_token,
            share_type: row.share_type,
            expires_at: row.expires_at,
            created_at: row.created_at,
            accessed_at: row.accessed_at,
            is_active: row.is_active,
            permissions: json::decode(row.permissions.as_deref())?.unwrap_or_default(),
            recipients: json::decode(row.recipients.as_deref())?.unwrap_or_default(),
        })
    }
}

/// Log collections, their entries and share links
#[derive(Clone)]
pub struct LogManagementRepository {
    db: Database,
}

impl LogManagementRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, collection), fields(db.table = "log_collections", db.operation = "insert", user_id = %collection.user_id))]
    pub async fn create_log_collection(&self, collection: &mut LogCollection) -> Result<i64, AppError> {
        collection.created_at = json::or_now(collection.created_at, Utc::now());
        let components = json::encode(&collection.components)?;
        let filters = json::encode(&collection.filters)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO log_collections (user_id, name, description, components, log_level, start_time, \
             end_time, created_at, status, entry_count, filters) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(collection.user_id)
            .push_bind(&collection.name)
            .push_bind(collection.description.as_deref())
            .push_bind(components)
            .push_bind(&collection.log_level)
            .push_bind(collection.start_time)
            .push_bind(collection.end_time)
            .push_bind(collection.created_at)
            .push_bind(&collection.status)
            .push_bind(collection.entry_count)
            .push_bind(filters);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        collection.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "log_collections", db.operation = "select", db.record_id = %id))]
    pub async fn get_log_collection(&self, id: i64) -> Result<LogCollection, AppError> {
        let sql = format!("SELECT {} FROM log_collections WHERE id = $1", COLLECTION_COLUMNS);
        let row = sqlx::query_as::<Db, CollectionRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("log collection not found".to_string()))?;
        row.try_into()
    }

    #[tracing::instrument(skip(self, collection), fields(db.table = "log_collections", db.operation = "update", db.record_id = %collection.id))]
    pub async fn update_log_collection(&self, collection: &LogCollection) -> Result<(), AppError> {
        let components = json::encode(&collection.components)?;
        let filters = json::encode(&collection.filters)?;

        sqlx::query(
            r#"
            UPDATE log_collections
            SET name = $1, description = $2, components = $3, log_level = $4, start_time = $5,
                end_time = $6, completed_at = $7, status = $8, entry_count = $9, filters = $10
            WHERE id = $11
            "#,
        )
        .bind(&collection.name)
        .bind(collection.description.as_deref())
        .bind(components)
        .bind(&collection.log_level)
        .bind(collection.start_time)
        .bind(collection.end_time)
        .bind(collection.completed_at)
        .bind(&collection.status)
        .bind(collection.entry_count)
        .bind(filters)
        .bind(collection.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "log_collections", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_log_collections_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LogCollection>, AppError> {
        let sql = format!(
            "SELECT {} FROM log_collections WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            COLLECTION_COLUMNS
        );
        let rows = sqlx::query_as::<Db, CollectionRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(LogCollection::try_from).collect()
    }

    /// Remove a collection and its entries; a failed entry delete keeps the collection
    #[tracing::instrument(skip(self), fields(db.table = "log_collections", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_log_collection(&self, id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        let entries = sqlx::query("DELETE FROM log_entries WHERE collection_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM log_collections WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(entries, "Deleted log collection and its entries");
        Ok(())
    }

    #[tracing::instrument(skip(self, entry), fields(db.table = "log_entries", db.operation = "insert", collection_id = %entry.collection_id))]
    pub async fn create_log_entry(&self, entry: &mut LogEntry) -> Result<i64, AppError> {
        entry.timestamp = json::or_now(entry.timestamp, Utc::now());
        let context = json::encode(&entry.context)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO log_entries (collection_id, timestamp, level, component, message, context) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(entry.collection_id)
            .push_bind(entry.timestamp)
            .push_bind(&entry.level)
            .push_bind(&entry.component)
            .push_bind(&entry.message)
            .push_bind(context);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        entry.id = id;
        Ok(id)
    }

    /// Entries of a collection in chronological order
    #[tracing::instrument(skip(self, filters), fields(db.table = "log_entries", db.operation = "select_list", collection_id = %collection_id))]
    pub async fn get_log_entries(
        &self,
        collection_id: i64,
        filters: Option<&LogEntryFilters>,
    ) -> Result<Vec<LogEntry>, AppError> {
        let mut qb = QueryBuilder::<Db>::new(format!(
            "SELECT {} FROM log_entries WHERE collection_id = ",
            ENTRY_COLUMNS
        ));
        qb.push_bind(collection_id);

        if let Some(filters) = filters {
            if let Some(level) = filters.level.as_deref() {
                qb.push(" AND level = ").push_bind(level);
            }
            if let Some(component) = filters.component.as_deref() {
                qb.push(" AND component = ").push_bind(component);
            }
            if let Some(start) = filters.start_time {
                qb.push(" AND timestamp >= ").push_bind(start);
            }
            if let Some(end) = filters.end_time {
                qb.push(" AND timestamp <= ").push_bind(end);
            }
            if let Some(search) = filters.search.as_deref().filter(|s| !s.is_empty()) {
                qb.push(" AND message LIKE ").push_bind(format!("%{}%", search));
            }
        }

        qb.push(" ORDER BY timestamp ASC, id ASC");

        if let Some(filters) = filters.filter(|f| f.limit > 0) {
            qb.push(" LIMIT ").push_bind(filters.limit);
            if filters.offset > 0 {
                qb.push(" OFFSET ").push_bind(filters.offset);
            }
        }

        let rows = qb.build_query_as::<EntryRow>().fetch_all(self.db.pool()).await?;
        rows.into_iter().map(LogEntry::try_from).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "log_entries", db.operation = "delete", collection_id = %collection_id))]
    pub async fn delete_log_entries_by_collection(&self, collection_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM log_entries WHERE collection_id = $1")
            .bind(collection_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Latest entries of one component, newest first
    #[tracing::instrument(skip(self), fields(db.table = "log_entries", db.operation = "select_list"))]
    pub async fn get_recent_log_entries(&self, component: &str, limit: i64) -> Result<Vec<LogEntry>, AppError> {
        let sql = format!(
            "SELECT {} FROM log_entries WHERE component = $1 ORDER BY timestamp DESC, id DESC LIMIT $2",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query_as::<Db, EntryRow>(&sql)
            .bind(component)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(LogEntry::try_from).collect()
    }

    #[tracing::instrument(skip(self, share), fields(db.table = "log_shares", db.operation = "insert", collection_id = %share.collection_id))]
    pub async fn create_log_share(&self, share: &mut LogShare) -> Result<i64, AppError> {
        share.created_at = json::or_now(share.created_at, Utc::now());
        let permissions = json::encode(&share.permissions)?;
        let recipients = json::encode(&share.recipients)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO log_shares (collection_id, user_id, share_token, share_type, expires_at, \
             created_at, is_active, permissions, recipients) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(share.collection_id)
            .push_bind(share.user_id)
            .push_bind(&share.share_token)
            .push_bind(&share.share_type)
            .push_bind(share.expires_at)
            .push_bind(share.created_at)
            .push_bind(share.is_active)
            .push_bind(permissions)
            .push_bind(recipients);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        share.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "log_shares", db.operation = "select", db.record_id = %id))]
    pub async fn get_log_share(&self, id: i64) -> Result<LogShare, AppError> {
        let sql = format!("SELECT {} FROM log_shares WHERE id = $1", SHARE_COLUMNS);
        let row = sqlx::query_as::<Db, ShareRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("log share not found".to_string()))?;
        row.try_into()
    }

    #[tracing::instrument(skip(self, token), fields(db.table = "log_shares", db.operation = "select"))]
    pub async fn get_log_share_by_token(&self, token: &str) -> Result<LogShare, AppError> {
        let sql = format!("SELECT {} FROM log_shares WHERE share_token = $1", SHARE_COLUMNS);
        let row = sqlx::query_as::<Db, ShareRow>(&sql)
            .bind(token)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("log share not found".to_string()))?;
        row.try_into()
    }

    #[tracing::instrument(skip(self, share), fields(db.table = "log_shares", db.operation = "update", db.record_id = %share.id))]
    pub async fn update_log_share(&self, share: &LogShare) -> Result<(), AppError> {
        let permissions = json::encode(&share.permissions)?;
        let recipients = json::encode(&share.recipients)?;

        sqlx::query(
            r#"
            UPDATE log_shares
            SET share_type = $1, expires_at = $2, accessed_at = $3, is_active = $4,
                permissions = $5, recipients = $6
            WHERE id = $7
            "#,
        )
        .bind(&share.share_type)
        .bind(share.expires_at)
        .bind(share.accessed_at)
        .bind(share.is_active)
        .bind(permissions)
        .bind(recipients)
        .bind(share.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "log_shares", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_log_shares_by_user(&self, user_id: i64) -> Result<Vec<LogShare>, AppError> {
        let sql = format!(
            "SELECT {} FROM log_shares WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            SHARE_COLUMNS
        );
        let rows = sqlx::query_as::<Db, ShareRow>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(LogShare::try_from).collect()
    }

    /// Deactivate every active share whose expiry has passed
    #[tracing::instrument(skip(self), fields(db.table = "log_shares", db.operation = "update"))]
    pub async fn cleanup_expired_shares(&self) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE log_shares SET is_active = FALSE WHERE expires_at < $1 AND is_active = TRUE")
            .bind(Utc::now())
            .execute(self.db.pool())
            .await?;

        let deactivated = result.rows_affected();
        tracing::info!(deactivated, "Deactivated expired log shares");
        Ok(deactivated)
    }

    /// Delete collections created before `older_than` along with their entries
    #[tracing::instrument(skip(self), fields(db.table = "log_collections", db.operation = "delete"))]
    pub async fn cleanup_old_collections(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "DELETE FROM log_entries WHERE collection_id IN \
             (SELECT id FROM log_collections WHERE created_at < $1)",
        )
        .bind(older_than)
        .execute(&mut **tx)
        .await?;

        let removed = sqlx::query("DELETE FROM log_collections WHERE created_at < $1")
            .bind(older_than)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        tracing::info!(removed, "Cleaned up log collections");
        Ok(removed)
    }

    #[tracing::instrument(skip(self), fields(db.table = "log_collections", db.operation = "aggregate", user_id = %user_id))]
    pub async fn get_log_statistics(&self, user_id: i64) -> Result<LogStatistics, AppError> {
        let now = Utc::now();

        let total_collections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM log_collections WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        let total_entries: i64 = sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(entry_count), 0) AS BIGINT) FROM log_collections WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let active_shares: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM log_shares WHERE user_id = $1 AND is_active = TRUE AND expires_at > $2",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(self.db.pool())
        .await?;

        let by_status: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM log_collections WHERE user_id = $1 GROUP BY status")
                .bind(user_id)
                .fetch_all(self.db.pool())
                .await?;

        let recent_collections: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM log_collections WHERE user_id = $1 AND created_at > $2")
                .bind(user_id)
                .bind(now - Duration::days(7))
                .fetch_one(self.db.pool())
                .await?;

        Ok(LogStatistics {
            total_collections,
            total_entries,
            active_shares,
            collections_by_status: stats::to_count_map(by_status),
            recent_collections,
        })
    }
}
