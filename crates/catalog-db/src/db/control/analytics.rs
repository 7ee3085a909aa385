use catalog_core::{
    models::{
        AnalyticsEvent, DeviceInfo, GeographicData, Location, MediaAccessCount, MediaAccessLog, SessionData,
        UserGrowthPoint,
    },
    AppError,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};
use std::collections::HashMap;

use crate::db::database::{Database, Db};
use crate::db::{json, stats};

const ACCESS_COLUMNS: &str = "id, user_id, media_id, action, device_info, location, ip_address, \
                              user_agent, playback_duration, access_time";

const EVENT_COLUMNS: &str = "id, user_id, event_type, event_category, data, device_info, location, \
                             ip_address, user_agent, timestamp";

#[derive(Debug, FromRow)]
struct AccessRow {
    id: i64,
    user_id: i64,
    media_id: i64,
    action: String,
    device_info: Option<String>,
    location: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    playback_duration: Option<i64>,
    access_time: DateTime<Utc>,
}

impl From<AccessRow> for MediaAccessLog {
    fn from(row: AccessRow) -> Self {
        MediaAccessLog {
            id: row.id,
            user_id: row.user_id,
            media_id: row.media_id,
            action: row.action,
            device_info: json::decode_or_default::<Option<DeviceInfo>>(
                row.device_info.as_deref(),
                "media_access_logs.device_info",
            ),
            location: json::decode_or_default::<Option<Location>>(
                row.location.as_deref(),
                "media_access_logs.location",
            ),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            playback_duration: stats::duration_from_secs(row.playback_duration),
            access_time: row.access_time,
        }
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: i64,
    user_id: i64,
    event_type: String,
    event_category: String,
    data: Option<String>,
    device_info: Option<String>,
    location: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    timestamp: DateTime<Utc>,
}

impl From<EventRow> for AnalyticsEvent {
    fn from(row: EventRow) -> Self {
        AnalyticsEvent {
            id: row.id,
            user_id: row.user_id,
            event_type: row.event_type,
            event_category: row.event_category,
            data: row.data.unwrap_or_default(),
            device_info: json::decode_or_default::<Option<DeviceInfo>>(
                row.device_info.as_deref(),
                "analytics_events.device_info",
            ),
            location: json::decode_or_default::<Option<Location>>(row.location.as_deref(), "analytics_events.location"),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            timestamp: row.timestamp,
        }
    }
}

#[derive(Debug, FromRow)]
struct SessionSpanRow {
    user_id: i64,
    session_start: DateTime<Utc>,
    session_end: DateTime<Utc>,
}

/// Media access logs, analytics events and the aggregates built over them
#[derive(Clone)]
pub struct AnalyticsRepository {
    db: Database,
}

impl AnalyticsRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, access), fields(db.table = "media_access_logs", db.operation = "insert", user_id = %access.user_id))]
    pub async fn log_media_access(&self, access: &MediaAccessLog) -> Result<i64, AppError> {
        let device_info = json::encode_opt(access.device_info.as_ref())?;
        let location = json::encode_opt(access.location.as_ref())?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO media_access_logs (user_id, media_id, action, device_info, location, \
             ip_address, user_agent, playback_duration, access_time) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(access.user_id)
            .push_bind(access.media_id)
            .push_bind(&access.action)
            .push_bind(device_info)
            .push_bind(location)
            .push_bind(access.ip_address.as_deref())
            .push_bind(access.user_agent.as_deref())
            .push_bind(stats::duration_to_secs(access.playback_duration))
            .push_bind(access.access_time);
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    #[tracing::instrument(skip(self, event), fields(db.table = "analytics_events", db.operation = "insert", event_type = %event.event_type))]
    pub async fn log_event(&self, event: &AnalyticsEvent) -> Result<i64, AppError> {
        let device_info = json::encode_opt(event.device_info.as_ref())?;
        let location = json::encode_opt(event.location.as_ref())?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO analytics_events (user_id, event_type, event_category, data, device_info, \
             location, ip_address, user_agent, timestamp) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(event.user_id)
            .push_bind(&event.event_type)
            .push_bind(&event.event_category)
            .push_bind(&event.data)
            .push_bind(device_info)
            .push_bind(location)
            .push_bind(event.ip_address.as_deref())
            .push_bind(event.user_agent.as_deref())
            .push_bind(event.timestamp);
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    /// Newest accesses first, optionally narrowed to a user and/or a media item
    #[tracing::instrument(skip(self), fields(db.table = "media_access_logs", db.operation = "select_list"))]
    pub async fn get_media_access_logs(
        &self,
        user_id: Option<i64>,
        media_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MediaAccessLog>, AppError> {
        let mut qb = QueryBuilder::<Db>::new(format!("SELECT {} FROM media_access_logs WHERE 1 = 1", ACCESS_COLUMNS));
        if let Some(user_id) = user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(media_id) = media_id {
            qb.push(" AND media_id = ").push_bind(media_id);
        }
        qb.push(" ORDER BY access_time DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build_query_as::<AccessRow>().fetch_all(self.db.pool()).await?;
        Ok(rows.into_iter().map(MediaAccessLog::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_access_logs", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_user_media_access_logs(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MediaAccessLog>, AppError> {
        let sql = format!(
            "SELECT {} FROM media_access_logs WHERE user_id = $1 AND access_time BETWEEN $2 AND $3 \
             ORDER BY access_time DESC, id DESC",
            ACCESS_COLUMNS
        );
        let rows = sqlx::query_as::<Db, AccessRow>(&sql)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(MediaAccessLog::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "analytics_events", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_user_events(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AnalyticsEvent>, AppError> {
        let sql = format!(
            "SELECT {} FROM analytics_events WHERE user_id = $1 AND timestamp BETWEEN $2 AND $3 \
             ORDER BY timestamp DESC, id DESC",
            EVENT_COLUMNS
        );
        let rows = sqlx::query_as::<Db, EventRow>(&sql)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(AnalyticsEvent::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_access_logs", db.operation = "select_list"))]
    pub async fn get_all_media_access_logs(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MediaAccessLog>, AppError> {
        let sql = format!(
            "SELECT {} FROM media_access_logs WHERE access_time BETWEEN $1 AND $2 ORDER BY access_time DESC, id DESC",
            ACCESS_COLUMNS
        );
        let rows = sqlx::query_as::<Db, AccessRow>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(MediaAccessLog::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "count"))]
    pub async fn get_total_users(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Distinct users with at least one media access in the window
    #[tracing::instrument(skip(self), fields(db.table = "media_access_logs", db.operation = "count"))]
    pub async fn get_active_users(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM media_access_logs WHERE access_time BETWEEN $1 AND $2")
                .bind(start)
                .bind(end)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_access_logs", db.operation = "count"))]
    pub async fn get_total_media_accesses(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_access_logs WHERE access_time BETWEEN $1 AND $2")
            .bind(start)
            .bind(end)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "analytics_events", db.operation = "count"))]
    pub async fn get_total_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analytics_events WHERE timestamp BETWEEN $1 AND $2")
            .bind(start)
            .bind(end)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_access_logs", db.operation = "aggregate"))]
    pub async fn get_top_accessed_media(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<MediaAccessCount>, AppError> {
        let top = sqlx::query_as::<Db, MediaAccessCount>(
            r#"
            SELECT media_id, COUNT(*) AS access_count
            FROM media_access_logs
            WHERE access_time BETWEEN $1 AND $2
            GROUP BY media_id
            ORDER BY access_count DESC, media_id ASC
            LIMIT $3
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(top)
    }

    /// Registrations per day, oldest day first
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "aggregate"))]
    pub async fn get_user_growth_data(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UserGrowthPoint>, AppError> {
        let day = self.db.dialect().date_of("created_at");
        let sql = format!(
            "SELECT {day} AS date, COUNT(*) AS user_count FROM users \
             WHERE created_at BETWEEN $1 AND $2 \
             GROUP BY {day} ORDER BY {day} ASC",
        );
        let points = sqlx::query_as::<Db, UserGrowthPoint>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(self.db.pool())
            .await?;
        Ok(points)
    }

    /// First and last activity of each user's active sessions, per day
    #[tracing::instrument(skip(self), fields(db.table = "user_sessions", db.operation = "aggregate"))]
    pub async fn get_session_data(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<SessionData>, AppError> {
        let day = self.db.dialect().date_of("created_at");
        let sql = format!(
            "SELECT user_id, MIN(last_activity_at) AS session_start, MAX(last_activity_at) AS session_end \
             FROM user_sessions \
             WHERE created_at BETWEEN $1 AND $2 AND is_active = TRUE \
             GROUP BY user_id, {day} \
             ORDER BY session_start ASC, user_id ASC",
        );
        let rows = sqlx::query_as::<Db, SessionSpanRow>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SessionData {
                user_id: row.user_id,
                start_time: row.session_start,
                end_time: row.session_end,
                duration: (row.session_end - row.session_start).to_std().unwrap_or_default(),
            })
            .collect())
    }

    /// Media access events bucketed by the `file_type` in their payload
    #[tracing::instrument(skip(self), fields(db.table = "analytics_events", db.operation = "aggregate"))]
    pub async fn get_file_type_data(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, i64>, AppError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT
                CASE
                    WHEN LOWER(data) LIKE '%"file_type":"video%' THEN 'video'
                    WHEN LOWER(data) LIKE '%"file_type":"audio%' THEN 'audio'
                    WHEN LOWER(data) LIKE '%"file_type":"image%' THEN 'image'
                    WHEN LOWER(data) LIKE '%"file_type":"document%' THEN 'document'
                    ELSE 'other'
                END AS file_type,
                COUNT(*) AS count
            FROM analytics_events
            WHERE timestamp BETWEEN $1 AND $2 AND event_type = 'media_access'
            GROUP BY file_type
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;
        Ok(stats::to_count_map(rows))
    }

    /// Access counts for the 100 busiest locations, rolled up by country
    #[tracing::instrument(skip(self), fields(db.table = "media_access_logs", db.operation = "aggregate"))]
    pub async fn get_geographic_data(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<GeographicData, AppError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT location, COUNT(*) AS access_count
            FROM media_access_logs
            WHERE access_time BETWEEN $1 AND $2 AND location IS NOT NULL
            GROUP BY location
            ORDER BY access_count DESC, location ASC
            LIMIT 100
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;

        let mut geo = GeographicData::default();
        for (raw, access_count) in rows {
            match serde_json::from_str::<Location>(&raw) {
                Ok(location) => geo.add(location, access_count),
                Err(error) => tracing::debug!(error = %error, "Skipping malformed access location"),
            }
        }
        Ok(geo)
    }
}
