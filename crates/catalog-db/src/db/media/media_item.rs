use catalog_core::{
    models::{CastCrew, DuplicateGroup, MediaItem, MediaType},
    AppError,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Row};
use std::collections::HashMap;

use crate::db::database::{Database, Db};
use crate::db::json;

const ITEM_COLUMNS: &str = r#"
    id, media_type_id, title, original_title, year, description,
    genre, director, cast_crew, rating, runtime, language, country,
    status, parent_id, season_number, episode_number, track_number,
    first_detected, last_updated
"#;

const TYPE_COLUMNS: &str =
    "id, name, description, detection_patterns, metadata_providers, created_at, updated_at";

#[derive(Debug, FromRow)]
struct MediaItemRow {
    id: i64,
    media_type_id: i64,
    title: String,
    original_title: Option<String>,
    year: Option<i32>,
    description: Option<String>,
    genre: Option<String>,
    director: Option<String>,
    cast_crew: Option<String>,
    rating: Option<f64>,
    runtime: Option<i32>,
    language: Option<String>,
    country: Option<String>,
    status: String,
    parent_id: Option<i64>,
    season_number: Option<i32>,
    episode_number: Option<i32>,
    track_number: Option<i32>,
    first_detected: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl From<MediaItemRow> for MediaItem {
    fn from(row: MediaItemRow) -> Self {
        let cast_crew: Option<CastCrew> = json::decode_or_default(row.cast_crew.as_deref(), "cast_crew");
        MediaItem {
            id: row.id,
            media_type_id: row.media_type_id,
            title: row.title,
            original_title: row.original_title,
            year: row.year,
            description: row.description,
            genre: json::decode_or_default(row.genre.as_deref(), "genre"),
            director: row.director,
            cast_crew,
            rating: row.rating,
            runtime: row.runtime,
            language: row.language,
            country: row.country,
            status: row.status,
            parent_id: row.parent_id,
            season_number: row.season_number,
            episode_number: row.episode_number,
            track_number: row.track_number,
            first_detected: row.first_detected,
            last_updated: row.last_updated,
        }
    }
}

#[derive(Debug, FromRow)]
struct MediaTypeRow {
    id: i64,
    name: String,
    description: Option<String>,
    detection_patterns: Option<String>,
    metadata_providers: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MediaTypeRow> for MediaType {
    fn from(row: MediaTypeRow) -> Self {
        MediaType {
            id: row.id,
            name: row.name,
            description: row.description,
            detection_patterns: json::decode_or_default(
                row.detection_patterns.as_deref(),
                "detection_patterns",
            ),
            metadata_providers: json::decode_or_default(
                row.metadata_providers.as_deref(),
                "metadata_providers",
            ),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Appends the search predicate shared by the count and page queries
fn push_search_filter<'a>(qb: &mut QueryBuilder<'a, Db>, pattern: &'a str, media_types: &'a [i64]) {
    qb.push(" WHERE (title LIKE ")
        .push_bind(pattern)
        .push(" OR original_title LIKE ")
        .push_bind(pattern)
        .push(" OR description LIKE ")
        .push_bind(pattern)
        .push(")");

    if !media_types.is_empty() {
        qb.push(" AND media_type_id IN (");
        let mut ids = qb.separated(", ");
        for id in media_types {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
    }
}

/// Repository for catalog media items and media types
#[derive(Clone)]
pub struct MediaItemRepository {
    db: Database,
}

impl MediaItemRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert an item, filling unset timestamps, and store the new id on it
    #[tracing::instrument(skip(self, item), fields(db.table = "media_items", db.operation = "insert", title = %item.title))]
    pub async fn create(&self, item: &mut MediaItem) -> Result<i64, AppError> {
        let genre = json::encode_list(&item.genre)?;
        let cast_crew = json::encode_opt(item.cast_crew.as_ref())?;

        let now = Utc::now();
        item.first_detected = json::or_now(item.first_detected, now);
        item.last_updated = json::or_now(item.last_updated, now);

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO media_items (media_type_id, title, original_title, year, description, \
             genre, director, cast_crew, rating, runtime, language, country, status, parent_id, \
             season_number, episode_number, track_number, first_detected, last_updated) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(item.media_type_id)
            .push_bind(&item.title)
            .push_bind(item.original_title.as_deref())
            .push_bind(item.year)
            .push_bind(item.description.as_deref())
            .push_bind(genre)
            .push_bind(item.director.as_deref())
            .push_bind(cast_crew)
            .push_bind(item.rating)
            .push_bind(item.runtime)
            .push_bind(item.language.as_deref())
            .push_bind(item.country.as_deref())
            .push_bind(&item.status)
            .push_bind(item.parent_id)
            .push_bind(item.season_number)
            .push_bind(item.episode_number)
            .push_bind(item.track_number)
            .push_bind(item.first_detected)
            .push_bind(item.last_updated);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        item.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: i64) -> Result<MediaItem, AppError> {
        let sql = format!("SELECT {} FROM media_items WHERE id = $1", ITEM_COLUMNS);
        let row = sqlx::query_as::<Db, MediaItemRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("media item not found".to_string()))?;
        Ok(row.into())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "select"))]
    pub async fn get_by_title(
        &self,
        title: &str,
        media_type_id: i64,
    ) -> Result<Option<MediaItem>, AppError> {
        let sql = format!(
            "SELECT {} FROM media_items WHERE title = $1 AND media_type_id = $2 LIMIT 1",
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<Db, MediaItemRow>(&sql)
            .bind(title)
            .bind(media_type_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(MediaItem::from))
    }

    /// One page of items of a type, by title, plus the total for the type
    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "select_list"))]
    pub async fn get_by_type(
        &self,
        media_type_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MediaItem>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_items WHERE media_type_id = $1")
            .bind(media_type_id)
            .fetch_one(self.db.pool())
            .await?;

        let sql = format!(
            "SELECT {} FROM media_items WHERE media_type_id = $1 ORDER BY title ASC LIMIT $2 OFFSET $3",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<Db, MediaItemRow>(&sql)
            .bind(media_type_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;

        Ok((rows.into_iter().map(MediaItem::from).collect(), total))
    }

    /// Direct children in season/episode/track order
    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "select_list", parent_id = %parent_id))]
    pub async fn get_children(&self, parent_id: i64) -> Result<Vec<MediaItem>, AppError> {
        let sql = format!(
            "SELECT {} FROM media_items WHERE parent_id = $1 \
             ORDER BY season_number ASC, episode_number ASC, track_number ASC, title ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<Db, MediaItemRow>(&sql)
            .bind(parent_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(MediaItem::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "select_list", parent_id = %parent_id))]
    pub async fn get_by_parent(
        &self,
        parent_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MediaItem>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_items WHERE parent_id = $1")
            .bind(parent_id)
            .fetch_one(self.db.pool())
            .await?;

        let sql = format!(
            "SELECT {} FROM media_items WHERE parent_id = $1 \
             ORDER BY season_number ASC, episode_number ASC, track_number ASC, title ASC \
             LIMIT $2 OFFSET $3",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<Db, MediaItemRow>(&sql)
            .bind(parent_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;

        Ok((rows.into_iter().map(MediaItem::from).collect(), total))
    }

    /// Substring search over title, original title and description,
    /// optionally restricted to a set of media types
    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "search"))]
    pub async fn search(
        &self,
        query: &str,
        media_types: &[i64],
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MediaItem>, i64), AppError> {
        let pattern = format!("%{}%", query);

        let mut count_qb = QueryBuilder::<Db>::new("SELECT COUNT(*) FROM media_items");
        push_search_filter(&mut count_qb, &pattern, media_types);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.db.pool())
            .await?;

        let mut qb = QueryBuilder::<Db>::new(format!("SELECT {} FROM media_items", ITEM_COLUMNS));
        push_search_filter(&mut qb, &pattern, media_types);
        qb.push(" ORDER BY title ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build_query_as::<MediaItemRow>()
            .fetch_all(self.db.pool())
            .await?;

        Ok((rows.into_iter().map(MediaItem::from).collect(), total))
    }

    #[tracing::instrument(skip(self, item), fields(db.table = "media_items", db.operation = "update", db.record_id = %item.id))]
    pub async fn update(&self, item: &mut MediaItem) -> Result<(), AppError> {
        let genre = json::encode_list(&item.genre)?;
        let cast_crew = json::encode_opt(item.cast_crew.as_ref())?;
        item.last_updated = Utc::now();

        sqlx::query(
            r#"
            UPDATE media_items SET
                media_type_id = $1, title = $2, original_title = $3, year = $4, description = $5,
                genre = $6, director = $7, cast_crew = $8, rating = $9, runtime = $10,
                language = $11, country = $12, status = $13, parent_id = $14,
                season_number = $15, episode_number = $16, track_number = $17,
                last_updated = $18
            WHERE id = $19
            "#,
        )
        .bind(item.media_type_id)
        .bind(&item.title)
        .bind(item.original_title.as_deref())
        .bind(item.year)
        .bind(item.description.as_deref())
        .bind(genre)
        .bind(item.director.as_deref())
        .bind(cast_crew)
        .bind(item.rating)
        .bind(item.runtime)
        .bind(item.language.as_deref())
        .bind(item.country.as_deref())
        .bind(&item.status)
        .bind(item.parent_id)
        .bind(item.season_number)
        .bind(item.episode_number)
        .bind(item.track_number)
        .bind(item.last_updated)
        .bind(item.id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM media_items WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Items sharing title and type (and year, when given), oldest first
    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "select_list"))]
    pub async fn get_duplicates(
        &self,
        title: &str,
        media_type_id: i64,
        year: Option<i32>,
    ) -> Result<Vec<MediaItem>, AppError> {
        let mut qb = QueryBuilder::<Db>::new(format!("SELECT {} FROM media_items WHERE title = ", ITEM_COLUMNS));
        qb.push_bind(title)
            .push(" AND media_type_id = ")
            .push_bind(media_type_id);
        if let Some(year) = year {
            qb.push(" AND year = ").push_bind(year);
        }
        qb.push(" ORDER BY first_detected ASC, id ASC");

        let rows = qb
            .build_query_as::<MediaItemRow>()
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(MediaItem::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "count"))]
    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_items")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Item count per media type name, including types with no items
    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "count"))]
    pub async fn count_by_type(&self) -> Result<HashMap<String, i64>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT mt.name AS name, COUNT(mi.id) AS total
            FROM media_types mt
            LEFT JOIN media_items mi ON mi.media_type_id = mt.id
            GROUP BY mt.name
            ORDER BY mt.name
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(row.try_get::<String, _>("name")?, row.try_get::<i64, _>("total")?);
        }
        Ok(counts)
    }

    /// Title/type groups with more than one item, largest first, plus the number of groups
    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "group"))]
    pub async fn list_duplicate_groups(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<DuplicateGroup>, i64), AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT title, media_type_id FROM media_items
                GROUP BY title, media_type_id HAVING COUNT(*) > 1
            ) sub
            "#,
        )
        .fetch_one(self.db.pool())
        .await?;

        let groups = sqlx::query_as::<Db, DuplicateGroup>(
            r#"
            SELECT mi.title AS title, mi.media_type_id AS media_type_id,
                   mt.name AS media_type_name, COUNT(*) AS count
            FROM media_items mi
            JOIN media_types mt ON mt.id = mi.media_type_id
            GROUP BY mi.title, mi.media_type_id, mt.name
            HAVING COUNT(*) > 1
            ORDER BY COUNT(*) DESC, mi.title ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        Ok((groups, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_types", db.operation = "select_list"))]
    pub async fn get_media_types(&self) -> Result<Vec<MediaType>, AppError> {
        let sql = format!("SELECT {} FROM media_types ORDER BY name", TYPE_COLUMNS);
        let rows = sqlx::query_as::<Db, MediaTypeRow>(&sql)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(MediaType::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_types", db.operation = "select"))]
    pub async fn get_media_type_by_name(&self, name: &str) -> Result<Option<MediaType>, AppError> {
        let sql = format!("SELECT {} FROM media_types WHERE name = $1", TYPE_COLUMNS);
        let row = sqlx::query_as::<Db, MediaTypeRow>(&sql)
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(MediaType::from))
    }
}
