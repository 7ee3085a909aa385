use catalog_core::{models::DuplicateEntityGroup, AppError};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};

#[derive(Debug, FromRow)]
struct GroupRow {
    title: String,
    media_type_id: i64,
    media_type: String,
    year: Option<i32>,
    count: i64,
}

/// Duplicate detection over media items sharing title, type and year
#[derive(Clone)]
pub struct DuplicateEntityRepository {
    db: Database,
}

impl DuplicateEntityRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Number of (title, type, year) groups with more than one item
    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "count"))]
    pub async fn count_duplicates(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT title, media_type_id, year FROM media_items
                GROUP BY title, media_type_id, year
                HAVING COUNT(*) > 1
            ) dup
            "#,
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    /// A page of duplicate groups with their member ids, plus the total number of groups
    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "group"))]
    pub async fn get_duplicate_groups(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<DuplicateEntityGroup>, i64), AppError> {
        let total = self.count_duplicates().await?;

        let rows = sqlx::query_as::<Db, GroupRow>(
            r#"
            SELECT mi.title AS title, mi.media_type_id AS media_type_id,
                   mt.name AS media_type, mi.year AS year, COUNT(*) AS count
            FROM media_items mi
            JOIN media_types mt ON mt.id = mi.media_type_id
            GROUP BY mi.title, mi.media_type_id, mt.name, mi.year
            HAVING COUNT(*) > 1
            ORDER BY COUNT(*) DESC, mi.title ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let entity_ids = self
                .member_ids(&row.title, row.media_type_id, row.year)
                .await?;
            groups.push(DuplicateEntityGroup {
                title: row.title,
                media_type: row.media_type,
                year: row.year,
                count: row.count,
                entity_ids,
            });
        }

        Ok((groups, total))
    }

    async fn member_ids(
        &self,
        title: &str,
        media_type_id: i64,
        year: Option<i32>,
    ) -> Result<Vec<i64>, AppError> {
        let mut qb = QueryBuilder::<Db>::new("SELECT id FROM media_items WHERE title = ");
        qb.push_bind(title)
            .push(" AND media_type_id = ")
            .push_bind(media_type_id);
        match year {
            Some(year) => {
                qb.push(" AND year = ").push_bind(year);
            }
            None => {
                qb.push(" AND year IS NULL");
            }
        }
        qb.push(" ORDER BY id ASC");

        let ids = qb
            .build_query_scalar::<i64>()
            .fetch_all(self.db.pool())
            .await?;
        Ok(ids)
    }
}
