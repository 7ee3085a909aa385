#![allow(dead_code)]

use catalog_core::models::{MediaItem, NewStorageRoot, NewUser};
use catalog_db::{Database, FileRepository, MediaItemRepository, UserRepository};
use sqlx::sqlite::SqlitePoolOptions;

/// Role seeded by the initial migration for ordinary accounts
pub const USER_ROLE_ID: i64 = 2;

/// Fresh in-memory database with the schema applied.
///
/// A single connection keeps every query on the same in-memory database.
pub async fn setup_db() -> Database {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    let db = Database::from_pool(pool);
    db.migrate().await.expect("Failed to run migrations");
    db
}

pub async fn create_user(db: &Database, username: &str) -> i64 {
    let user = NewUser::new(
        username,
        format!("{}@example.com", username),
        "hash",
        "salt",
        USER_ROLE_ID,
    );
    UserRepository::new(db.clone())
        .create(&user)
        .await
        .expect("Failed to create user")
}

pub async fn create_storage_root(db: &Database, name: &str) -> i64 {
    FileRepository::new(db.clone())
        .create_storage_root(&NewStorageRoot::new(name, "local"))
        .await
        .expect("Failed to create storage root")
}

pub async fn media_type_id(db: &Database, name: &str) -> i64 {
    MediaItemRepository::new(db.clone())
        .get_media_type_by_name(name)
        .await
        .expect("Failed to load media type")
        .expect("Seeded media type missing")
        .id
}

pub async fn create_media_item(db: &Database, media_type: &str, title: &str, year: Option<i32>) -> i64 {
    let type_id = media_type_id(db, media_type).await;
    let mut item = MediaItem::new(type_id, title);
    item.year = year;
    MediaItemRepository::new(db.clone())
        .create(&mut item)
        .await
        .expect("Failed to create media item")
}
