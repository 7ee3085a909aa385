#![cfg(feature = "sqlite")]

mod helpers;

use catalog_core::{
    models::{Actor, CastCrew, ExternalMetadata, MediaCollection, MediaItem, UserMetadata},
    AppError,
};
use catalog_db::{
    DuplicateEntityRepository, ExternalMetadataRepository, MediaCollectionRepository,
    MediaItemRepository, UserMetadataRepository,
};
use helpers::{create_media_item, create_user, media_type_id, setup_db};

#[tokio::test]
async fn test_media_types_are_seeded() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db);

    let types = repo.get_media_types().await.unwrap();
    assert_eq!(types.len(), 11);
    assert_eq!(types[0].name, "book");
    assert!(types[0].detection_patterns.is_empty());

    assert!(repo.get_media_type_by_name("movie").await.unwrap().is_some());
    assert!(repo.get_media_type_by_name("podcast").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_item_round_trips_json_columns() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db.clone());
    let movie = media_type_id(&db, "movie").await;

    let mut item = MediaItem::new(movie, "Arrival").with_year(2016);
    item.genre = vec!["drama".to_string(), "sci-fi".to_string()];
    item.cast_crew = Some(CastCrew {
        director: Some("Denis Villeneuve".to_string()),
        actors: vec![Actor {
            name: "Amy Adams".to_string(),
            character: "Louise Banks".to_string(),
            order: 0,
        }],
        ..Default::default()
    });
    let id = repo.create(&mut item).await.unwrap();
    assert_eq!(item.id, id);

    let stored = repo.get_by_id(id).await.unwrap();
    assert_eq!(stored.title, "Arrival");
    assert_eq!(stored.year, Some(2016));
    assert_eq!(stored.genre, item.genre);
    assert_eq!(stored.cast_crew, item.cast_crew);
    assert_eq!(stored.status, "detected");
}

#[tokio::test]
async fn test_empty_lists_read_back_empty() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db.clone());
    let id = create_media_item(&db, "game", "Tetris", None).await;

    let stored = repo.get_by_id(id).await.unwrap();
    assert!(stored.genre.is_empty());
    assert!(stored.cast_crew.is_none());
}

#[tokio::test]
async fn test_malformed_genre_is_tolerated() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db.clone());
    let id = create_media_item(&db, "movie", "Broken", None).await;

    sqlx::query("UPDATE media_items SET genre = '[not json' WHERE id = $1")
        .bind(id)
        .execute(db.pool())
        .await
        .unwrap();

    let stored = repo.get_by_id(id).await.unwrap();
    assert!(stored.genre.is_empty());
}

#[tokio::test]
async fn test_update_and_delete_item() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db.clone());
    let id = create_media_item(&db, "movie", "Heat", Some(1995)).await;

    let mut item = repo.get_by_id(id).await.unwrap();
    let before = item.last_updated;
    item.rating = Some(8.3);
    item.status = "identified".to_string();
    repo.update(&mut item).await.unwrap();

    let stored = repo.get_by_id(id).await.unwrap();
    assert_eq!(stored.rating, Some(8.3));
    assert_eq!(stored.status, "identified");
    assert!(stored.last_updated >= before);

    repo.delete(id).await.unwrap();
    assert!(matches!(repo.get_by_id(id).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_children_follow_episode_order() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db.clone());
    let show = create_media_item(&db, "tv_show", "The Wire", None).await;
    let season_type = media_type_id(&db, "tv_season").await;

    for (season, title) in [(2, "Season 2"), (1, "Season 1"), (3, "Season 3")] {
        let mut item = MediaItem::new(season_type, title).with_parent(show);
        item.season_number = Some(season);
        repo.create(&mut item).await.unwrap();
    }

    let children = repo.get_children(show).await.unwrap();
    let titles: Vec<&str> = children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Season 1", "Season 2", "Season 3"]);

    let (page, total) = repo.get_by_parent(show, 2, 1).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].season_number, Some(2));
}

#[tokio::test]
async fn test_lookup_by_title_and_type() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db.clone());
    let movie = media_type_id(&db, "movie").await;
    let book = media_type_id(&db, "book").await;
    create_media_item(&db, "book", "Dune", Some(1965)).await;

    assert!(repo.get_by_title("Dune", movie).await.unwrap().is_none());
    assert_eq!(
        repo.get_by_title("Dune", book).await.unwrap().unwrap().year,
        Some(1965)
    );

    let (items, total) = repo.get_by_type(book, 10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].title, "Dune");
}

#[tokio::test]
async fn test_search_with_type_filter() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db.clone());
    let movie = media_type_id(&db, "movie").await;
    let book = media_type_id(&db, "book").await;

    create_media_item(&db, "movie", "Star Wars", Some(1977)).await;
    create_media_item(&db, "book", "Star Maker", Some(1937)).await;
    create_media_item(&db, "movie", "Alien", Some(1979)).await;

    let (all, total) = repo.search("Star", &[], 10, 0).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(all[0].title, "Star Maker");

    let (movies, total) = repo.search("Star", &[movie], 10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(movies[0].title, "Star Wars");

    let (both, total) = repo.search("a", &[movie, book], 1, 0).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(both.len(), 1);
}

#[tokio::test]
async fn test_counts_include_empty_types() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db.clone());
    create_media_item(&db, "movie", "Up", None).await;
    create_media_item(&db, "movie", "Cars", None).await;

    assert_eq!(repo.count().await.unwrap(), 2);
    let by_type = repo.count_by_type().await.unwrap();
    assert_eq!(by_type.len(), 11);
    assert_eq!(by_type.get("movie"), Some(&2));
    assert_eq!(by_type.get("comic"), Some(&0));
}

#[tokio::test]
async fn test_duplicate_groups_by_title_and_type() {
    let db = setup_db().await;
    let repo = MediaItemRepository::new(db.clone());
    let movie = media_type_id(&db, "movie").await;

    let first = create_media_item(&db, "movie", "Solaris", Some(1972)).await;
    let second = create_media_item(&db, "movie", "Solaris", Some(2002)).await;
    create_media_item(&db, "book", "Solaris", Some(1961)).await;
    create_media_item(&db, "movie", "Ran", Some(1985)).await;

    let (groups, total) = repo.list_duplicate_groups(10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(groups[0].title, "Solaris");
    assert_eq!(groups[0].media_type_name, "movie");
    assert_eq!(groups[0].count, 2);

    let all = repo.get_duplicates("Solaris", movie, None).await.unwrap();
    let ids: Vec<i64> = all.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![first, second]);

    let remake = repo.get_duplicates("Solaris", movie, Some(2002)).await.unwrap();
    assert_eq!(remake.len(), 1);
    assert_eq!(remake[0].id, second);
}

#[tokio::test]
async fn test_duplicate_entities_include_year() {
    let db = setup_db().await;
    let repo = DuplicateEntityRepository::new(db.clone());

    let a = create_media_item(&db, "song", "Intro", None).await;
    let b = create_media_item(&db, "song", "Intro", None).await;
    let c = create_media_item(&db, "song", "Intro", None).await;
    let x = create_media_item(&db, "movie", "Heat", Some(1995)).await;
    let y = create_media_item(&db, "movie", "Heat", Some(1995)).await;
    create_media_item(&db, "movie", "Heat", Some(1986)).await;

    assert_eq!(repo.count_duplicates().await.unwrap(), 2);

    let (groups, total) = repo.get_duplicate_groups(10, 0).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(groups[0].title, "Intro");
    assert_eq!(groups[0].year, None);
    assert_eq!(groups[0].entity_ids, vec![a, b, c]);
    assert_eq!(groups[1].media_type, "movie");
    assert_eq!(groups[1].year, Some(1995));
    assert_eq!(groups[1].entity_ids, vec![x, y]);

    let (page, total) = repo.get_duplicate_groups(1, 1).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].title, "Heat");
}

#[tokio::test]
async fn test_collection_crud() {
    let db = setup_db().await;
    let repo = MediaCollectionRepository::new(db);

    let mut collection = MediaCollection::new("Alien", "franchise");
    collection.external_ids.insert("tmdb".to_string(), "8091".to_string());
    let id = repo.create(&mut collection).await.unwrap();

    let stored = repo.get_by_id(id).await.unwrap();
    assert_eq!(stored.external_ids.get("tmdb").map(String::as_str), Some("8091"));

    collection.total_items = 4;
    repo.update(&mut collection).await.unwrap();
    assert_eq!(repo.get_by_id(id).await.unwrap().total_items, 4);

    let (list, total) = repo.list(10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(list[0].name, "Alien");

    repo.delete(id).await.unwrap();
    assert!(matches!(repo.delete(id).await, Err(AppError::NotFound(_))));
    assert!(matches!(repo.update(&mut collection).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_collection_list_skips_unreadable_rows() {
    let db = setup_db().await;
    let repo = MediaCollectionRepository::new(db.clone());

    let good = repo.create(&mut MediaCollection::new("Good", "series")).await.unwrap();
    let bad = repo.create(&mut MediaCollection::new("Bad", "series")).await.unwrap();
    sqlx::query("UPDATE media_collections SET external_ids = '{broken' WHERE id = $1")
        .bind(bad)
        .execute(db.pool())
        .await
        .unwrap();

    assert!(matches!(repo.get_by_id(bad).await, Err(AppError::InvalidInput(_))));

    let (list, total) = repo.list(10, 0).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, good);
}

#[tokio::test]
async fn test_external_metadata_upsert_keeps_one_row_per_provider() {
    let db = setup_db().await;
    let repo = ExternalMetadataRepository::new(db.clone());
    let item = create_media_item(&db, "movie", "Memento", Some(2000)).await;

    let mut tmdb = ExternalMetadata::new(item, "tmdb", "77", r#"{"title":"Memento"}"#);
    repo.upsert(&mut tmdb).await.unwrap();
    let first_id = tmdb.id;

    let mut refreshed = ExternalMetadata::new(item, "tmdb", "77", r#"{"title":"Memento","votes":10}"#);
    refreshed.rating = Some(8.4);
    repo.upsert(&mut refreshed).await.unwrap();
    assert_eq!(refreshed.id, first_id);

    let mut imdb = ExternalMetadata::new(item, "imdb", "tt0209144", "{}");
    repo.create(&mut imdb).await.unwrap();

    let records = repo.get_by_item(item).await.unwrap();
    let providers: Vec<&str> = records.iter().map(|r| r.provider.as_str()).collect();
    assert_eq!(providers, vec!["imdb", "tmdb"]);
    assert_eq!(records[1].rating, Some(8.4));

    let found = repo.get_by_provider("imdb", "tt0209144").await.unwrap().unwrap();
    assert_eq!(found.media_item_id, item);

    repo.delete(imdb.id).await.unwrap();
    assert!(repo.get_by_provider("imdb", "tt0209144").await.unwrap().is_none());
}

#[tokio::test]
async fn test_item_delete_cascades_metadata() {
    let db = setup_db().await;
    let items = MediaItemRepository::new(db.clone());
    let external = ExternalMetadataRepository::new(db.clone());
    let item = create_media_item(&db, "movie", "Tenet", Some(2020)).await;

    external
        .create(&mut ExternalMetadata::new(item, "tmdb", "577922", "{}"))
        .await
        .unwrap();
    items.delete(item).await.unwrap();

    assert!(external.get_by_item(item).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_user_metadata_upsert_and_queries() {
    let db = setup_db().await;
    let repo = UserMetadataRepository::new(db.clone());
    let user = create_user(&db, "viewer").await;
    let first = create_media_item(&db, "movie", "Primer", Some(2004)).await;
    let second = create_media_item(&db, "movie", "Coherence", Some(2013)).await;

    let mut meta = UserMetadata::new(first, user);
    meta.tags = vec!["mind-bending".to_string()];
    meta.favorite = true;
    repo.upsert(&mut meta).await.unwrap();
    let id = meta.id;

    meta.user_rating = Some(9.0);
    meta.watched_status = Some("watched".to_string());
    meta.watched_date = Some(chrono::Utc::now());
    repo.upsert(&mut meta).await.unwrap();
    assert_eq!(meta.id, id);

    let mut other = UserMetadata::new(second, user);
    other.watched_status = Some("plan_to_watch".to_string());
    repo.create(&mut other).await.unwrap();

    let stored = repo.get_by_item_and_user(first, user).await.unwrap().unwrap();
    assert_eq!(stored.user_rating, Some(9.0));
    assert_eq!(stored.tags, vec!["mind-bending".to_string()]);

    let favorites = repo.get_favorites(user).await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].media_item_id, first);

    let planned = repo.get_by_watched_status(user, "plan_to_watch").await.unwrap();
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].media_item_id, second);

    assert!(repo.get_by_item_and_user(first, user + 1).await.unwrap().is_none());
}
