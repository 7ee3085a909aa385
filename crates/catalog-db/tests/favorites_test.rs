#![cfg(feature = "sqlite")]

mod helpers;

use catalog_core::{
    models::{Favorite, FavoriteCategory, FavoriteShare},
    AppError,
};
use catalog_db::FavoritesRepository;
use chrono::{Duration, Utc};
use helpers::setup_db;

fn favorite(user_id: i64, entity_type: &str, entity_id: i64) -> Favorite {
    Favorite::new(user_id, entity_type, entity_id)
}

#[tokio::test]
async fn test_favorite_round_trip() {
    let db = setup_db().await;
    let repo = FavoritesRepository::new(db);

    let mut fav = favorite(1, "media_item", 42);
    fav.category = Some("movies".to_string());
    fav.notes = Some("watch again".to_string());
    fav.tags = vec!["classic".to_string(), "noir".to_string()];
    let id = repo.create_favorite(&mut fav).await.unwrap();
    assert_eq!(fav.id, id);

    let stored = repo.get_favorite(1, "media_item", 42).await.unwrap().unwrap();
    assert_eq!(stored.id, id);
    assert_eq!(stored.tags, vec!["classic".to_string(), "noir".to_string()]);
    assert!(!stored.is_public);
    assert!(stored.updated_at.is_none());
    assert!(repo.get_favorite(1, "media_item", 43).await.unwrap().is_none());

    let mut edited = repo.get_favorite_by_id(id).await.unwrap();
    edited.is_public = true;
    edited.tags.clear();
    repo.update_favorite(&edited).await.unwrap();
    let reloaded = repo.get_favorite_by_id(id).await.unwrap();
    assert!(reloaded.is_public);
    assert!(reloaded.tags.is_empty());
    assert!(reloaded.updated_at.is_some());

    repo.delete_favorite(1, "media_item", 42).await.unwrap();
    assert!(matches!(repo.get_favorite_by_id(id).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_duplicate_favorite_is_rejected() {
    let db = setup_db().await;
    let repo = FavoritesRepository::new(db);

    repo.create_favorite(&mut favorite(1, "media_item", 7)).await.unwrap();
    let result = repo.create_favorite(&mut favorite(1, "media_item", 7)).await;
    assert!(matches!(result, Err(AppError::Database(_))));

    repo.create_favorite(&mut favorite(2, "media_item", 7)).await.unwrap();
    repo.create_favorite(&mut favorite(1, "file", 7)).await.unwrap();
}

#[tokio::test]
async fn test_user_and_public_listings() {
    let db = setup_db().await;
    let repo = FavoritesRepository::new(db);
    let now = Utc::now();

    for i in 0..4 {
        let mut fav = favorite(1, if i < 3 { "media_item" } else { "file" }, i);
        fav.created_at = now - Duration::minutes(10 - i);
        fav.category = (i % 2 == 0).then(|| "movies".to_string());
        fav.is_public = i >= 2;
        repo.create_favorite(&mut fav).await.unwrap();
    }
    let mut other = favorite(2, "media_item", 100);
    other.is_public = true;
    repo.create_favorite(&mut other).await.unwrap();

    let all = repo.get_user_favorites(1, None, None, 10, 0).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].entity_id, 3);

    let media = repo.get_user_favorites(1, Some("media_item"), None, 10, 0).await.unwrap();
    assert_eq!(media.len(), 3);
    let movies = repo.get_user_favorites(1, Some("media_item"), Some("movies"), 10, 0).await.unwrap();
    assert_eq!(movies.len(), 2);
    let page = repo.get_user_favorites(1, None, None, 2, 2).await.unwrap();
    assert_eq!(page.iter().map(|f| f.entity_id).collect::<Vec<_>>(), vec![1, 0]);

    let public = repo.get_public_favorites(None, 10, 0).await.unwrap();
    assert_eq!(public.len(), 3);
    assert_eq!(public[0].user_id, 2);
    let public_files = repo.get_public_favorites(Some("file"), 10, 0).await.unwrap();
    assert_eq!(public_files.len(), 1);

    let recent = repo.get_recent_favorites(1, 2).await.unwrap();
    assert_eq!(recent.iter().map(|f| f.entity_id).collect::<Vec<_>>(), vec![3, 2]);
}

#[tokio::test]
async fn test_search_and_counts() {
    let db = setup_db().await;
    let repo = FavoritesRepository::new(db);

    let mut noted = favorite(1, "media_item", 1);
    noted.notes = Some("Great soundtrack".to_string());
    noted.category = Some("music".to_string());
    repo.create_favorite(&mut noted).await.unwrap();

    let mut tagged = favorite(1, "media_item", 2);
    tagged.tags = vec!["soundtrack".to_string()];
    tagged.category = Some("music".to_string());
    repo.create_favorite(&mut tagged).await.unwrap();

    repo.create_favorite(&mut favorite(1, "file", 3)).await.unwrap();

    let found = repo.search_favorites(1, "soundtrack", 10, 0).await.unwrap();
    assert_eq!(found.len(), 2);
    assert!(repo.search_favorites(2, "soundtrack", 10, 0).await.unwrap().is_empty());

    assert_eq!(repo.count_user_favorites(1, None).await.unwrap(), 3);
    assert_eq!(repo.count_user_favorites(1, Some("file")).await.unwrap(), 1);

    let by_type = repo.get_favorites_count_by_entity_type(1).await.unwrap();
    assert_eq!(by_type.get("media_item"), Some(&2));
    assert_eq!(by_type.get("file"), Some(&1));

    let by_category = repo.get_favorites_count_by_category(1).await.unwrap();
    assert_eq!(by_category.get("music"), Some(&2));
    assert_eq!(by_category.get("uncategorized"), Some(&1));
}

#[tokio::test]
async fn test_similar_favorites_put_same_entity_first() {
    let db = setup_db().await;
    let repo = FavoritesRepository::new(db);
    let now = Utc::now();

    let mut newer = favorite(2, "media_item", 99);
    newer.is_public = true;
    newer.created_at = now;
    repo.create_favorite(&mut newer).await.unwrap();

    let mut same = favorite(3, "media_item", 5);
    same.is_public = true;
    same.created_at = now - Duration::days(1);
    repo.create_favorite(&mut same).await.unwrap();

    let mut private = favorite(4, "media_item", 5);
    private.created_at = now;
    repo.create_favorite(&mut private).await.unwrap();

    let mut own = favorite(1, "media_item", 5);
    own.is_public = true;
    repo.create_favorite(&mut own).await.unwrap();

    let mut other_type = favorite(5, "file", 5);
    other_type.is_public = true;
    repo.create_favorite(&mut other_type).await.unwrap();

    let similar = repo.get_similar_favorites(1, "media_item", 5, 10).await.unwrap();
    assert_eq!(similar.iter().map(|f| f.user_id).collect::<Vec<_>>(), vec![3, 2]);
}

#[tokio::test]
async fn test_favorite_categories() {
    let db = setup_db().await;
    let repo = FavoritesRepository::new(db);

    let mut series = FavoriteCategory::new(1, "series");
    let series_id = repo.create_favorite_category(&mut series).await.unwrap();
    let mut anime = FavoriteCategory::new(1, "anime");
    anime.color = Some("#ff0000".to_string());
    repo.create_favorite_category(&mut anime).await.unwrap();
    repo.create_favorite_category(&mut FavoriteCategory::new(2, "mine")).await.unwrap();

    let categories = repo.get_favorite_categories(1).await.unwrap();
    assert_eq!(
        categories.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["anime", "series"]
    );
    assert_eq!(categories[0].color.as_deref(), Some("#ff0000"));

    let mut fav = favorite(1, "media_item", 1);
    fav.category = Some("series".to_string());
    repo.create_favorite(&mut fav).await.unwrap();
    assert_eq!(repo.count_favorites_by_category(1, series_id).await.unwrap(), 1);

    let mut renamed = repo.get_favorite_category_by_id(series_id).await.unwrap();
    renamed.description = Some("long form".to_string());
    repo.update_favorite_category(&renamed).await.unwrap();
    let reloaded = repo.get_favorite_category_by_id(series_id).await.unwrap();
    assert_eq!(reloaded.description.as_deref(), Some("long form"));
    assert!(reloaded.updated_at.is_some());

    let mut missing = FavoriteCategory::new(1, "ghost");
    missing.id = 999;
    assert!(matches!(
        repo.update_favorite_category(&missing).await,
        Err(AppError::NotFound(_))
    ));

    repo.delete_favorite_category(series_id).await.unwrap();
    assert!(matches!(
        repo.get_favorite_category_by_id(series_id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(repo.count_favorites_by_category(1, series_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_shared_favorites_match_exact_recipient() {
    let db = setup_db().await;
    let repo = FavoritesRepository::new(db);

    let first = repo.create_favorite(&mut favorite(1, "media_item", 1)).await.unwrap();
    let second = repo.create_favorite(&mut favorite(1, "media_item", 2)).await.unwrap();
    let third = repo.create_favorite(&mut favorite(1, "media_item", 3)).await.unwrap();

    let share_id = repo
        .create_favorite_share(&mut FavoriteShare::new(first, 1, vec![2, 3]))
        .await
        .unwrap();
    repo.create_favorite_share(&mut FavoriteShare::new(second, 1, vec![12]))
        .await
        .unwrap();
    repo.create_favorite_share(&mut FavoriteShare::new(third, 1, vec![2]))
        .await
        .unwrap();

    let stored = repo.get_favorite_share_by_id(share_id).await.unwrap();
    assert_eq!(stored.shared_with, vec![2, 3]);
    assert!(stored.permissions.can_view);
    assert!(!stored.permissions.can_edit);

    let shared = repo.get_shared_favorites(2).await.unwrap();
    let mut ids: Vec<i64> = shared.iter().map(|f| f.id).collect();
    ids.sort();
    assert_eq!(ids, vec![first, third]);

    repo.revoke_favorite_share(share_id).await.unwrap();
    assert!(!repo.get_favorite_share_by_id(share_id).await.unwrap().is_active);
    let shared = repo.get_shared_favorites(2).await.unwrap();
    assert_eq!(shared.iter().map(|f| f.id).collect::<Vec<_>>(), vec![third]);

    assert!(repo.get_shared_favorites(7).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_favorite_removes_its_shares() {
    let db = setup_db().await;
    let repo = FavoritesRepository::new(db);

    let id = repo.create_favorite(&mut favorite(1, "media_item", 1)).await.unwrap();
    let share_id = repo
        .create_favorite_share(&mut FavoriteShare::new(id, 1, vec![2]))
        .await
        .unwrap();

    repo.delete_favorite(1, "media_item", 1).await.unwrap();
    assert!(matches!(
        repo.get_favorite_share_by_id(share_id).await,
        Err(AppError::NotFound(_))
    ));
}
