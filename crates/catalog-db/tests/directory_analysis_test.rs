#![cfg(feature = "sqlite")]

mod helpers;

use std::collections::HashMap;

use catalog_core::{
    models::{AnalysisData, DirectoryAnalysis},
    AppError,
};
use catalog_db::{DirectoryAnalysisRepository, MediaItemRepository};
use chrono::Utc;
use helpers::{create_media_item, setup_db};

fn analysis(path: &str, confidence: f64) -> DirectoryAnalysis {
    let mut analysis = DirectoryAnalysis::new(path, "media");
    analysis.confidence_score = confidence;
    analysis.detection_method = "pattern".to_string();
    analysis
}

#[tokio::test]
async fn test_create_and_get_by_path() {
    let db = setup_db().await;
    let repo = DirectoryAnalysisRepository::new(db);

    let mut found = analysis("/movies/Arrival (2016)", 0.92);
    found.files_count = 3;
    found.total_size = 8_000_000_000;
    found.analysis_data = Some(AnalysisData {
        matched_patterns: vec!["title (year)".to_string()],
        file_types: HashMap::from([("video".to_string(), 1), ("subtitle".to_string(), 2)]),
        detected_languages: vec!["en".to_string()],
        structure_score: 0.8,
        ..Default::default()
    });

    let id = repo.create(&mut found).await.unwrap();
    assert_eq!(found.id, id);
    assert!(found.last_analyzed.timestamp() > 0);

    let loaded = repo
        .get_by_path("/movies/Arrival (2016)")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.storage_root, "media");
    assert_eq!(loaded.confidence_score, 0.92);
    assert_eq!(loaded.files_count, 3);
    assert_eq!(loaded.total_size, 8_000_000_000);
    assert_eq!(loaded.analysis_data, found.analysis_data);
    assert!(loaded.media_item_id.is_none());

    assert!(repo.get_by_path("/movies/Other").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_links_media_item() {
    let db = setup_db().await;
    let repo = DirectoryAnalysisRepository::new(db.clone());
    let item = create_media_item(&db, "movie", "Heat", Some(1995)).await;

    let mut pending = analysis("/movies/Heat", 0.4);
    repo.create(&mut pending).await.unwrap();
    let first_analyzed = pending.last_analyzed;

    pending.media_item_id = Some(item);
    pending.confidence_score = 0.95;
    pending.detection_method = "metadata".to_string();
    repo.update(&mut pending).await.unwrap();
    assert!(pending.last_analyzed >= first_analyzed);

    let loaded = repo.get_by_path("/movies/Heat").await.unwrap().unwrap();
    assert_eq!(loaded.media_item_id, Some(item));
    assert_eq!(loaded.confidence_score, 0.95);
    assert_eq!(loaded.detection_method, "metadata");
    assert!(loaded.analysis_data.is_none());

    let mut missing = analysis("/nowhere", 0.1);
    missing.id = 9_999;
    let result = repo.update(&mut missing).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_unprocessed_ordered_by_confidence() {
    let db = setup_db().await;
    let repo = DirectoryAnalysisRepository::new(db.clone());
    let item = create_media_item(&db, "tv_show", "The Wire", None).await;

    for (path, confidence) in [("/tv/a", 0.3), ("/tv/b", 0.9), ("/tv/c", 0.6), ("/tv/d", 0.9)] {
        repo.create(&mut analysis(path, confidence)).await.unwrap();
    }
    let mut linked = analysis("/tv/The Wire", 0.99);
    linked.media_item_id = Some(item);
    repo.create(&mut linked).await.unwrap();

    let pending = repo.get_unprocessed(10).await.unwrap();
    let paths: Vec<&str> = pending.iter().map(|a| a.directory_path.as_str()).collect();
    assert_eq!(paths, vec!["/tv/b", "/tv/d", "/tv/c", "/tv/a"]);

    assert_eq!(repo.get_unprocessed(2).await.unwrap().len(), 2);

    // Deleting the item hands the directory back for processing
    MediaItemRepository::new(db.clone()).delete(item).await.unwrap();
    let pending = repo.get_unprocessed(10).await.unwrap();
    assert_eq!(pending[0].directory_path, "/tv/The Wire");
}

#[tokio::test]
async fn test_malformed_analysis_data_reads_as_absent() {
    let db = setup_db().await;
    let repo = DirectoryAnalysisRepository::new(db.clone());

    sqlx::query(
        "INSERT INTO directory_analyses (directory_path, storage_root, confidence_score, analysis_data, last_analyzed) \
         VALUES ('/music/broken', 'media', 0.5, '{not json', $1)",
    )
    .bind(Utc::now())
    .execute(db.pool())
    .await
    .unwrap();

    let loaded = repo.get_by_path("/music/broken").await.unwrap().unwrap();
    assert!(loaded.analysis_data.is_none());
    assert_eq!(loaded.detection_method, "");
}
