#![cfg(feature = "sqlite")]

mod helpers;

use catalog_core::{
    models::{DuplicateSort, NewFile, NewScanHistory, SizeDistribution},
    AppError,
};
use catalog_db::{Database, FileRepository, StatsRepository};
use chrono::{DateTime, Duration, Utc};
use helpers::{create_storage_root, setup_db};

const MIB: i64 = 1024 * 1024;

fn file(root: i64, path: &str, size: i64) -> NewFile {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_string());
    NewFile {
        storage_root_id: root,
        path: path.to_string(),
        name,
        extension,
        size,
        ..Default::default()
    }
}

fn duplicate(root: i64, path: &str, size: i64, group: i64) -> NewFile {
    NewFile {
        is_duplicate: true,
        duplicate_group_id: Some(group),
        ..file(root, path, size)
    }
}

async fn set_timestamp(db: &Database, column: &str, file_id: i64, at: DateTime<Utc>) {
    sqlx::query(&format!("UPDATE files SET {} = $1 WHERE id = $2", column))
        .bind(at)
        .bind(file_id)
        .execute(db.pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_overall_and_storage_root_stats() {
    let db = setup_db().await;
    let files = FileRepository::new(db.clone());
    let repo = StatsRepository::new(db.clone());
    let media = create_storage_root(&db, "media").await;
    let backup = create_storage_root(&db, "backup").await;

    let movies = files
        .create_file(&NewFile {
            storage_root_id: media,
            path: "/movies".to_string(),
            name: "movies".to_string(),
            is_directory: true,
            ..Default::default()
        })
        .await
        .unwrap();
    files
        .create_file(&NewFile {
            parent_id: Some(movies),
            ..duplicate(media, "/movies/a.mkv", 1_000, 7)
        })
        .await
        .unwrap();
    files
        .create_file(&file(media, "/movies/b.mkv", 500))
        .await
        .unwrap();
    let gone = files
        .create_file(&file(media, "/movies/old.mkv", 300))
        .await
        .unwrap();
    files.mark_file_as_deleted(gone).await.unwrap();
    files
        .create_file(&duplicate(backup, "/a.mkv", 1_000, 7))
        .await
        .unwrap();
    files
        .create_file(&file(backup, "/c.txt", 0))
        .await
        .unwrap();

    sqlx::query("UPDATE storage_roots SET enabled = FALSE WHERE id = $1")
        .bind(backup)
        .execute(db.pool())
        .await
        .unwrap();

    let overall = repo.get_overall_stats().await.unwrap();
    assert_eq!(overall.total_files, 4);
    assert_eq!(overall.total_directories, 1);
    assert_eq!(overall.total_size, 2_500);
    assert_eq!(overall.total_duplicates, 2);
    assert_eq!(overall.duplicate_groups, 1);
    assert_eq!(overall.storage_roots_count, 2);
    assert_eq!(overall.active_storage_roots, 1);
    assert!(overall.last_scan_time.is_some());

    let stats = repo.get_storage_root_stats("media").await.unwrap();
    assert_eq!(stats.name, "media");
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.total_directories, 1);
    assert_eq!(stats.total_size, 1_500);
    assert_eq!(stats.duplicate_files, 1);
    assert_eq!(stats.duplicate_groups, 1);
    assert!(stats.is_online);

    let offline = repo.get_storage_root_stats("backup").await.unwrap();
    assert!(!offline.is_online);
    assert_eq!(offline.total_size, 1_000);

    let missing = repo.get_storage_root_stats("nowhere").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_empty_catalog_stats_are_zero() {
    let db = setup_db().await;
    let repo = StatsRepository::new(db.clone());
    create_storage_root(&db, "media").await;

    let overall = repo.get_overall_stats().await.unwrap();
    assert_eq!(overall.total_files, 0);
    assert_eq!(overall.total_size, 0);
    assert_eq!(overall.storage_roots_count, 1);
    assert!(overall.last_scan_time.is_none());

    let stats = repo.get_storage_root_stats("media").await.unwrap();
    assert_eq!(stats.total_files, 0);
    assert!(stats.last_scan_time.is_none());

    let duplicates = repo.get_duplicate_stats(None).await.unwrap();
    assert_eq!(duplicates.duplicate_groups, 0);
    assert_eq!(duplicates.wasted_space, 0);
    assert_eq!(duplicates.average_group_size, 0.0);

    assert!(repo.get_file_type_stats(None, 10).await.unwrap().is_empty());
    assert_eq!(repo.get_size_distribution(None).await.unwrap(), SizeDistribution::default());

    let (history, total) = repo.get_scan_history(None, 10, 0).await.unwrap();
    assert!(history.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_file_types_and_size_buckets() {
    let db = setup_db().await;
    let files = FileRepository::new(db.clone());
    let repo = StatsRepository::new(db.clone());
    let media = create_storage_root(&db, "media").await;
    let other = create_storage_root(&db, "other").await;

    for (path, size) in [
        ("/empty.mkv", 0),
        ("/tiny.srt", 512),
        ("/small.mkv", 2_048),
        ("/medium", 5 * MIB),
        ("/large.mkv", 50 * MIB),
        ("/huge.mkv", 200 * MIB),
        ("/massive.mkv", 2_048 * MIB),
    ] {
        let mut new_file = file(media, path, size);
        if new_file.extension.as_deref() == Some("mkv") {
            new_file.file_type = Some("video".to_string());
        }
        files.create_file(&new_file).await.unwrap();
    }
    files
        .create_file(&file(other, "/elsewhere.mkv", 10))
        .await
        .unwrap();

    let buckets = repo.get_size_distribution(Some("media")).await.unwrap();
    assert_eq!(
        buckets,
        SizeDistribution {
            tiny: 2,
            small: 1,
            medium: 1,
            large: 1,
            huge: 1,
            massive: 1,
        }
    );
    assert_eq!(repo.get_size_distribution(None).await.unwrap().tiny, 3);

    let types = repo.get_file_type_stats(Some("media"), 10).await.unwrap();
    assert_eq!(types.len(), 3);
    assert_eq!(types[0].file_type, "video");
    assert_eq!(types[0].extension, "mkv");
    assert_eq!(types[0].count, 5);
    assert_eq!(types[0].total_size, 2_048 + 250 * MIB + 2_048 * MIB);
    assert_eq!((types[1].file_type.as_str(), types[1].extension.as_str()), ("unknown", "none"));
    assert_eq!((types[2].file_type.as_str(), types[2].extension.as_str()), ("unknown", "srt"));
    assert_eq!(types[2].average_size, 512.0);

    let limited = repo.get_file_type_stats(None, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].count, 5);
}

#[tokio::test]
async fn test_duplicate_stats_and_top_groups() {
    let db = setup_db().await;
    let files = FileRepository::new(db.clone());
    let repo = StatsRepository::new(db.clone());
    let media = create_storage_root(&db, "media").await;
    let backup = create_storage_root(&db, "backup").await;

    for path in ["/one.jpg", "/two.jpg", "/three.jpg"] {
        files.create_file(&duplicate(media, path, 100, 10)).await.unwrap();
    }
    let removed = files
        .create_file(&duplicate(media, "/four.jpg", 100, 10))
        .await
        .unwrap();
    files.mark_file_as_deleted(removed).await.unwrap();
    files
        .create_file(&duplicate(media, "/big.iso", 1_000, 20))
        .await
        .unwrap();
    files
        .create_file(&duplicate(backup, "/copy/big.iso", 1_000, 20))
        .await
        .unwrap();
    files
        .create_file(&file(media, "/unique.iso", 5_000))
        .await
        .unwrap();

    let stats = repo.get_duplicate_stats(None).await.unwrap();
    assert_eq!(stats.total_duplicates, 5);
    assert_eq!(stats.duplicate_groups, 2);
    assert_eq!(stats.wasted_space, 2 * 100 + 1_000);
    assert_eq!(stats.largest_duplicate_group, 3);
    assert_eq!(stats.average_group_size, 2.5);

    let on_backup = repo.get_duplicate_stats(Some("backup")).await.unwrap();
    assert_eq!(on_backup.total_duplicates, 1);
    assert_eq!(on_backup.duplicate_groups, 1);
    assert_eq!(on_backup.wasted_space, 0);

    let by_count = repo
        .get_top_duplicate_groups(DuplicateSort::Count, 10, None)
        .await
        .unwrap();
    assert_eq!(by_count.len(), 2);
    assert_eq!(by_count[0].group_id, 10);
    assert_eq!(by_count[0].file_count, 3);
    assert_eq!(by_count[0].total_size, 300);
    assert_eq!(by_count[0].wasted_space, 200);
    assert_eq!(by_count[1].wasted_space, 1_000);

    let by_size = repo
        .get_top_duplicate_groups(DuplicateSort::Size, 1, None)
        .await
        .unwrap();
    assert_eq!(by_size.len(), 1);
    assert_eq!(by_size[0].group_id, 20);
    assert_eq!(by_size[0].sample_path.as_deref(), Some("/big.iso"));

    // Groups touching the root keep their members from every root
    let touching_backup = repo
        .get_top_duplicate_groups(DuplicateSort::Count, 10, Some("backup"))
        .await
        .unwrap();
    assert_eq!(touching_backup.len(), 1);
    assert_eq!(touching_backup[0].group_id, 20);
    assert_eq!(touching_backup[0].file_count, 2);
}

#[tokio::test]
async fn test_access_patterns_over_window() {
    let db = setup_db().await;
    let files = FileRepository::new(db.clone());
    let repo = StatsRepository::new(db.clone());
    let media = create_storage_root(&db, "media").await;
    let now = Utc::now();

    let shows = files
        .create_file(&NewFile {
            storage_root_id: media,
            path: "/shows".to_string(),
            name: "shows".to_string(),
            is_directory: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let e1 = files
        .create_file(&NewFile {
            parent_id: Some(shows),
            ..file(media, "/shows/e1.mkv", 10)
        })
        .await
        .unwrap();
    let e2 = files
        .create_file(&NewFile {
            parent_id: Some(shows),
            ..file(media, "/shows/e2.mkv", 10)
        })
        .await
        .unwrap();
    let notes = files
        .create_file(&file(media, "/notes.txt", 10))
        .await
        .unwrap();
    files
        .create_file(&file(media, "/never.mkv", 10))
        .await
        .unwrap();

    set_timestamp(&db, "accessed_at", e1, now - Duration::days(1)).await;
    set_timestamp(&db, "accessed_at", e2, now).await;
    set_timestamp(&db, "accessed_at", notes, now - Duration::days(40)).await;

    let patterns = repo.get_access_patterns(None, 7).await.unwrap();
    assert_eq!(patterns.recently_accessed, 2);
    assert_eq!(patterns.never_accessed, 1);
    assert_eq!(patterns.access_frequency.len(), 7);
    assert_eq!(patterns.access_frequency.iter().sum::<i64>(), 2);
    assert_eq!(patterns.popular_extensions, vec!["mkv".to_string()]);
    assert_eq!(patterns.popular_directories, vec!["/shows".to_string()]);

    let wide = repo.get_access_patterns(Some("media"), 60).await.unwrap();
    assert_eq!(wide.recently_accessed, 3);
    assert_eq!(wide.access_frequency.iter().sum::<i64>(), 3);
    assert_eq!(wide.popular_extensions, vec!["mkv".to_string(), "txt".to_string()]);

    let unknown_root = repo.get_access_patterns(Some("missing"), 3).await.unwrap();
    assert_eq!(unknown_root.recently_accessed, 0);
    assert_eq!(unknown_root.access_frequency, vec![0, 0, 0]);

    assert!(repo
        .get_access_patterns(None, 0)
        .await
        .unwrap()
        .access_frequency
        .is_empty());
}

#[tokio::test]
async fn test_growth_trends_accumulate_from_baseline() {
    let db = setup_db().await;
    let files = FileRepository::new(db.clone());
    let repo = StatsRepository::new(db.clone());
    let media = create_storage_root(&db, "media").await;
    let now = Utc::now();

    let ancient = files
        .create_file(&file(media, "/ancient.mkv", 100))
        .await
        .unwrap();
    let recent = files
        .create_file(&file(media, "/recent.mkv", 200))
        .await
        .unwrap();
    files.create_file(&file(media, "/new1.mkv", 300)).await.unwrap();
    files.create_file(&file(media, "/new2.mkv", 400)).await.unwrap();

    let two_months_ago = now - Duration::days(60);
    set_timestamp(&db, "created_at", ancient, now - Duration::days(730)).await;
    set_timestamp(&db, "created_at", recent, two_months_ago).await;

    let trends = repo.get_growth_trends(None, 6).await.unwrap();
    assert_eq!(trends.monthly_growth.len(), 2);

    let first = &trends.monthly_growth[0];
    assert_eq!(first.month, two_months_ago.format("%Y-%m").to_string());
    assert_eq!(first.files_added, 1);
    assert_eq!(first.total_files, 2);
    assert_eq!(first.total_size, 300);

    let last = &trends.monthly_growth[1];
    assert_eq!(last.month, now.format("%Y-%m").to_string());
    assert_eq!(last.files_added, 2);
    assert_eq!(last.size_added, 700);
    assert_eq!(last.total_files, 4);
    assert_eq!(last.total_size, 1_000);

    assert_eq!(trends.file_growth_rate, 300.0);
    assert_eq!(trends.size_growth_rate, 900.0);
    assert_eq!(trends.total_growth_rate, 600.0);

    let elsewhere = repo.get_growth_trends(Some("missing"), 6).await.unwrap();
    assert!(elsewhere.monthly_growth.is_empty());
    assert_eq!(elsewhere.total_growth_rate, 0.0);
}

#[tokio::test]
async fn test_scan_history_newest_first_with_paging() {
    let db = setup_db().await;
    let repo = StatsRepository::new(db.clone());
    let media = create_storage_root(&db, "media").await;
    let backup = create_storage_root(&db, "backup").await;
    let now = Utc::now();

    for hours in [3, 2, 1] {
        let mut scan = NewScanHistory::started(media, "incremental");
        scan.start_time = now - Duration::hours(hours);
        repo.create_scan_history(&scan).await.unwrap();
    }
    let mut finished = NewScanHistory::started(backup, "full");
    finished.start_time = now - Duration::minutes(30);
    finished.end_time = Some(now - Duration::minutes(5));
    finished.status = "completed".to_string();
    finished.files_processed = 40;
    finished.files_added = 12;
    finished.error_count = 1;
    finished.error_message = Some("permission denied: /private".to_string());
    let finished_id = repo.create_scan_history(&finished).await.unwrap();

    let (page, total) = repo.get_scan_history(None, 2, 0).await.unwrap();
    assert_eq!(total, 4);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, finished_id);
    assert_eq!(page[0].storage_root_name, "backup");
    assert_eq!(page[0].status, "completed");
    assert_eq!(page[0].files_added, 12);
    assert_eq!(page[0].error_message.as_deref(), Some("permission denied: /private"));
    assert!(page[0].end_time.is_some());
    assert_eq!(page[1].storage_root_name, "media");

    let (media_scans, media_total) = repo.get_scan_history(Some("media"), 10, 0).await.unwrap();
    assert_eq!(media_total, 3);
    assert!(media_scans
        .windows(2)
        .all(|pair| pair[0].start_time >= pair[1].start_time));
    assert!(media_scans.iter().all(|scan| scan.status == "running"));

    let (tail, _) = repo.get_scan_history(Some("media"), 10, 2).await.unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].start_time, media_scans[2].start_time);
}
