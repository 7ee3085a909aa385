#![cfg(feature = "sqlite")]

mod helpers;

use catalog_core::{
    models::{NewFile, NewStorageRoot, PaginationOptions, SearchFilter, SortOptions},
    AppError,
};
use catalog_db::{FileRepository, MediaFileRepository};
use chrono::{Duration, Utc};
use helpers::{create_media_item, create_storage_root, setup_db};

fn dir(root: i64, path: &str, parent_id: Option<i64>) -> NewFile {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    NewFile {
        storage_root_id: root,
        path: path.to_string(),
        name,
        is_directory: true,
        parent_id,
        ..Default::default()
    }
}

fn file(root: i64, path: &str, size: i64, parent_id: Option<i64>) -> NewFile {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_string());
    NewFile {
        storage_root_id: root,
        path: path.to_string(),
        name,
        extension,
        file_type: Some("video".to_string()),
        size,
        parent_id,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_storage_roots_ordered_by_name() {
    let db = setup_db().await;
    let repo = FileRepository::new(db);

    let mut nas = NewStorageRoot::new("nas", "smb");
    nas.host = Some("192.168.1.5".to_string());
    nas.port = Some(445);
    nas.password = Some("secret".to_string());
    repo.create_storage_root(&nas).await.unwrap();
    repo.create_storage_root(&NewStorageRoot::new("archive", "local"))
        .await
        .unwrap();

    let roots = repo.get_storage_roots().await.unwrap();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].name, "archive");
    assert_eq!(roots[1].port, Some(445));
    assert!(roots[1].enabled);
}

#[tokio::test]
async fn test_file_with_metadata() {
    let db = setup_db().await;
    let repo = FileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;

    let id = repo
        .create_file(&file(root, "/heat.mkv", 4_000, None))
        .await
        .unwrap();
    repo.add_file_metadata(id, "resolution", "1920x1080", "string")
        .await
        .unwrap();
    repo.add_file_metadata(id, "duration", "10200", "integer")
        .await
        .unwrap();

    let loaded = repo.get_file_by_id(id).await.unwrap();
    assert_eq!(loaded.file.storage_root_name, "media");
    assert_eq!(loaded.file.extension.as_deref(), Some("mkv"));
    assert!(!loaded.file.deleted);
    let keys: Vec<&str> = loaded.metadata.iter().map(|m| m.key.as_str()).collect();
    assert_eq!(keys, vec!["duration", "resolution"]);

    assert!(matches!(repo.get_file_by_id(id + 100).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_directory_contents_lists_direct_children() {
    let db = setup_db().await;
    let repo = FileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;

    let movies = repo.create_file(&dir(root, "/movies", None)).await.unwrap();
    repo.create_file(&file(root, "/readme.txt", 10, None)).await.unwrap();
    repo.create_file(&file(root, "/movies/b.mkv", 200, Some(movies))).await.unwrap();
    repo.create_file(&file(root, "/movies/a.mkv", 100, Some(movies))).await.unwrap();
    let nested = repo.create_file(&dir(root, "/movies/extras", Some(movies))).await.unwrap();
    repo.create_file(&file(root, "/movies/extras/c.mkv", 50, Some(nested))).await.unwrap();

    let top = repo
        .get_directory_contents("media", "/", PaginationOptions::default(), SortOptions::default())
        .await
        .unwrap();
    assert_eq!(top.total_count, 2);
    assert_eq!(top.files[0].file.name, "movies");

    let listing = repo
        .get_directory_contents(
            "media",
            "/movies",
            PaginationOptions::new(1, 2),
            SortOptions::new("name", "asc"),
        )
        .await
        .unwrap();
    assert_eq!(listing.total_count, 3);
    assert_eq!(listing.total_pages, 2);
    let names: Vec<&str> = listing.files.iter().map(|f| f.file.name.as_str()).collect();
    assert_eq!(names, vec!["a.mkv", "b.mkv"]);
}

#[tokio::test]
async fn test_search_files_applies_filters() {
    let db = setup_db().await;
    let repo = FileRepository::new(db.clone());
    let media = create_storage_root(&db, "media").await;
    let backup = create_storage_root(&db, "backup").await;

    let big = repo.create_file(&file(media, "/big.mkv", 9_000, None)).await.unwrap();
    repo.create_file(&file(media, "/small.mkv", 10, None)).await.unwrap();
    repo.create_file(&file(media, "/notes.txt", 5_000, None)).await.unwrap();
    repo.create_file(&file(backup, "/big-copy.mkv", 9_000, None)).await.unwrap();
    repo.create_file(&dir(media, "/folder.mkv", None)).await.unwrap();

    let filter = SearchFilter {
        extension: "mkv".to_string(),
        storage_roots: vec!["media".to_string()],
        min_size: Some(1_000),
        ..Default::default()
    };
    let result = repo
        .search_files(&filter, PaginationOptions::default(), SortOptions::default())
        .await
        .unwrap();
    assert_eq!(result.total_count, 1);
    assert_eq!(result.files[0].file.id, big);

    let everything = SearchFilter {
        query: "big".to_string(),
        ..Default::default()
    };
    let result = repo
        .search_files(&everything, PaginationOptions::default(), SortOptions::new("size", "desc"))
        .await
        .unwrap();
    assert_eq!(result.total_count, 2);

    repo.mark_file_as_deleted(big).await.unwrap();
    let result = repo
        .search_files(&everything, PaginationOptions::default(), SortOptions::default())
        .await
        .unwrap();
    assert_eq!(result.total_count, 1);

    let with_deleted = SearchFilter {
        include_deleted: true,
        ..everything
    };
    let result = repo
        .search_files(&with_deleted, PaginationOptions::default(), SortOptions::default())
        .await
        .unwrap();
    assert_eq!(result.total_count, 2);
}

#[tokio::test]
async fn test_directories_sorted_by_size_and_duplicates() {
    let db = setup_db().await;
    let repo = FileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;

    let small = repo.create_file(&dir(root, "/small", None)).await.unwrap();
    let large = repo.create_file(&dir(root, "/large", None)).await.unwrap();
    repo.create_file(&file(root, "/small/a.mkv", 10, Some(small))).await.unwrap();
    repo.create_file(&file(root, "/large/a.mkv", 500, Some(large))).await.unwrap();
    repo.create_file(&file(root, "/large/b.mkv", 700, Some(large))).await.unwrap();
    let mut dup = file(root, "/small/dup.mkv", 5, Some(small));
    dup.is_duplicate = true;
    repo.create_file(&dup).await.unwrap();

    let by_size = repo
        .get_directories_sorted_by_size("media", PaginationOptions::default(), false)
        .await
        .unwrap();
    assert_eq!(by_size.len(), 2);
    assert_eq!(by_size[0].path, "/large");
    assert_eq!(by_size[0].total_size, 1_200);
    assert_eq!(by_size[0].file_count, 2);

    let by_dups = repo
        .get_directories_sorted_by_duplicates("media", PaginationOptions::default(), false)
        .await
        .unwrap();
    assert_eq!(by_dups[0].path, "/small");
    assert_eq!(by_dups[0].duplicate_count, 1);
}

#[tokio::test]
async fn test_files_with_hash_skip_deleted() {
    let db = setup_db().await;
    let repo = FileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;

    let mut first = file(root, "/one.mkv", 1, None);
    first.md5 = Some("abc123".to_string());
    let mut second = file(root, "/two.mkv", 1, None);
    second.quick_hash = Some("abc123".to_string());
    let first_id = repo.create_file(&first).await.unwrap();
    let second_id = repo.create_file(&second).await.unwrap();

    let matches = repo.get_files_with_hash("abc123", "media").await.unwrap();
    assert_eq!(matches.iter().map(|f| f.id).collect::<Vec<_>>(), vec![first_id, second_id]);

    repo.mark_file_as_deleted(first_id).await.unwrap();
    let matches = repo.get_files_with_hash("abc123", "media").await.unwrap();
    assert_eq!(matches.len(), 1);

    repo.restore_deleted_file(first_id).await.unwrap();
    let restored = repo.get_file_by_id(first_id).await.unwrap();
    assert!(!restored.file.deleted);
    assert!(restored.file.deleted_at.is_none());
}

#[tokio::test]
async fn test_move_file_resolves_new_parent() {
    let db = setup_db().await;
    let repo = FileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;

    let inbox = repo.create_file(&dir(root, "/inbox", None)).await.unwrap();
    let sorted = repo.create_file(&dir(root, "/sorted", None)).await.unwrap();
    let id = repo
        .create_file(&file(root, "/inbox/clip.mp4", 42, Some(inbox)))
        .await
        .unwrap();

    repo.update_file_path(id, "/sorted/renamed.mp4").await.unwrap();
    let moved = repo.get_file_by_id(id).await.unwrap().file;
    assert_eq!(moved.path, "/sorted/renamed.mp4");
    assert_eq!(moved.name, "renamed.mp4");
    assert_eq!(moved.parent_id, Some(sorted));

    repo.update_file_path(id, "/top.mp4").await.unwrap();
    let moved = repo.get_file_by_id(id).await.unwrap().file;
    assert_eq!(moved.parent_id, None);

    let found = repo.get_file_by_path_and_storage("/top.mp4", "media").await.unwrap();
    assert_eq!(found.map(|f| f.id), Some(id));
    assert!(repo
        .get_file_by_path_and_storage("/top.mp4", "elsewhere")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_rename_directory_rewrites_descendants() {
    let db = setup_db().await;
    let repo = FileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;

    let old = repo.create_file(&dir(root, "/old", None)).await.unwrap();
    let sub = repo.create_file(&dir(root, "/old/sub", Some(old))).await.unwrap();
    let leaf = repo
        .create_file(&file(root, "/old/sub/x.mkv", 1, Some(sub)))
        .await
        .unwrap();
    let outside = repo.create_file(&file(root, "/older.mkv", 1, None)).await.unwrap();

    repo.update_directory_paths("/old", "/new", "media").await.unwrap();

    assert_eq!(repo.get_file_by_id(old).await.unwrap().file.path, "/new");
    let sub_file = repo.get_file_by_id(sub).await.unwrap().file;
    assert_eq!(sub_file.path, "/new/sub");
    assert_eq!(sub_file.parent_id, Some(old));
    let leaf_file = repo.get_file_by_id(leaf).await.unwrap().file;
    assert_eq!(leaf_file.path, "/new/sub/x.mkv");
    assert_eq!(leaf_file.parent_id, Some(sub));
    assert_eq!(repo.get_file_by_id(outside).await.unwrap().file.path, "/older.mkv");
}

#[tokio::test]
async fn test_wildcard_characters_in_directory_names_match_literally() {
    let db = setup_db().await;
    let repo = FileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;
    let last_week = Utc::now() - Duration::days(7);

    let underscore = repo.create_file(&dir(root, "/a_b", None)).await.unwrap();
    let sibling = repo.create_file(&dir(root, "/axb", None)).await.unwrap();
    let mine = repo
        .create_file(&file(root, "/a_b/mine.txt", 10, Some(underscore)))
        .await
        .unwrap();
    let mut other = file(root, "/axb/other.txt", 90, Some(sibling));
    other.modified_at = Some(last_week);
    let other = repo.create_file(&other).await.unwrap();
    repo.create_file(&dir(root, "/100%", None)).await.unwrap();
    repo.create_file(&file(root, "/1000/x.txt", 5, None)).await.unwrap();

    let listing = repo
        .get_directory_contents("media", "/a_b", PaginationOptions::default(), SortOptions::default())
        .await
        .unwrap();
    let paths: Vec<&str> = listing.files.iter().map(|f| f.file.path.as_str()).collect();
    assert_eq!(paths, vec!["/a_b/mine.txt"]);
    assert_eq!(listing.total_count, 1);

    let percent = repo
        .get_directory_contents("media", "/100%", PaginationOptions::default(), SortOptions::default())
        .await
        .unwrap();
    assert_eq!(percent.total_count, 0);

    let by_size = repo
        .get_directories_sorted_by_size("media", PaginationOptions::default(), false)
        .await
        .unwrap();
    let a_b = by_size.iter().find(|d| d.path == "/a_b").unwrap();
    assert_eq!(a_b.total_size, 10);
    assert_eq!(a_b.file_count, 1);

    repo.update_directory_paths("/a_b", "/renamed", "media").await.unwrap();

    assert_eq!(repo.get_file_by_id(mine).await.unwrap().file.path, "/renamed/mine.txt");
    let untouched = repo.get_file_by_id(other).await.unwrap().file;
    assert_eq!(untouched.path, "/axb/other.txt");
    assert_eq!(untouched.parent_id, Some(sibling));
    assert_eq!(untouched.modified_at.timestamp(), last_week.timestamp());
}

#[tokio::test]
async fn test_update_file_metadata_refreshes_size() {
    let db = setup_db().await;
    let repo = FileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;
    let id = repo.create_file(&file(root, "/grow.log", 1, None)).await.unwrap();

    repo.update_file_metadata(id, 2_048, Some("qh-1")).await.unwrap();
    let updated = repo.get_file_by_id(id).await.unwrap().file;
    assert_eq!(updated.size, 2_048);
    assert_eq!(updated.quick_hash.as_deref(), Some("qh-1"));
}

#[tokio::test]
async fn test_media_file_links_and_primary() {
    let db = setup_db().await;
    let files = FileRepository::new(db.clone());
    let links = MediaFileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;
    let item = create_media_item(&db, "movie", "Alien", Some(1979)).await;

    let theatrical = files.create_file(&file(root, "/alien.mkv", 1, None)).await.unwrap();
    let directors = files.create_file(&file(root, "/alien-dc.mkv", 1, None)).await.unwrap();

    links
        .link_file_to_item(item, theatrical, Some("1080p"), Some("en"), true)
        .await
        .unwrap();
    links
        .link_file_to_item(item, directors, Some("2160p"), None, false)
        .await
        .unwrap();
    assert_eq!(links.count_by_item(item).await.unwrap(), 2);

    links.set_primary(item, directors).await.unwrap();
    let records = links.get_files_by_item(item).await.unwrap();
    assert_eq!(records[0].file_id, directors);
    assert!(records[0].is_primary);
    assert!(!records[1].is_primary);

    let result = links.set_primary(item, 9_999).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    // The failed switch leaves the previous primary in place
    let records = links.get_files_by_item(item).await.unwrap();
    assert_eq!(records.iter().filter(|r| r.is_primary).count(), 1);
    assert_eq!(records[0].file_id, directors);

    links.unlink_file(item, theatrical).await.unwrap();
    assert_eq!(links.count_by_item(item).await.unwrap(), 1);
}

#[tokio::test]
async fn test_files_shared_by_several_items() {
    let db = setup_db().await;
    let files = FileRepository::new(db.clone());
    let links = MediaFileRepository::new(db.clone());
    let root = create_storage_root(&db, "media").await;

    let shared = files.create_file(&file(root, "/compilation.flac", 1, None)).await.unwrap();
    let single = files.create_file(&file(root, "/single.flac", 1, None)).await.unwrap();
    let first = create_media_item(&db, "song", "Track A", None).await;
    let second = create_media_item(&db, "song", "Track B", None).await;

    links.link_file_to_item(first, shared, None, None, true).await.unwrap();
    links.link_file_to_item(second, shared, None, None, true).await.unwrap();
    links.link_file_to_item(first, single, None, None, false).await.unwrap();

    let groups = links.get_duplicate_files().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].file_id, shared);
    assert_eq!(groups[0].item_count, 2);
    assert_eq!(groups[0].item_ids, vec![first, second]);

    assert_eq!(links.get_items_by_file(single).await.unwrap(), vec![first]);
}
