#![cfg(feature = "sqlite")]

mod helpers;

use catalog_core::{
    models::{
        ConfigurationProfile, ConfigurationTemplate, FeatureToggles, NetworkSettings, SystemConfiguration,
        WizardProgress, WizardSession,
    },
    AppError,
};
use catalog_db::ConfigurationRepository;
use chrono::{DateTime, Duration, Utc};
use helpers::setup_db;
use serde_json::json;
use std::collections::HashMap;

fn config_with_port(version: &str, port: u16) -> SystemConfiguration {
    let mut config = SystemConfiguration::new(version);
    config.network = Some(NetworkSettings {
        host: "0.0.0.0".to_string(),
        port,
        ..Default::default()
    });
    config
}

#[tokio::test]
async fn test_configuration_is_a_single_row() {
    let db = setup_db().await;
    let repo = ConfigurationRepository::new(db);

    assert!(repo.get_configuration().await.unwrap().is_none());

    let mut first = config_with_port("1.0.0", 8080);
    first.features = Some(FeatureToggles {
        webdav_sync: true,
        ..Default::default()
    });
    repo.save_configuration(&first).await.unwrap();

    let stored = repo.get_configuration().await.unwrap().unwrap();
    assert_eq!(stored.version, "1.0.0");
    assert_eq!(stored.network.as_ref().map(|n| n.port), Some(8080));
    assert!(stored.features.unwrap().webdav_sync);

    repo.save_configuration(&config_with_port("1.1.0", 9090)).await.unwrap();
    let replaced = repo.get_configuration().await.unwrap().unwrap();
    assert_eq!(replaced.version, "1.1.0");
    assert_eq!(replaced.network.map(|n| n.port), Some(9090));
    assert!(replaced.features.is_none());
}

#[tokio::test]
async fn test_wizard_progress_and_completion() {
    let db = setup_db().await;
    let repo = ConfigurationRepository::new(db);

    assert!(repo.get_wizard_progress(1).await.unwrap().is_none());

    let mut progress = WizardProgress::new(1, "storage");
    progress.step_data.insert("media_directory".to_string(), json!("/srv/media"));
    repo.save_wizard_progress(&progress).await.unwrap();

    progress.current_step = "network".to_string();
    progress.all_data.insert("storage".to_string(), json!({"done": true}));
    repo.save_wizard_progress(&progress).await.unwrap();

    let stored = repo.get_wizard_progress(1).await.unwrap().unwrap();
    assert_eq!(stored.current_step, "network");
    assert_eq!(stored.step_data.get("media_directory"), Some(&json!("/srv/media")));
    assert_eq!(stored.all_data.get("storage"), Some(&json!({"done": true})));

    repo.delete_wizard_progress(1).await.unwrap();
    assert!(repo.get_wizard_progress(1).await.unwrap().is_none());

    assert!(!repo.is_wizard_completed(1).await.unwrap());
    repo.mark_wizard_completed(1).await.unwrap();
    repo.mark_wizard_completed(1).await.unwrap();
    assert!(repo.is_wizard_completed(1).await.unwrap());
    assert!(!repo.is_wizard_completed(2).await.unwrap());
}

#[tokio::test]
async fn test_configuration_history_and_cleanup() {
    let db = setup_db().await;
    let repo = ConfigurationRepository::new(db);
    let now = Utc::now();

    let mut old = SystemConfiguration::new("0.9.0");
    old.created_at = now - Duration::days(400);
    repo.save_configuration_history(&old).await.unwrap();
    let mut middle = SystemConfiguration::new("1.0.0");
    middle.created_at = now - Duration::days(10);
    repo.save_configuration_history(&middle).await.unwrap();
    repo.save_configuration_history(&SystemConfiguration::new("1.1.0"))
        .await
        .unwrap();

    let history = repo.get_configuration_history(10).await.unwrap();
    assert_eq!(
        history.iter().map(|h| h.version.as_str()).collect::<Vec<_>>(),
        vec!["1.1.0", "1.0.0", "0.9.0"]
    );
    assert_eq!(repo.get_configuration_history(1).await.unwrap().len(), 1);

    assert_eq!(repo.cleanup_old_history(now - Duration::days(365)).await.unwrap(), 1);
    assert_eq!(repo.get_configuration_history(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_backup_and_restore() {
    let db = setup_db().await;
    let repo = ConfigurationRepository::new(db);

    let backup_id = repo
        .create_backup("before upgrade", &config_with_port("1.0.0", 8080))
        .await
        .unwrap();
    repo.save_configuration(&config_with_port("2.0.0", 9000)).await.unwrap();

    let backups = repo.get_backups().await.unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].name, "before upgrade");
    assert_eq!(backups[0].version, "1.0.0");
    assert!(backups[0].configuration.is_none());

    let restored = repo.restore_backup(backup_id).await.unwrap();
    assert_eq!(restored.version, "1.0.0");
    let current = repo.get_configuration().await.unwrap().unwrap();
    assert_eq!(current.version, "1.0.0");
    assert_eq!(current.network.map(|n| n.port), Some(8080));

    repo.delete_backup(backup_id).await.unwrap();
    assert!(repo.get_backups().await.unwrap().is_empty());
    assert!(matches!(repo.restore_backup(backup_id).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_templates_apply_as_current_configuration() {
    let db = setup_db().await;
    let repo = ConfigurationRepository::new(db);

    let mut home = ConfigurationTemplate::new("home", "personal", config_with_port("t-1", 8096));
    home.description = "Single user".to_string();
    let home_id = repo.create_template(&mut home).await.unwrap();
    repo.create_template(&mut ConfigurationTemplate::new(
        "studio",
        "business",
        config_with_port("t-2", 80),
    ))
    .await
    .unwrap();
    repo.create_template(&mut ConfigurationTemplate::new(
        "archive",
        "personal",
        config_with_port("t-3", 81),
    ))
    .await
    .unwrap();

    let templates = repo.get_templates().await.unwrap();
    assert_eq!(
        templates.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        vec!["studio", "archive", "home"]
    );
    let stored_home = templates.iter().find(|t| t.id == home_id).unwrap();
    assert_eq!(stored_home.description, "Single user");
    assert_eq!(stored_home.configuration.network.as_ref().map(|n| n.port), Some(8096));

    let before = Utc::now();
    let applied = repo.apply_template(home_id).await.unwrap();
    assert_eq!(applied.version, "t-1");
    assert!(applied.created_at >= before);
    assert_eq!(repo.get_configuration().await.unwrap().unwrap().version, "t-1");

    repo.delete_template(home_id).await.unwrap();
    assert_eq!(repo.get_templates().await.unwrap().len(), 2);
    assert!(matches!(repo.apply_template(home_id).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_configuration_statistics() {
    let db = setup_db().await;
    let repo = ConfigurationRepository::new(db);

    let empty = repo.get_configuration_statistics().await.unwrap();
    assert_eq!(empty.total_configurations, 0);
    assert!(empty.last_update.is_none());

    let config = SystemConfiguration::new("1.0.0");
    repo.save_configuration(&config).await.unwrap();
    repo.save_configuration_history(&config).await.unwrap();
    repo.save_configuration_history(&config).await.unwrap();
    repo.create_backup("b", &config).await.unwrap();
    repo.create_template(&mut ConfigurationTemplate::new("t", "c", config.clone()))
        .await
        .unwrap();
    repo.mark_wizard_completed(1).await.unwrap();
    repo.mark_wizard_completed(2).await.unwrap();

    let stats = repo.get_configuration_statistics().await.unwrap();
    assert_eq!(stats.total_configurations, 2);
    assert_eq!(stats.total_backups, 1);
    assert_eq!(stats.total_templates, 1);
    assert_eq!(stats.wizard_completions, 2);
    assert!(stats.last_update.is_some());
}

#[tokio::test]
async fn test_wizard_session_upsert() {
    let db = setup_db().await;
    let repo = ConfigurationRepository::new(db);

    let mut session = WizardSession::start("wiz-1", 1, 5, "initial");
    repo.save_wizard_session(&session).await.unwrap();

    session.current_step = 3;
    session.step_data.insert("port".to_string(), json!(8080));
    session.is_completed = true;
    repo.save_wizard_session(&session).await.unwrap();

    let stored = repo.get_wizard_session("wiz-1").await.unwrap().unwrap();
    assert_eq!(stored.current_step, 3);
    assert_eq!(stored.total_steps, 5);
    assert!(stored.is_completed);
    assert_eq!(stored.step_data.get("port"), Some(&json!(8080)));
    assert!(stored.configuration.is_empty());

    assert!(repo.get_wizard_session("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_configuration_profiles() {
    let db = setup_db().await;
    let repo = ConfigurationRepository::new(db);
    let now = Utc::now();

    let profile = |id: &str, user_id: i64, created_at: DateTime<Utc>| ConfigurationProfile {
        profile_id: id.to_string(),
        name: format!("profile {}", id),
        description: String::new(),
        user_id,
        configuration: HashMap::from([("theme".to_string(), json!("dark"))]),
        created_at,
        updated_at: created_at,
        is_active: true,
        tags: vec!["home".to_string()],
    };

    repo.save_configuration_profile(&profile("a", 1, now - Duration::days(1)))
        .await
        .unwrap();
    repo.save_configuration_profile(&profile("b", 1, now)).await.unwrap();
    repo.save_configuration_profile(&profile("c", 2, now)).await.unwrap();

    let mut renamed = profile("a", 1, now - Duration::days(1));
    renamed.name = "living room".to_string();
    renamed.is_active = false;
    repo.save_configuration_profile(&renamed).await.unwrap();

    let stored = repo.get_configuration_profile("a").await.unwrap().unwrap();
    assert_eq!(stored.name, "living room");
    assert!(!stored.is_active);
    assert_eq!(stored.tags, vec!["home".to_string()]);
    assert_eq!(stored.configuration.get("theme"), Some(&json!("dark")));

    let mine = repo.get_user_configuration_profiles(1).await.unwrap();
    assert_eq!(
        mine.iter().map(|p| p.profile_id.as_str()).collect::<Vec<_>>(),
        vec!["b", "a"]
    );
    assert!(repo.get_configuration_profile("zzz").await.unwrap().is_none());
}
