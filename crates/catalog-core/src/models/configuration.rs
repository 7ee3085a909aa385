use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The installation-wide configuration document.
///
/// Only one current configuration exists. Earlier versions live in the history
/// table, named snapshots in backups, and reusable presets in templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfiguration {
    pub version: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureToggles>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_services: Option<ExternalServices>,
}

impl SystemConfiguration {
    pub fn new(version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: version.into(),
            created_at: now,
            updated_at: now,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub media_directory: String,
    pub thumbnail_directory: String,
    pub temp_directory: String,
    pub max_file_size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_quota: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<HttpsSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpsSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_headers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationSettings {
    pub jwt_secret: String,
    /// Seconds
    pub session_timeout: i64,
    pub enable_registration: bool,
    pub require_email_verification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub media_conversion: bool,
    pub webdav_sync: bool,
    pub stress_testing: bool,
    pub error_reporting: bool,
    pub log_management: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalServices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_webhook_url: Option<String>,
    #[serde(default)]
    pub analytics: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Where a user left the setup wizard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardProgress {
    pub user_id: i64,
    pub current_step: String,
    #[serde(default)]
    pub step_data: HashMap<String, Value>,
    #[serde(default)]
    pub all_data: HashMap<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl WizardProgress {
    pub fn new(user_id: i64, current_step: impl Into<String>) -> Self {
        Self {
            user_id,
            current_step: current_step.into(),
            step_data: HashMap::new(),
            all_data: HashMap::new(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ConfigurationHistory {
    pub id: i64,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named snapshot. Listings leave `configuration` empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationBackup {
    pub id: i64,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SystemConfiguration>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationTemplate {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub configuration: SystemConfiguration,
    pub created_at: DateTime<Utc>,
}

impl ConfigurationTemplate {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        configuration: SystemConfiguration,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: String::new(),
            category: category.into(),
            configuration,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationStatistics {
    pub total_configurations: i64,
    pub total_backups: i64,
    pub total_templates: i64,
    pub wizard_completions: i64,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardSession {
    pub session_id: String,
    pub user_id: i64,
    pub current_step: i32,
    pub total_steps: i32,
    #[serde(default)]
    pub step_data: HashMap<String, Value>,
    #[serde(default)]
    pub configuration: HashMap<String, Value>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_completed: bool,
    pub config_type: String,
}

impl WizardSession {
    pub fn start(
        session_id: impl Into<String>,
        user_id: i64,
        total_steps: i32,
        config_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id,
            current_step: 0,
            total_steps,
            step_data: HashMap::new(),
            configuration: HashMap::new(),
            started_at: now,
            last_activity: now,
            is_completed: false,
            config_type: config_type.into(),
        }
    }
}

/// A user's saved, reusable configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationProfile {
    pub profile_id: String,
    pub name: String,
    pub description: String,
    pub user_id: i64,
    #[serde(default)]
    pub configuration: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}
