use catalog_core::{
    models::{
        ConfigurationBackup, ConfigurationHistory, ConfigurationProfile, ConfigurationStatistics,
        ConfigurationTemplate, SystemConfiguration, WizardProgress, WizardSession,
    },
    AppError,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};

use crate::db::database::{Database, Db};
use crate::db::json;

#[derive(Debug, FromRow)]
struct ConfigurationRow {
    version: String,
    configuration: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConfigurationRow> for SystemConfiguration {
    type Error = AppError;

    fn try_from(row: ConfigurationRow) -> Result<Self, Self::Error> {
        let mut config: SystemConfiguration = json::decode(Some(&row.configuration))?.unwrap_or_default();
        config.version = row.version;
        config.created_at = row.created_at;
        config.updated_at = row.updated_at;
        Ok(config)
    }
}

#[derive(Debug, FromRow)]
struct WizardProgressRow {
    user_id: i64,
    current_step: String,
    step_data: Option<String>,
    all_data: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WizardProgressRow> for WizardProgress {
    type Error = AppError;

    fn try_from(row: WizardProgressRow) -> Result<Self, Self::Error> {
        Ok(WizardProgress {
            user_id: row.user_id,
            current_step: row.current_step,
            step_data: json::decode(row.step_data.as_deref())?.unwrap_or_default(),
            all_data: json::decode(row.all_data.as_deref())?.unwrap_or_default(),
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TemplateRow {
    id: i64,
    name: String,
    description: Option<String>,
    category: String,
    configuration: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for ConfigurationTemplate {
    type Error = AppError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(ConfigurationTemplate {
            id: row.id,
            name: row.name,
            description: row.description.unwrap_or_default(),
            category: row.category,
            configuration: json::decode(Some(&row.configuration))?.unwrap_or_default(),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct WizardSessionRow {
    session_id: String,
    user_id: i64,
    current_step: i32,
    total_steps: i32,
    step_data: Option<String>,
    configuration: Option<String>,
    started_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    is_completed: bool,
    config_type: String,
}

impl TryFrom<WizardSessionRow> for WizardSession {
    type Error = AppError;

    fn try_from(row: WizardSessionRow) -> Result<Self, Self::Error> {
        Ok(WizardSession {
            session_id: row.session_id,
            user_id: row.user_id,
            current_step: row.current_step,
            total_steps: row.total_steps,
            step_data: json::decode(row.step_data.as_deref())?.unwrap_or_default(),
            configuration: json::decode(row.configuration.as_deref())?.unwrap_or_default(),
            started_at: row.started_at,
            last_activity: row.last_activity,
            is_completed: row.is_completed,
            config_type: row.config_type,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    profile_id: String,
    name: String,
    description: Option<String>,
    user_id: i64,
    configuration: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    is_active: bool,
    tags: Option<String>,
}

impl TryFrom<ProfileRow> for ConfigurationProfile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(ConfigurationProfile {
            profile_id: row.profile_id,
            name: row.name,
            description: row.description.unwrap_or_default(),
            user_id: row.user_id,
            configuration: json::decode(row.configuration.as_deref())?.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_active: row.is_active,
            tags: json::decode(row.tags.as_deref())?.unwrap_or_default(),
        })
    }
}

const PROFILE_COLUMNS: &str =
    "profile_id, name, description, user_id, configuration, created_at, updated_at, is_active, tags";

/// System configuration, its history and backups, templates and the setup wizard
#[derive(Clone)]
pub struct ConfigurationRepository {
    db: Database,
}

impl ConfigurationRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Replace the current configuration
    #[tracing::instrument(skip(self, config), fields(db.table = "system_configuration", db.operation = "upsert", version = %config.version))]
    pub async fn save_configuration(&self, config: &SystemConfiguration) -> Result<(), AppError> {
        let document = json::encode(config)?;

        sqlx::query(
            r#"
            INSERT INTO system_configuration (id, version, configuration, created_at, updated_at)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                version = excluded.version,
                configuration = excluded.configuration,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&config.version)
        .bind(document)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "system_configuration", db.operation = "select"))]
    pub async fn get_configuration(&self) -> Result<Option<SystemConfiguration>, AppError> {
        let row = sqlx::query_as::<Db, ConfigurationRow>(
            "SELECT version, configuration, created_at, updated_at FROM system_configuration WHERE id = 1",
        )
        .fetch_optional(self.db.pool())
        .await?;
        row.map(SystemConfiguration::try_from).transpose()
    }

    #[tracing::instrument(skip(self, progress), fields(db.table = "wizard_progress", db.operation = "upsert", user_id = %progress.user_id))]
    pub async fn save_wizard_progress(&self, progress: &WizardProgress) -> Result<(), AppError> {
        let step_data = json::encode(&progress.step_data)?;
        let all_data = json::encode(&progress.all_data)?;

        sqlx::query(
            r#"
            INSERT INTO wizard_progress (user_id, current_step, step_data, all_data, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                current_step = excluded.current_step,
                step_data = excluded.step_data,
                all_data = excluded.all_data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(progress.user_id)
        .bind(&progress.current_step)
        .bind(step_data)
        .bind(all_data)
        .bind(progress.updated_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "wizard_progress", db.operation = "select", user_id = %user_id))]
    pub async fn get_wizard_progress(&self, user_id: i64) -> Result<Option<WizardProgress>, AppError> {
        let row = sqlx::query_as::<Db, WizardProgressRow>(
            "SELECT user_id, current_step, step_data, all_data, updated_at FROM wizard_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        row.map(WizardProgress::try_from).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "wizard_progress", db.operation = "delete", user_id = %user_id))]
    pub async fn delete_wizard_progress(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM wizard_progress WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "wizard_completion", db.operation = "upsert", user_id = %user_id))]
    pub async fn mark_wizard_completed(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO wizard_completion (user_id, completed_at) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET completed_at = excluded.completed_at
            "#,
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "wizard_completion", db.operation = "count", user_id = %user_id))]
    pub async fn is_wizard_completed(&self, user_id: i64) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wizard_completion WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count > 0)
    }

    #[tracing::instrument(skip(self, config), fields(db.table = "system_configuration_history", db.operation = "insert", version = %config.version))]
    pub async fn save_configuration_history(&self, config: &SystemConfiguration) -> Result<i64, AppError> {
        let document = json::encode(config)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO system_configuration_history (version, configuration, created_at, updated_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(&config.version)
            .push_bind(document)
            .push_bind(config.created_at)
            .push_bind(config.updated_at);
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "system_configuration_history", db.operation = "select_list"))]
    pub async fn get_configuration_history(&self, limit: i64) -> Result<Vec<ConfigurationHistory>, AppError> {
        let history = sqlx::query_as::<Db, ConfigurationHistory>(
            r#"
            SELECT id, version, created_at, updated_at
            FROM system_configuration_history
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(history)
    }

    #[tracing::instrument(skip(self), fields(db.table = "system_configuration_history", db.operation = "cleanup"))]
    pub async fn cleanup_old_history(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let removed = sqlx::query("DELETE FROM system_configuration_history WHERE created_at < $1")
            .bind(older_than)
            .execute(self.db.pool())
            .await?
            .rows_affected();
        tracing::info!(removed, "Cleaned up configuration history");
        Ok(removed)
    }

    #[tracing::instrument(skip(self, config), fields(db.table = "configuration_backups", db.operation = "insert"))]
    pub async fn create_backup(&self, name: &str, config: &SystemConfiguration) -> Result<i64, AppError> {
        let document = json::encode(config)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO configuration_backups (name, version, configuration, created_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(name)
            .push_bind(&config.version)
            .push_bind(document)
            .push_bind(Utc::now());
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    /// Backups newest first, without their documents
    #[tracing::instrument(skip(self), fields(db.table = "configuration_backups", db.operation = "select_list"))]
    pub async fn get_backups(&self) -> Result<Vec<ConfigurationBackup>, AppError> {
        let rows: Vec<(i64, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, name, version, created_at FROM configuration_backups ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, version, created_at)| ConfigurationBackup {
                id,
                name,
                version,
                configuration: None,
                created_at,
            })
            .collect())
    }

    /// Make a backup the current configuration
    #[tracing::instrument(skip(self), fields(db.table = "configuration_backups", db.operation = "restore", db.record_id = %id))]
    pub async fn restore_backup(&self, id: i64) -> Result<SystemConfiguration, AppError> {
        let document: String = sqlx::query_scalar("SELECT configuration FROM configuration_backups WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("configuration backup not found".to_string()))?;

        let mut config: SystemConfiguration = json::decode(Some(&document))?.unwrap_or_default();
        config.updated_at = Utc::now();
        self.save_configuration(&config).await?;

        tracing::info!(backup_id = id, version = %config.version, "Configuration restored from backup");
        Ok(config)
    }

    #[tracing::instrument(skip(self), fields(db.table = "configuration_backups", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_backup(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM configuration_backups WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "configuration_templates", db.operation = "select_list"))]
    pub async fn get_templates(&self) -> Result<Vec<ConfigurationTemplate>, AppError> {
        let rows = sqlx::query_as::<Db, TemplateRow>(
            r#"
            SELECT id, name, description, category, configuration, created_at
            FROM configuration_templates
            ORDER BY category, name
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;
        rows.into_iter().map(ConfigurationTemplate::try_from).collect()
    }

    #[tracing::instrument(skip(self, template), fields(db.table = "configuration_templates", db.operation = "insert", name = %template.name))]
    pub async fn create_template(&self, template: &mut ConfigurationTemplate) -> Result<i64, AppError> {
        template.created_at = json::or_now(template.created_at, Utc::now());
        let document = json::encode(&template.configuration)?;

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO configuration_templates (name, description, category, configuration, created_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(&template.name)
            .push_bind(&template.description)
            .push_bind(&template.category)
            .push_bind(document)
            .push_bind(template.created_at);
        values.push_unseparated(")");

        let id = self.db.insert_returning_id(qb).await?;
        template.id = id;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "configuration_templates", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_template(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM configuration_templates WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Make a template the current configuration, stamped as new
    #[tracing::instrument(skip(self), fields(db.table = "configuration_templates", db.operation = "apply", db.record_id = %id))]
    pub async fn apply_template(&self, id: i64) -> Result<SystemConfiguration, AppError> {
        let document: String = sqlx::query_scalar("SELECT configuration FROM configuration_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("configuration template not found".to_string()))?;

        let mut config: SystemConfiguration = json::decode(Some(&document))?.unwrap_or_default();
        let now = Utc::now();
        config.created_at = now;
        config.updated_at = now;
        self.save_configuration(&config).await?;

        tracing::info!(template_id = id, version = %config.version, "Configuration template applied");
        Ok(config)
    }

    #[tracing::instrument(skip(self), fields(db.operation = "aggregate"))]
    pub async fn get_configuration_statistics(&self) -> Result<ConfigurationStatistics, AppError> {
        let pool = self.db.pool();

        let total_configurations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM system_configuration_history")
            .fetch_one(pool)
            .await?;
        let total_backups: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM configuration_backups")
            .fetch_one(pool)
            .await?;
        let total_templates: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM configuration_templates")
            .fetch_one(pool)
            .await?;
        let wizard_completions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wizard_completion")
            .fetch_one(pool)
            .await?;
        let last_update: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT updated_at FROM system_configuration WHERE id = 1")
                .fetch_optional(pool)
                .await?;

        Ok(ConfigurationStatistics {
            total_configurations,
            total_backups,
            total_templates,
            wizard_completions,
            last_update,
        })
    }

    #[tracing::instrument(skip(self, session), fields(db.table = "wizard_sessions", db.operation = "upsert", session_id = %session.session_id))]
    pub async fn save_wizard_session(&self, session: &WizardSession) -> Result<(), AppError> {
        let step_data = json::encode(&session.step_data)?;
        let configuration = json::encode(&session.configuration)?;

        sqlx::query(
            r#"
            INSERT INTO wizard_sessions (
                session_id, user_id, current_step, total_steps, step_data,
                configuration, started_at, last_activity, is_completed, config_type
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (session_id) DO UPDATE SET
                user_id = excluded.user_id,
                current_step = excluded.current_step,
                total_steps = excluded.total_steps,
                step_data = excluded.step_data,
                configuration = excluded.configuration,
                started_at = excluded.started_at,
                last_activity = excluded.last_activity,
                is_completed = excluded.is_completed,
                config_type = excluded.config_type
            "#,
        )
        .bind(&session.session_id)
        .bind(session.user_id)
        .bind(session.current_step)
        .bind(session.total_steps)
        .bind(step_data)
        .bind(configuration)
        .bind(session.started_at)
        .bind(session.last_activity)
        .bind(session.is_completed)
        .bind(&session.config_type)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "wizard_sessions", db.operation = "select", session_id = %session_id))]
    pub async fn get_wizard_session(&self, session_id: &str) -> Result<Option<WizardSession>, AppError> {
        let row = sqlx::query_as::<Db, WizardSessionRow>(
            r#"
            SELECT session_id, user_id, current_step, total_steps, step_data,
                   configuration, started_at, last_activity, is_completed, config_type
            FROM wizard_sessions WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.db.pool())
        .await?;
        row.map(WizardSession::try_from).transpose()
    }

    #[tracing::instrument(skip(self, profile), fields(db.table = "configuration_profiles", db.operation = "upsert", profile_id = %profile.profile_id))]
    pub async fn save_configuration_profile(&self, profile: &ConfigurationProfile) -> Result<(), AppError> {
        let configuration = json::encode(&profile.configuration)?;
        let tags = json::encode(&profile.tags)?;

        sqlx::query(
            r#"
            INSERT INTO configuration_profiles (
                profile_id, name, description, user_id, configuration,
                created_at, updated_at, is_active, tags
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (profile_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                user_id = excluded.user_id,
                configuration = excluded.configuration,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                is_active = excluded.is_active,
                tags = excluded.tags
            "#,
        )
        .bind(&profile.profile_id)
        .bind(&profile.name)
        .bind(&profile.description)
        .bind(profile.user_id)
        .bind(configuration)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .bind(profile.is_active)
        .bind(tags)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "configuration_profiles", db.operation = "select", profile_id = %profile_id))]
    pub async fn get_configuration_profile(&self, profile_id: &str) -> Result<Option<ConfigurationProfile>, AppError> {
        let sql = format!("SELECT {} FROM configuration_profiles WHERE profile_id = $1", PROFILE_COLUMNS);
        let row = sqlx::query_as::<Db, ProfileRow>(&sql)
            .bind(profile_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(ConfigurationProfile::try_from).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "configuration_profiles", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_user_configuration_profiles(&self, user_id: i64) -> Result<Vec<ConfigurationProfile>, AppError> {
        let sql = format!(
            "SELECT {} FROM configuration_profiles WHERE user_id = $1 ORDER BY created_at DESC, profile_id",
            PROFILE_COLUMNS
        );
        let rows = sqlx::query_as::<Db, ProfileRow>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(ConfigurationProfile::try_from).collect()
    }
}
