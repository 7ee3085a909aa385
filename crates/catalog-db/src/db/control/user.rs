use catalog_core::{
    models::{DeviceInfo, NewRole, NewSession, NewUser, Role, User, UserSession},
    AppError,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, QueryBuilder};
use validator::Validate;

use crate::db::database::{Database, Db};

const USER_COLUMNS: &str = r#"
    id, username, email, password_hash, salt, role_id, first_name, last_name,
    display_name, avatar_url, time_zone, language, COALESCE(settings, '{}') AS settings,
    is_active, is_locked, locked_until, failed_login_attempts, last_login_at,
    last_login_ip, created_at, updated_at
"#;

const SESSION_COLUMNS: &str = r#"
    id, user_id, session_token, refresh_token, device_info, ip_address,
    user_agent, is_active, expires_at, created_at, last_activity_at
"#;

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: Option<String>,
    permissions: Option<String>,
    is_system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let permissions = match row.permissions.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => Vec::new(),
        };
        Ok(Role {
            id: row.id,
            name: row.name,
            description: row.description,
            permissions,
            is_system: row.is_system,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: i64,
    user_id: i64,
    session_token: String,
    refresh_token: Option<String>,
    device_info: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    is_active: bool,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for UserSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let device_info: DeviceInfo = match row.device_info.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => DeviceInfo::default(),
        };
        Ok(UserSession {
            id: row.id,
            user_id: row.user_id,
            session_token: row.session_token,
            refresh_token: row.refresh_token,
            device_info,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            is_active: row.is_active,
            expires_at: row.expires_at,
            created_at: row.created_at,
            last_activity_at: row.last_activity_at,
        })
    }
}

/// Repository for users, roles and login sessions
#[derive(Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a new user and return its id
    #[tracing::instrument(skip(self, user), fields(db.table = "users", db.operation = "insert", username = %user.username))]
    pub async fn create(&self, user: &NewUser) -> Result<i64, AppError> {
        user.validate()?;

        let now = Utc::now();
        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO users (username, email, password_hash, salt, role_id, first_name, last_name, \
             display_name, avatar_url, time_zone, language, settings, is_active, created_at, updated_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(&user.username)
            .push_bind(&user.email)
            .push_bind(&user.password_hash)
            .push_bind(&user.salt)
            .push_bind(user.role_id)
            .push_bind(user.first_name.as_deref())
            .push_bind(user.last_name.as_deref())
            .push_bind(user.display_name.as_deref())
            .push_bind(user.avatar_url.as_deref())
            .push_bind(user.time_zone.as_deref())
            .push_bind(user.language.as_deref())
            .push_bind(user.settings.as_deref().unwrap_or("{}"))
            .push_bind(user.is_active)
            .push_bind(now)
            .push_bind(now);
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: i64) -> Result<User, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<Db, User>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn get_by_username(&self, username: &str) -> Result<User, AppError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        sqlx::query_as::<Db, User>(&sql)
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn get_by_email(&self, email: &str) -> Result<User, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<Db, User>(&sql)
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))
    }

    /// Login lookup: matches either column
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn get_by_username_or_email(&self, username_or_email: &str) -> Result<User, AppError> {
        let sql = format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $1",
            USER_COLUMNS
        );
        sqlx::query_as::<Db, User>(&sql)
            .bind(username_or_email)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))
    }

    #[tracing::instrument(skip(self, user), fields(db.table = "users", db.operation = "update", db.record_id = %user.id))]
    pub async fn update(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users SET
                username = $1, email = $2, first_name = $3, last_name = $4, display_name = $5,
                avatar_url = $6, time_zone = $7, language = $8, is_active = $9, settings = $10,
                updated_at = $11
            WHERE id = $12
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.first_name.as_deref())
        .bind(user.last_name.as_deref())
        .bind(user.display_name.as_deref())
        .bind(user.avatar_url.as_deref())
        .bind(user.time_zone.as_deref())
        .bind(user.language.as_deref())
        .bind(user.is_active)
        .bind(&user.settings)
        .bind(Utc::now())
        .bind(user.id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, password_hash, salt), fields(db.table = "users", db.operation = "update", db.record_id = %user_id))]
    pub async fn update_password(
        &self,
        user_id: i64,
        password_hash: &str,
        salt: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $1, salt = $2, updated_at = $3 WHERE id = $4")
            .bind(password_hash)
            .bind(salt)
            .bind(Utc::now())
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %user_id))]
    pub async fn update_last_login(&self, user_id: i64, ip_address: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = $1, last_login_ip = $2 WHERE id = $3")
            .bind(Utc::now())
            .bind(ip_address)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %user_id))]
    pub async fn increment_failed_login_attempts(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET failed_login_attempts = failed_login_attempts + 1 WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %user_id))]
    pub async fn reset_failed_login_attempts(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET failed_login_attempts = 0 WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %user_id))]
    pub async fn lock_account(&self, user_id: i64, lock_until: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_locked = TRUE, locked_until = $1 WHERE id = $2")
            .bind(lock_until)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %user_id))]
    pub async fn unlock_account(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_locked = FALSE, locked_until = NULL WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Newest users first
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select_list"))]
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<Db, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;
        Ok(users)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "count"))]
    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    // Roles

    #[tracing::instrument(skip(self), fields(db.table = "roles", db.operation = "select", db.record_id = %role_id))]
    pub async fn get_role(&self, role_id: i64) -> Result<Role, AppError> {
        let row = sqlx::query_as::<Db, RoleRow>(
            "SELECT id, name, description, permissions, is_system, created_at, updated_at FROM roles WHERE id = $1",
        )
        .bind(role_id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("role not found".to_string()))?;

        row.try_into()
    }

    #[tracing::instrument(skip(self, role), fields(db.table = "roles", db.operation = "insert"))]
    pub async fn create_role(&self, role: &NewRole) -> Result<i64, AppError> {
        role.validate()?;
        let permissions = serde_json::to_string(&role.permissions)?;
        let now = Utc::now();

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO roles (name, description, permissions, is_system, created_at, updated_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(&role.name)
            .push_bind(role.description.as_deref())
            .push_bind(permissions)
            .push_bind(role.is_system)
            .push_bind(now)
            .push_bind(now);
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    /// Update a non-system role
    #[tracing::instrument(skip(self, role), fields(db.table = "roles", db.operation = "update", db.record_id = %role.id))]
    pub async fn update_role(&self, role: &Role) -> Result<(), AppError> {
        let permissions = serde_json::to_string(&role.permissions)?;
        let result = sqlx::query(
            r#"
            UPDATE roles SET name = $1, description = $2, permissions = $3, updated_at = $4
            WHERE id = $5 AND is_system = FALSE
            "#,
        )
        .bind(&role.name)
        .bind(role.description.as_deref())
        .bind(permissions)
        .bind(Utc::now())
        .bind(role.id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(
                "role not found or is system role".to_string(),
            ));
        }
        Ok(())
    }

    /// Delete a non-system role that no user holds
    #[tracing::instrument(skip(self), fields(db.table = "roles", db.operation = "delete", db.record_id = %role_id))]
    pub async fn delete_role(&self, role_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(&mut **tx)
            .await?;

        if user_count > 0 {
            return Err(AppError::BadRequest(
                "cannot delete role that is assigned to users".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM roles WHERE id = $1 AND is_system = FALSE")
            .bind(role_id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(
                "role not found or is system role".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(())
    }

    /// System roles first, then alphabetical
    #[tracing::instrument(skip(self), fields(db.table = "roles", db.operation = "select_list"))]
    pub async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        let rows = sqlx::query_as::<Db, RoleRow>(
            "SELECT id, name, description, permissions, is_system, created_at, updated_at \
             FROM roles ORDER BY is_system DESC, name ASC",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Role::try_from).collect()
    }

    // Sessions

    #[tracing::instrument(skip(self, session), fields(db.table = "user_sessions", db.operation = "insert", user_id = %session.user_id))]
    pub async fn create_session(&self, session: &NewSession) -> Result<i64, AppError> {
        let device_info = serde_json::to_string(&session.device_info)?;
        let now = Utc::now();

        let mut qb = QueryBuilder::<Db>::new(
            "INSERT INTO user_sessions (user_id, session_token, refresh_token, device_info, ip_address, \
             user_agent, is_active, expires_at, created_at, last_activity_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(session.user_id)
            .push_bind(&session.session_token)
            .push_bind(session.refresh_token.as_deref())
            .push_bind(device_info)
            .push_bind(session.ip_address.as_deref())
            .push_bind(session.user_agent.as_deref())
            .push_bind(true)
            .push_bind(session.expires_at)
            .push_bind(now)
            .push_bind(now);
        values.push_unseparated(")");

        self.db.insert_returning_id(qb).await
    }

    /// Active session for a session token
    #[tracing::instrument(skip(self, session_token), fields(db.table = "user_sessions", db.operation = "select"))]
    pub async fn get_session(&self, session_token: &str) -> Result<UserSession, AppError> {
        let sql = format!(
            "SELECT {} FROM user_sessions WHERE session_token = $1 AND is_active = TRUE",
            SESSION_COLUMNS
        );
        let row = sqlx::query_as::<Db, SessionRow>(&sql)
            .bind(session_token)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("session not found".to_string()))?;

        row.try_into()
    }

    #[tracing::instrument(skip(self, refresh_token), fields(db.table = "user_sessions", db.operation = "select"))]
    pub async fn get_session_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<UserSession, AppError> {
        let sql = format!(
            "SELECT {} FROM user_sessions WHERE refresh_token = $1 AND is_active = TRUE",
            SESSION_COLUMNS
        );
        let row = sqlx::query_as::<Db, SessionRow>(&sql)
            .bind(refresh_token)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("session not found".to_string()))?;

        row.try_into()
    }

    #[tracing::instrument(skip(self, session_token, refresh_token), fields(db.table = "user_sessions", db.operation = "update", db.record_id = %session_id))]
    pub async fn update_session_tokens(
        &self,
        session_id: i64,
        session_token: &str,
        refresh_token: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE user_sessions SET session_token = $1, refresh_token = $2 WHERE id = $3")
            .bind(session_token)
            .bind(refresh_token)
            .bind(session_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, session_token, refresh_token), fields(db.table = "user_sessions", db.operation = "update", db.record_id = %session_id))]
    pub async fn update_session_tokens_and_expiry(
        &self,
        session_id: i64,
        session_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE user_sessions SET session_token = $1, refresh_token = $2, expires_at = $3 WHERE id = $4",
        )
        .bind(session_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(session_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_sessions", db.operation = "update", db.record_id = %session_id))]
    pub async fn update_session_activity(&self, session_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE user_sessions SET last_activity_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(session_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_sessions", db.operation = "update", db.record_id = %session_id))]
    pub async fn deactivate_session(&self, session_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE user_sessions SET is_active = FALSE WHERE id = $1")
            .bind(session_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_sessions", db.operation = "update", user_id = %user_id))]
    pub async fn deactivate_all_user_sessions(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE user_sessions SET is_active = FALSE WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Active, unexpired sessions, most recently used first
    #[tracing::instrument(skip(self), fields(db.table = "user_sessions", db.operation = "select_list", user_id = %user_id))]
    pub async fn get_active_user_sessions(&self, user_id: i64) -> Result<Vec<UserSession>, AppError> {
        let sql = format!(
            "SELECT {} FROM user_sessions \
             WHERE user_id = $1 AND is_active = TRUE AND expires_at > $2 \
             ORDER BY last_activity_at DESC",
            SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<Db, SessionRow>(&sql)
            .bind(user_id)
            .bind(Utc::now())
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(UserSession::try_from).collect()
    }

    /// Remove expired sessions and inactive ones older than `retention`
    #[tracing::instrument(skip(self), fields(db.table = "user_sessions", db.operation = "delete"))]
    pub async fn cleanup_expired_sessions(&self, retention: Duration) -> Result<u64, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            "DELETE FROM user_sessions WHERE expires_at < $1 OR (is_active = FALSE AND created_at < $2)",
        )
        .bind(now)
        .bind(now - retention)
        .execute(self.db.pool())
        .await?;

        let removed = result.rows_affected();
        tracing::info!(removed, "Cleaned up expired sessions");
        Ok(removed)
    }
}
