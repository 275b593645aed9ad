//! User and login token models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::db::TIMESTAMP_FORMAT;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Per-user totals shown by the admin tooling before a delete
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub session_count: i64,
    pub total_hours: f64,
    pub has_settings: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuthToken {
    pub id: String,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

impl User {
    pub async fn create(
        db: &SqlitePool,
        username: &str,
        password_hash: &str,
        email: &str,
    ) -> Result<User, sqlx::Error> {
        let id = sqlx::query("INSERT INTO users (username, password_hash, email) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(email)
            .execute(db)
            .await?
            .last_insert_rowid();

        tracing::info!(user_id = id, username = %username, "User created");

        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_username(
        db: &SqlitePool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn list(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users ORDER BY id ASC")
            .fetch_all(db)
            .await
    }

    pub async fn update_password(
        db: &SqlitePool,
        id: i64,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Delete a user. Sessions, settings and tokens go with it (ON DELETE CASCADE).
    pub async fn delete(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn summary(db: &SqlitePool, id: i64) -> Result<UserSummary, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM sleep_sessions WHERE user_id = ?) AS session_count,
                (SELECT COALESCE(SUM(hours), 0.0) FROM sleep_sessions WHERE user_id = ?) AS total_hours,
                EXISTS(SELECT 1 FROM user_settings WHERE user_id = ?) AS has_settings
            "#,
        )
        .bind(id)
        .bind(id)
        .bind(id)
        .fetch_one(db)
        .await
    }
}

impl AuthToken {
    pub async fn create(
        db: &SqlitePool,
        user_id: i64,
        token_hash: &str,
        ttl_hours: i64,
    ) -> Result<(), sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let expires_at = chrono::Duration::try_hours(ttl_hours)
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| sqlx::Error::Protocol("token lifetime out of range".to_string()))?
            .format(TIMESTAMP_FORMAT)
            .to_string();

        sqlx::query(
            "INSERT INTO auth_tokens (id, user_id, token_hash, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(token_hash)
        .bind(&expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Look up the owner of an unexpired token
    pub async fn find_user(db: &SqlitePool, token_hash: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT users.*
            FROM auth_tokens
            INNER JOIN users ON users.id = auth_tokens.user_id
            WHERE auth_tokens.token_hash = ? AND auth_tokens.expires_at > datetime('now')
            "#,
        )
        .bind(token_hash)
        .fetch_optional(db)
        .await
    }

    pub async fn revoke(db: &SqlitePool, token_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM auth_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .execute(db)
            .await?;
        Ok(())
    }
}
