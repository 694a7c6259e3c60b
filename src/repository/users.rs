//! Users repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{User, UserRole},
    services::admin::RoleLookup,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::UserNotFound(format!("id {}", id)))
    }

    /// Get user by email, ignoring case
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email.trim())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Create a user with the default role
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password, role, status, register_time)
            VALUES ($1, $2, 'user', 'normal', $3)
            RETURNING *
            "#,
        )
        .bind(email.trim())
        .bind(password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::EmailTaken,
            other => AppError::Database(other),
        })
    }

    /// Replace the stored password hash
    pub async fn update_password(&self, id: i64, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound(format!("id {}", id)));
        }
        Ok(())
    }

    /// Change the persisted role of an account
    pub async fn set_role(&self, email: &str, role: UserRole) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET role = $1 WHERE LOWER(email) = LOWER($2) RETURNING *",
        )
        .bind(role)
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::UserNotFound(email.trim().to_string()))
    }
}

#[async_trait]
impl RoleLookup for UsersRepository {
    async fn role_of(&self, email: &str) -> AppResult<Option<String>> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(role)
    }
}
