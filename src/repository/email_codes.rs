//! Verification code audit table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        email_code::{EmailCodeQuery, EmailCodeStats, NewEmailCode},
        CodePurpose, EmailCodeRecord, PageRequest,
    },
    services::codes::CodeRecordStore,
};

use super::like_pattern;

#[derive(Clone)]
pub struct EmailCodesRepository {
    pool: Pool<Postgres>,
}

impl EmailCodesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Filtered listing, newest first
    pub async fn list(&self, query: &EmailCodeQuery) -> AppResult<(Vec<EmailCodeRecord>, i64)> {
        let page = PageRequest::new(Some(query.page), Some(query.limit));
        let email = query
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase);
        let keyword = query
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM email_code_records
            WHERE ($1::text IS NULL OR email = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::boolean IS NULL OR is_used = $3)
              AND ($4::text IS NULL OR email ILIKE $4 OR code ILIKE $4)
            "#,
        )
        .bind(email.as_deref())
        .bind(query.action)
        .bind(query.is_used)
        .bind(keyword.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let records = sqlx::query_as::<_, EmailCodeRecord>(
            r#"
            SELECT * FROM email_code_records
            WHERE ($1::text IS NULL OR email = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::boolean IS NULL OR is_used = $3)
              AND ($4::text IS NULL OR email ILIKE $4 OR code ILIKE $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(email.as_deref())
        .bind(query.action)
        .bind(query.is_used)
        .bind(keyword.as_deref())
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((records, total))
    }

    /// Aggregate counters as of `now`
    pub async fn stats(&self, now: DateTime<Utc>) -> AppResult<EmailCodeStats> {
        let stats = sqlx::query_as::<_, EmailCodeStats>(
            r#"
            SELECT COUNT(*)                                              AS total_count,
                   COUNT(*) FILTER (WHERE is_used)                       AS used_count,
                   COUNT(*) FILTER (WHERE NOT is_used)                   AS unused_count,
                   COUNT(*) FILTER (WHERE NOT is_used AND expires_at <= $1) AS expired_count,
                   COUNT(*) FILTER (WHERE action = 'register')           AS register_count,
                   COUNT(*) FILTER (WHERE action = 'forget')             AS forget_count
            FROM email_code_records
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

#[async_trait]
impl CodeRecordStore for EmailCodesRepository {
    async fn insert(&self, record: NewEmailCode) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO email_code_records (email, code, action, created_at, expires_at, is_used)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            "#,
        )
        .bind(&record.email)
        .bind(&record.code)
        .bind(record.action)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume(
        &self,
        email: &str,
        purpose: CodePurpose,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        // Only the newest record for the key is claimable; the row lock makes
        // a concurrent claim re-check `is_used` after the first commits
        let claimed: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE email_code_records SET is_used = TRUE, used_at = $4
            WHERE id = (
                SELECT id FROM email_code_records
                WHERE email = $1 AND action = $2
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                FOR UPDATE
            )
            AND code = $3 AND NOT is_used AND expires_at > $4
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(purpose)
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed.is_some())
    }
}
