//! Verification code audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::text_enum;

/// What a verification code unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CodePurpose {
    Register,
    Forget,
}

text_enum!(CodePurpose {
    Register => "register",
    Forget => "forget",
});

/// Durable audit record of an issued code
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EmailCodeRecord {
    pub id: i64,
    pub email: String,
    pub code: String,
    pub action: CodePurpose,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

/// Record appended when a code is issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmailCode {
    pub email: String,
    pub code: String,
    pub action: CodePurpose,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Admin listing of issued codes
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailCodeQuery {
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: i64,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: i64,
    pub email: Option<String>,
    pub action: Option<CodePurpose>,
    pub is_used: Option<bool>,
    /// Substring match on email or code
    pub keyword: Option<String>,
}

/// Aggregate counters over the audit table
#[derive(Debug, Clone, Default, Serialize, FromRow, ToSchema)]
pub struct EmailCodeStats {
    pub total_count: i64,
    pub used_count: i64,
    pub unused_count: i64,
    /// Unused and past expiry
    pub expired_count: i64,
    pub register_count: i64,
    pub forget_count: i64,
}

/// Page of audit records
#[derive(Debug, Serialize, ToSchema)]
pub struct EmailCodeList {
    pub total: i64,
    pub list: Vec<EmailCodeRecord>,
}
