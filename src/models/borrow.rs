//! Borrow record model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::text_enum;

/// Lifecycle of a borrow record; `returned` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
}

text_enum!(BorrowStatus {
    Borrowed => "borrowed",
    Returned => "returned",
});

/// Borrow record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
}

/// Borrow record joined with book title (and borrower email for admins)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct BorrowRecordDetails {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub book_id: i64,
    pub book_title: Option<String>,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
}

/// Borrow / return request
#[derive(Debug, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub book_id: i64,
}

/// Successful borrow
#[derive(Debug, Serialize, ToSchema)]
pub struct BorrowResponse {
    pub record_id: i64,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Successful return
#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnResponse {
    pub record_id: i64,
    pub return_date: DateTime<Utc>,
}

/// Status filter accepted by record listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Borrowed,
    Returned,
}

impl StatusFilter {
    pub fn as_status(&self) -> Option<BorrowStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Borrowed => Some(BorrowStatus::Borrowed),
            StatusFilter::Returned => Some(BorrowStatus::Returned),
        }
    }
}

/// Own borrow records query
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RecordsQuery {
    #[serde(default)]
    pub status: StatusFilter,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// All borrow records query (admin)
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AllRecordsQuery {
    /// Substring match on borrower email
    pub user_email: Option<String>,
    /// Substring match on book title
    pub book_title: Option<String>,
    #[serde(default)]
    pub status: StatusFilter,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
