//! Error types for Bookshelf server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable application error codes carried by every error envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 10001,
    InvalidEmail = 10002,
    EmailTaken = 10003,
    InvalidCode = 10004,
    PasswordMismatch = 10005,
    PasswordTooShort = 10006,
    BadCredentials = 10007,
    EmailNotRegistered = 10008,
    Forbidden = 10009,
    BookNotFound = 10010,
    OutOfStock = 10011,
    BorrowLimitExceeded = 10012,
    DuplicateBorrow = 10013,
    BookInUse = 10014,
    NoActiveBorrow = 10015,
    AlreadyReturned = 10016,
    DuplicateIsbn = 10017,
    InvalidQuantity = 10018,
    KeywordTooShort = 10019,
    NoSearchResults = 10020,
    UnsupportedImage = 10021,
    ImageTooLarge = 10022,
    StorageUnavailable = 10023,
    NoCover = 10024,
    RateLimited = 10025,
    CodeExpired = 10026,
    Unauthenticated = 10027,
    InvalidToken = 10028,
    TokenExpired = 10029,
    AccountDisabled = 10030,
    UserNotFound = 10031,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // Validation
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Search keyword is too short")]
    KeywordTooShort,

    #[error("Unsupported image format: {0}")]
    UnsupportedImage(String),

    #[error("Image exceeds {0} bytes")]
    ImageTooLarge(usize),

    // Authentication / authorization
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid email or password")]
    BadCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Authorization failed: {0}")]
    Authorization(String),

    // Not found
    #[error("Book with id {0} not found")]
    BookNotFound(i64),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Email is not registered")]
    EmailNotRegistered,

    #[error("Search returned no results")]
    NoSearchResults,

    #[error("Book has no cover image")]
    NoCover,

    // Conflicts
    #[error("Email is already registered")]
    EmailTaken,

    #[error("ISBN {0} already exists")]
    DuplicateIsbn(String),

    #[error("An active borrow already exists for this book")]
    DuplicateBorrow,

    #[error("Verification code requested too frequently")]
    RateLimited,

    // State
    #[error("Book is out of stock")]
    OutOfStock,

    #[error("Borrow limit of {0} books reached")]
    BorrowLimitExceeded(i64),

    #[error("No active borrow for this book")]
    NoActiveBorrow,

    #[error("Book already returned")]
    AlreadyReturned,

    #[error("Total quantity {requested} is below the {borrowed} copies currently borrowed")]
    InvalidQuantity { requested: i32, borrowed: i64 },

    #[error("Book has active borrows and cannot be deleted")]
    BookInUse,

    #[error("Verification code is invalid")]
    InvalidCode,

    #[error("Verification code has expired")]
    CodeExpired,

    // Infrastructure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable numeric code surfaced to the caller
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::BadRequest(_) => ErrorCode::Failure,
            AppError::InvalidEmail => ErrorCode::InvalidEmail,
            AppError::PasswordTooShort(_) => ErrorCode::PasswordTooShort,
            AppError::PasswordMismatch => ErrorCode::PasswordMismatch,
            AppError::KeywordTooShort => ErrorCode::KeywordTooShort,
            AppError::UnsupportedImage(_) => ErrorCode::UnsupportedImage,
            AppError::ImageTooLarge(_) => ErrorCode::ImageTooLarge,
            AppError::Authentication(_) => ErrorCode::Unauthenticated,
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::TokenExpired => ErrorCode::TokenExpired,
            AppError::BadCredentials => ErrorCode::BadCredentials,
            AppError::AccountDisabled => ErrorCode::AccountDisabled,
            AppError::Authorization(_) => ErrorCode::Forbidden,
            AppError::BookNotFound(_) => ErrorCode::BookNotFound,
            AppError::UserNotFound(_) => ErrorCode::UserNotFound,
            AppError::EmailNotRegistered => ErrorCode::EmailNotRegistered,
            AppError::NoSearchResults => ErrorCode::NoSearchResults,
            AppError::NoCover => ErrorCode::NoCover,
            AppError::EmailTaken => ErrorCode::EmailTaken,
            AppError::DuplicateIsbn(_) => ErrorCode::DuplicateIsbn,
            AppError::DuplicateBorrow => ErrorCode::DuplicateBorrow,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::OutOfStock => ErrorCode::OutOfStock,
            AppError::BorrowLimitExceeded(_) => ErrorCode::BorrowLimitExceeded,
            AppError::NoActiveBorrow => ErrorCode::NoActiveBorrow,
            AppError::AlreadyReturned => ErrorCode::AlreadyReturned,
            AppError::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
            AppError::BookInUse => ErrorCode::BookInUse,
            AppError::InvalidCode => ErrorCode::InvalidCode,
            AppError::CodeExpired => ErrorCode::CodeExpired,
            AppError::Database(_) | AppError::Internal(_) => ErrorCode::Failure,
            AppError::Storage(_) => ErrorCode::StorageUnavailable,
        }
    }

    /// Transport status; secondary to the code in the envelope
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::InvalidEmail
            | AppError::PasswordTooShort(_)
            | AppError::PasswordMismatch
            | AppError::KeywordTooShort
            | AppError::UnsupportedImage(_)
            | AppError::InvalidCode
            | AppError::CodeExpired => StatusCode::BAD_REQUEST,
            AppError::ImageTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Authentication(_)
            | AppError::InvalidToken
            | AppError::TokenExpired
            | AppError::BadCredentials => StatusCode::UNAUTHORIZED,
            AppError::AccountDisabled | AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::BookNotFound(_)
            | AppError::UserNotFound(_)
            | AppError::EmailNotRegistered
            | AppError::NoSearchResults
            | AppError::NoCover => StatusCode::NOT_FOUND,
            AppError::EmailTaken | AppError::DuplicateIsbn(_) | AppError::DuplicateBorrow => {
                StatusCode::CONFLICT
            }
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::OutOfStock
            | AppError::BorrowLimitExceeded(_)
            | AppError::NoActiveBorrow
            | AppError::AlreadyReturned
            | AppError::InvalidQuantity { .. }
            | AppError::BookInUse => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Storage(msg) => {
                tracing::warn!("Storage error: {}", msg);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (self.status(), body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
