//! Data models for Bookshelf

/// Implements string-backed Postgres encoding plus `Display`/`FromStr` for a
/// unit-variant enum stored in a text column.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("Invalid {}: {}", stringify!($ty), other)),
                }
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

pub(crate) use text_enum;

pub mod book;
pub mod borrow;
pub mod email_code;
pub mod user;

use serde::Serialize;
use utoipa::ToSchema;

// Re-export commonly used types
pub use book::Book;
pub use borrow::{BorrowRecord, BorrowStatus};
pub use email_code::{CodePurpose, EmailCodeRecord};
pub use user::{User, UserClaims, UserRole, UserStatus};

/// Largest page size accepted by list endpoints
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Normalized paging window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Fill defaults and clamp to sane bounds
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Self { page, limit }
    }

    /// Saturates, so an absurd page reads past the end instead of overflowing
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Page content
    pub items: Vec<T>,
    /// Total number of matching rows
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Page size
    pub limit: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, page: PageRequest) -> Self {
        Self {
            items,
            total,
            page: page.page,
            limit: page.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults_and_clamps() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(Some(0), Some(-3)), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).limit, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn test_huge_page_offset_saturates() {
        let page = PageRequest::new(Some(i64::MAX), Some(10));
        assert_eq!(page.page, i64::MAX);
        assert_eq!(page.offset(), i64::MAX);
    }
}
