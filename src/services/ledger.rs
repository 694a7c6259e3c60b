//! Stock accounting rules for borrow and return.
//!
//! The [`BorrowLedger`] trait is the atomic boundary: each method must run its
//! reads and writes as one unit (a transaction with row locks for the
//! PostgreSQL adapter). The rules themselves live in [`LoanPolicy`] and
//! [`restock`] so every adapter evaluates them identically, against a
//! [`BorrowSnapshot`] taken while holding its locks.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{book::UpdateBook, Book, BorrowRecord},
};

/// State read under lock before a borrow is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowSnapshot {
    /// `None` when the book does not exist
    pub available_quantity: Option<i32>,
    /// Records currently `borrowed` by the caller, across all books
    pub active_borrows: i64,
    /// Whether the caller already holds this book
    pub already_borrowed: bool,
}

/// Borrowing limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    pub max_active_borrows: i64,
    pub loan_days: i64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            max_active_borrows: 5,
            loan_days: 30,
        }
    }
}

impl From<&LoansConfig> for LoanPolicy {
    fn from(config: &LoansConfig) -> Self {
        Self {
            max_active_borrows: config.max_active_borrows,
            loan_days: config.loan_days,
        }
    }
}

impl LoanPolicy {
    /// Decide a borrow. Checks run in a fixed order: existence, stock,
    /// per-user limit, duplicate.
    pub fn check_borrow(&self, book_id: i64, snapshot: &BorrowSnapshot) -> AppResult<()> {
        let available = snapshot
            .available_quantity
            .ok_or(AppError::BookNotFound(book_id))?;
        if available <= 0 {
            return Err(AppError::OutOfStock);
        }
        if snapshot.active_borrows >= self.max_active_borrows {
            return Err(AppError::BorrowLimitExceeded(self.max_active_borrows));
        }
        if snapshot.already_borrowed {
            return Err(AppError::DuplicateBorrow);
        }
        Ok(())
    }

    pub fn due_date(&self, borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
        borrowed_at + Duration::days(self.loan_days)
    }
}

/// Available copies after changing the total; the total may not drop below
/// the number of copies currently out.
pub fn restock(new_total: i32, borrowed: i64) -> AppResult<i32> {
    if new_total < 0 || i64::from(new_total) < borrowed {
        return Err(AppError::InvalidQuantity {
            requested: new_total,
            borrowed,
        });
    }
    // borrowed <= new_total <= i32::MAX here
    Ok(new_total - borrowed as i32)
}

/// Atomic stock operations over books and borrow records
#[async_trait]
pub trait BorrowLedger: Send + Sync {
    /// Create a `borrowed` record and take one copy out of stock
    async fn borrow(
        &self,
        user_id: i64,
        book_id: i64,
        policy: &LoanPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord>;

    /// Close the caller's open record and put the copy back
    async fn return_book(
        &self,
        user_id: i64,
        book_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord>;

    /// Apply a catalog edit. A new total recomputes availability from the
    /// open records read in the same unit.
    async fn update_book(&self, update: &UpdateBook, now: DateTime<Utc>) -> AppResult<Book>;

    /// Delete a book that has no open records
    async fn delete_book(&self, book_id: i64) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn snapshot(available: Option<i32>, active: i64, duplicate: bool) -> BorrowSnapshot {
        BorrowSnapshot {
            available_quantity: available,
            active_borrows: active,
            already_borrowed: duplicate,
        }
    }

    #[test]
    fn test_borrow_checks_follow_evaluation_order() {
        let policy = LoanPolicy::default();

        // Everything wrong at once: the missing book wins
        let err = policy.check_borrow(9, &snapshot(None, 5, true)).unwrap_err();
        assert!(matches!(err, AppError::BookNotFound(9)));

        let err = policy.check_borrow(9, &snapshot(Some(0), 5, true)).unwrap_err();
        assert!(matches!(err, AppError::OutOfStock));

        let err = policy.check_borrow(9, &snapshot(Some(1), 5, true)).unwrap_err();
        assert!(matches!(err, AppError::BorrowLimitExceeded(5)));

        let err = policy.check_borrow(9, &snapshot(Some(1), 4, true)).unwrap_err();
        assert!(matches!(err, AppError::DuplicateBorrow));

        assert_ok!(policy.check_borrow(9, &snapshot(Some(1), 4, false)));
    }

    #[test]
    fn test_due_date_is_thirty_days_out() {
        let policy = LoanPolicy::default();
        let now = Utc::now();
        assert_eq!(policy.due_date(now) - now, Duration::days(30));
    }

    #[test]
    fn test_restock_subtracts_borrowed_copies() {
        assert_eq!(restock(5, 2).unwrap(), 3);
        assert_eq!(restock(2, 2).unwrap(), 0);
        assert!(matches!(
            restock(1, 2),
            Err(AppError::InvalidQuantity { requested: 1, borrowed: 2 })
        ));
        assert_err!(restock(-1, 0));
    }
}
