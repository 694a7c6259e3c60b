//! Borrow records repository.
//!
//! Implements [`BorrowLedger`] with one transaction per operation. Rows are
//! locked in a fixed order (user, then book, then record) so concurrent
//! borrows and returns serialize on the book row instead of deadlocking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::UpdateBook,
        borrow::{AllRecordsQuery, BorrowRecordDetails, RecordsQuery},
        Book, BorrowRecord, BorrowStatus, PageRequest,
    },
    services::ledger::{restock, BorrowLedger, BorrowSnapshot, LoanPolicy},
};

use super::like_pattern;

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Number of records currently open for a user
    pub async fn count_active(&self, user_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE user_id = $1 AND status = 'borrowed'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// A user's own records, newest first
    pub async fn list_for_user(
        &self,
        user_id: i64,
        query: &RecordsQuery,
        page: PageRequest,
    ) -> AppResult<(Vec<BorrowRecordDetails>, i64)> {
        let status = query.status.as_status();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM borrow_records
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let records = sqlx::query_as::<_, BorrowRecordDetails>(
            r#"
            SELECT r.id, NULL::bigint AS user_id, NULL::text AS user_email,
                   r.book_id, b.title AS book_title,
                   r.borrow_date, r.due_date, r.return_date, r.status
            FROM borrow_records r
            LEFT JOIN books b ON b.id = r.book_id
            WHERE r.user_id = $1 AND ($2::text IS NULL OR r.status = $2)
            ORDER BY r.borrow_date DESC, r.id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((records, total))
    }

    /// Every record, filtered by borrower email, book title and status
    pub async fn list_all(
        &self,
        query: &AllRecordsQuery,
        page: PageRequest,
    ) -> AppResult<(Vec<BorrowRecordDetails>, i64)> {
        let email = non_blank(query.user_email.as_deref()).map(like_pattern);
        let title = non_blank(query.book_title.as_deref()).map(like_pattern);
        let status = query.status.as_status();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM borrow_records r
            LEFT JOIN users u ON u.id = r.user_id
            LEFT JOIN books b ON b.id = r.book_id
            WHERE ($1::text IS NULL OR u.email ILIKE $1)
              AND ($2::text IS NULL OR b.title ILIKE $2)
              AND ($3::text IS NULL OR r.status = $3)
            "#,
        )
        .bind(email.as_deref())
        .bind(title.as_deref())
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let records = sqlx::query_as::<_, BorrowRecordDetails>(
            r#"
            SELECT r.id, r.user_id, u.email AS user_email,
                   r.book_id, b.title AS book_title,
                   r.borrow_date, r.due_date, r.return_date, r.status
            FROM borrow_records r
            LEFT JOIN users u ON u.id = r.user_id
            LEFT JOIN books b ON b.id = r.book_id
            WHERE ($1::text IS NULL OR u.email ILIKE $1)
              AND ($2::text IS NULL OR b.title ILIKE $2)
              AND ($3::text IS NULL OR r.status = $3)
            ORDER BY r.borrow_date DESC, r.id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(email.as_deref())
        .bind(title.as_deref())
        .bind(status)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((records, total))
    }

    async fn lock_book(tx: &mut Transaction<'_, Postgres>, book_id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(book)
    }

    async fn count_open_for_book(tx: &mut Transaction<'_, Postgres>, book_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE book_id = $1 AND status = 'borrowed'",
        )
        .bind(book_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl BorrowLedger for BorrowsRepository {
    async fn borrow(
        &self,
        user_id: i64,
        book_id: i64,
        policy: &LoanPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        // Serializes one user's borrows so the limit holds across books
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::UserNotFound(format!("id {}", user_id)))?;

        let book = Self::lock_book(&mut tx, book_id).await?;

        let active_borrows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE user_id = $1 AND status = 'borrowed'",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let already_borrowed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM borrow_records
                WHERE user_id = $1 AND book_id = $2 AND status = 'borrowed'
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        policy.check_borrow(
            book_id,
            &BorrowSnapshot {
                available_quantity: book.map(|b| b.available_quantity),
                active_borrows,
                already_borrowed,
            },
        )?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrow_records (user_id, book_id, borrow_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .bind(policy.due_date(now))
        .bind(BorrowStatus::Borrowed)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::DuplicateBorrow,
            other => AppError::Database(other),
        })?;

        let updated = sqlx::query(
            r#"
            UPDATE books SET available_quantity = available_quantity - 1
            WHERE id = $1 AND available_quantity > 0
            "#,
        )
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(AppError::OutOfStock);
        }

        tx.commit().await?;
        Ok(record)
    }

    async fn return_book(
        &self,
        user_id: i64,
        book_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        let book = Self::lock_book(&mut tx, book_id).await?;

        let open = sqlx::query_as::<_, BorrowRecord>(
            r#"
            SELECT * FROM borrow_records
            WHERE user_id = $1 AND book_id = $2 AND status = 'borrowed'
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(open) = open else {
            let returned: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM borrow_records
                    WHERE user_id = $1 AND book_id = $2 AND status = 'returned'
                )
                "#,
            )
            .bind(user_id)
            .bind(book_id)
            .fetch_one(&mut *tx)
            .await?;

            return Err(if returned {
                AppError::AlreadyReturned
            } else {
                AppError::NoActiveBorrow
            });
        };

        if book.is_none() {
            return Err(AppError::Internal(format!(
                "Open borrow record {} references missing book {}",
                open.id, book_id
            )));
        }

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records SET status = $1, return_date = $2
            WHERE id = $3 AND status = 'borrowed'
            RETURNING *
            "#,
        )
        .bind(BorrowStatus::Returned)
        .bind(now)
        .bind(open.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::AlreadyReturned)?;

        let updated = sqlx::query(
            r#"
            UPDATE books SET available_quantity = available_quantity + 1
            WHERE id = $1 AND available_quantity < total_quantity
            "#,
        )
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(AppError::Internal(format!(
                "Stock for book {} is already at its total",
                book_id
            )));
        }

        tx.commit().await?;
        Ok(record)
    }

    async fn update_book(&self, update: &UpdateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let mut book = Self::lock_book(&mut tx, update.id)
            .await?
            .ok_or(AppError::BookNotFound(update.id))?;

        if let Some(isbn) = update.new_isbn(&book.isbn) {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND id != $2)",
            )
            .bind(isbn)
            .bind(book.id)
            .fetch_one(&mut *tx)
            .await?;
            if taken {
                return Err(AppError::DuplicateIsbn(isbn.to_string()));
            }
        }

        update.apply_to(&mut book);

        if let Some(total) = update.total_quantity {
            let borrowed = Self::count_open_for_book(&mut tx, book.id).await?;
            book.available_quantity = restock(total, borrowed)?;
            book.total_quantity = total;
        }

        let saved = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $1, author = $2, isbn = $3, category = $4, description = $5,
                total_quantity = $6, available_quantity = $7, update_time = $8
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.category)
        .bind(&book.description)
        .bind(book.total_quantity)
        .bind(book.available_quantity)
        .bind(now)
        .bind(book.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::DuplicateIsbn(book.isbn.clone())
            }
            other => AppError::Database(other),
        })?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_book(&self, book_id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        Self::lock_book(&mut tx, book_id)
            .await?
            .ok_or(AppError::BookNotFound(book_id))?;

        if Self::count_open_for_book(&mut tx, book_id).await? > 0 {
            return Err(AppError::BookInUse);
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
