//! Books repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{BookQuery, CreateBook},
        Book, PageRequest,
    },
};

use super::like_pattern;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::BookNotFound(id))
    }

    /// Check if an ISBN is already catalogued
    pub async fn isbn_exists(&self, isbn: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
            .bind(isbn)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Insert a book with every copy available
    pub async fn create(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, category, total_quantity,
                               available_quantity, description, create_time, update_time)
            VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(book.title.trim())
        .bind(book.author.trim())
        .bind(book.isbn.trim())
        .bind(book.category.trim())
        .bind(book.total_quantity)
        .bind(book.description.trim())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::DuplicateIsbn(book.isbn.trim().to_string())
            }
            other => AppError::Database(other),
        })
    }

    /// Search by keyword (title or author) and exact category, newest first
    pub async fn search(&self, query: &BookQuery, page: PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let keyword = query.keyword().map(like_pattern);
        let category = query.category();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1)
              AND ($2::text IS NULL OR category = $2)
            "#,
        )
        .bind(keyword.as_deref())
        .bind(category)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1)
              AND ($2::text IS NULL OR category = $2)
            ORDER BY create_time DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(keyword.as_deref())
        .bind(category)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Replace (or clear) the cover URL
    pub async fn set_cover(
        &self,
        id: i64,
        cover_image_url: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            "UPDATE books SET cover_image_url = $1, update_time = $2 WHERE id = $3 RETURNING *",
        )
        .bind(cover_image_url)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::BookNotFound(id))
    }
}
