//! Catalog management service

use std::sync::Arc;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{BookQuery, CoverResponse, CreateBook, UpdateBook, MIN_KEYWORD_LEN},
        Book, PageRequest, PaginatedResponse,
    },
    repository::Repository,
    services::{
        ledger::BorrowLedger,
        storage::{content_type_for, ObjectStore},
    },
};

/// Largest accepted cover upload
pub const MAX_COVER_BYTES: usize = 5 * 1024 * 1024;

/// Accepted cover file extensions
pub const COVER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Lowercased extension of an accepted cover file name
pub fn cover_extension(filename: &str) -> AppResult<String> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_lowercase())
        .unwrap_or_default();

    if COVER_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(AppError::UnsupportedImage(filename.to_string()))
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    ledger: Arc<dyn BorrowLedger>,
    storage: Arc<dyn ObjectStore>,
}

impl CatalogService {
    pub fn new(
        repository: Repository,
        ledger: Arc<dyn BorrowLedger>,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            repository,
            ledger,
            storage,
        }
    }

    /// Add a book with every copy available
    pub async fn add(&self, book: &CreateBook) -> AppResult<Book> {
        for (field, value) in [
            ("title", &book.title),
            ("author", &book.author),
            ("isbn", &book.isbn),
            ("category", &book.category),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(format!("{} is required", field)));
            }
        }
        if book.total_quantity < 0 {
            return Err(AppError::InvalidQuantity {
                requested: book.total_quantity,
                borrowed: 0,
            });
        }
        if self.repository.books.isbn_exists(book.isbn.trim()).await? {
            return Err(AppError::DuplicateIsbn(book.isbn.trim().to_string()));
        }

        let created = self.repository.books.create(book, Utc::now()).await?;
        tracing::info!("Added book {} ({})", created.id, created.isbn);
        Ok(created)
    }

    /// Partial update; a new total is reconciled with open borrows
    pub async fn edit(&self, update: &UpdateBook) -> AppResult<Book> {
        let book = self.ledger.update_book(update, Utc::now()).await?;
        tracing::info!(
            "Edited book {} (total {}, available {})",
            book.id,
            book.total_quantity,
            book.available_quantity
        );
        Ok(book)
    }

    /// Delete a book without open borrows, then drop its cover
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let book = self.repository.books.get_by_id(id).await?;
        self.ledger.delete_book(id).await?;
        tracing::info!("Deleted book {}", id);

        if let Some(url) = book.cover_image_url {
            self.discard_cover(&url).await;
        }
        Ok(())
    }

    pub async fn detail(&self, id: i64) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn search(&self, query: &BookQuery) -> AppResult<PaginatedResponse<Book>> {
        let keyword = query.keyword();
        if let Some(keyword) = keyword {
            if keyword.chars().count() < MIN_KEYWORD_LEN {
                return Err(AppError::KeywordTooShort);
            }
        }

        let page = PageRequest::new(query.page, query.limit);
        let (books, total) = self.repository.books.search(query, page).await?;
        if keyword.is_some() && total == 0 {
            return Err(AppError::NoSearchResults);
        }

        Ok(PaginatedResponse::new(books, total, page))
    }

    /// Store a new cover and replace the book's URL
    pub async fn upload_cover(
        &self,
        book_id: i64,
        filename: &str,
        data: Vec<u8>,
    ) -> AppResult<CoverResponse> {
        let extension = cover_extension(filename)?;
        if data.len() > MAX_COVER_BYTES {
            return Err(AppError::ImageTooLarge(MAX_COVER_BYTES));
        }
        if !self.storage.is_configured() {
            return Err(AppError::Storage("Object storage is not configured".to_string()));
        }

        let book = self.repository.books.get_by_id(book_id).await?;

        let key = self.storage.cover_key(book_id, &extension);
        let image_url = self
            .storage
            .put(&key, data, content_type_for(&extension))
            .await?;

        self.repository
            .books
            .set_cover(book_id, Some(&image_url), Utc::now())
            .await?;
        tracing::info!("Cover of book {} set to {}", book_id, image_url);

        if let Some(previous) = book.cover_image_url {
            self.discard_cover(&previous).await;
        }

        Ok(CoverResponse { image_url, book_id })
    }

    /// Remove the book's cover
    pub async fn delete_cover(&self, book_id: i64) -> AppResult<()> {
        let book = self.repository.books.get_by_id(book_id).await?;
        let url = book.cover_image_url.ok_or(AppError::NoCover)?;

        self.discard_cover(&url).await;
        self.repository.books.set_cover(book_id, None, Utc::now()).await?;
        Ok(())
    }

    async fn discard_cover(&self, url: &str) {
        if !self.storage.is_configured() {
            return;
        }
        if let Err(e) = self.storage.delete(url).await {
            tracing::warn!("Failed to delete cover {}: {}", url, e);
        }
    }
}
