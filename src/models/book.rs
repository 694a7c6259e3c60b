//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Minimum length of a non-empty search keyword
pub const MIN_KEYWORD_LEN: usize = 2;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub total_quantity: i32,
    pub available_quantity: i32,
    pub description: String,
    pub cover_image_url: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub total_quantity: i32,
    #[serde(default)]
    pub description: String,
}

/// Partial book update; absent or empty fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateBook {
    pub id: i64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub total_quantity: Option<i32>,
    pub description: Option<String>,
}

impl UpdateBook {
    /// Apply the descriptive (non-stock) fields onto an existing book
    pub fn apply_to(&self, book: &mut Book) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *target = v.to_string();
            }
        }
        set(&mut book.title, &self.title);
        set(&mut book.author, &self.author);
        set(&mut book.isbn, &self.isbn);
        set(&mut book.category, &self.category);
        set(&mut book.description, &self.description);
    }

    /// New ISBN if the request changes it
    pub fn new_isbn<'a>(&'a self, current: &str) -> Option<&'a str> {
        self.isbn
            .as_deref()
            .map(str::trim)
            .filter(|isbn| !isbn.is_empty() && *isbn != current)
    }
}

/// Request addressing a single book
#[derive(Debug, Deserialize, ToSchema)]
pub struct BookIdRequest {
    pub id: i64,
}

/// Request addressing a book cover
#[derive(Debug, Deserialize, ToSchema)]
pub struct CoverRequest {
    pub book_id: i64,
}

/// Uploaded cover location
#[derive(Debug, Serialize, ToSchema)]
pub struct CoverResponse {
    pub image_url: String,
    pub book_id: i64,
}

/// Book search parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Matched against title and author
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl BookQuery {
    /// Trimmed, non-empty keyword
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Book {
        Book {
            id: 1,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "9780441013593".to_string(),
            category: "fiction".to_string(),
            total_quantity: 3,
            available_quantity: 3,
            description: String::new(),
            cover_image_url: None,
            create_time: Utc::now(),
            update_time: Utc::now(),
        }
    }

    #[test]
    fn test_partial_update_skips_blank_fields() {
        let mut book = sample_book();
        let update = UpdateBook {
            id: 1,
            title: Some("Dune Messiah".to_string()),
            author: Some("   ".to_string()),
            ..Default::default()
        };
        update.apply_to(&mut book);
        assert_eq!(book.title, "Dune Messiah");
        assert_eq!(book.author, "Frank Herbert");
    }

    #[test]
    fn test_new_isbn_only_when_changed() {
        let update = UpdateBook {
            id: 1,
            isbn: Some("9780441013593".to_string()),
            ..Default::default()
        };
        assert_eq!(update.new_isbn("9780441013593"), None);
        assert_eq!(update.new_isbn("123"), Some("9780441013593"));
    }
}
