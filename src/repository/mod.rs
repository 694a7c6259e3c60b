//! Repository layer for database operations

pub mod books;
pub mod borrows;
pub mod email_codes;
pub mod users;

#[cfg(test)]
pub mod memory;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub books: books::BooksRepository,
    pub borrows: borrows::BorrowsRepository,
    pub email_codes: email_codes::EmailCodesRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            borrows: borrows::BorrowsRepository::new(pool.clone()),
            email_codes: email_codes::EmailCodesRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Substring `ILIKE` pattern with wildcards in the input escaped
pub(crate) fn like_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
