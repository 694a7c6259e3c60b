//! Bookshelf Library Management Server
//!
//! REST JSON backend for a small library: accounts with emailed
//! verification codes, a book catalog with cover images, and borrowing
//! with per-user limits and exact stock accounting.

use std::sync::Arc;

use sqlx::PgPool;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pool: PgPool,
}
