//! Catalog endpoints

use axum::extract::State;
use axum_extra::extract::Multipart;

use crate::{
    error::AppError,
    models::{
        book::{BookIdRequest, BookQuery, CoverRequest, CoverResponse, CreateBook, UpdateBook},
        Book, PaginatedResponse,
    },
    AppState,
};

use super::{success, ApiJson, ApiResult};

/// Add a book (admin)
#[utoipa::path(
    post,
    path = "/book/add",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 200, description = "Book created", body = Book),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_book(
    State(state): State<AppState>,
    ApiJson(book): ApiJson<CreateBook>,
) -> ApiResult<Book> {
    let book = state.services.catalog.add(&book).await?;
    Ok(success(book))
}

/// Edit a book (admin)
#[utoipa::path(
    post,
    path = "/book/edit",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Total below borrowed copies", body = crate::error::ErrorResponse)
    )
)]
pub async fn edit_book(
    State(state): State<AppState>,
    ApiJson(update): ApiJson<UpdateBook>,
) -> ApiResult<Book> {
    let book = state.services.catalog.edit(&update).await?;
    Ok(success(book))
}

/// Delete a book without open borrows (admin)
#[utoipa::path(
    post,
    path = "/book/delete",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookIdRequest,
    responses(
        (status = 200, description = "Book deleted"),
        (status = 422, description = "Book has open borrows", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BookIdRequest>,
) -> ApiResult<()> {
    state.services.catalog.delete(request.id).await?;
    Ok(success(()))
}

/// Book details
#[utoipa::path(
    post,
    path = "/book/detail",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookIdRequest,
    responses(
        (status = 200, description = "Book", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn book_detail(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BookIdRequest>,
) -> ApiResult<Book> {
    let book = state.services.catalog.detail(request.id).await?;
    Ok(success(book))
}

/// Search by keyword and category
#[utoipa::path(
    post,
    path = "/book/search",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookQuery,
    responses(
        (status = 200, description = "Matching books, newest first", body = PaginatedResponse<Book>),
        (status = 400, description = "Keyword too short", body = crate::error::ErrorResponse),
        (status = 404, description = "Keyword matched nothing", body = crate::error::ErrorResponse)
    )
)]
pub async fn search_books(
    State(state): State<AppState>,
    ApiJson(query): ApiJson<BookQuery>,
) -> ApiResult<PaginatedResponse<Book>> {
    let page = state.services.catalog.search(&query).await?;
    Ok(success(page))
}

/// Upload a cover image (multipart `book_id` + `image`, admin)
#[utoipa::path(
    post,
    path = "/book/uploadCover",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Cover stored", body = CoverResponse),
        (status = 400, description = "Unsupported image", body = crate::error::ErrorResponse),
        (status = 413, description = "Image too large", body = crate::error::ErrorResponse),
        (status = 502, description = "Storage unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn upload_cover(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<CoverResponse> {
    let mut book_id: Option<i64> = None;
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("book_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid book_id: {}", e)))?;
                book_id = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| AppError::BadRequest(format!("Invalid book_id: {}", text)))?,
                );
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read image: {}", e)))?;
                image = Some((filename, data.to_vec()));
            }
            _ => {}
        }
    }

    let book_id = book_id.ok_or_else(|| AppError::BadRequest("book_id is required".to_string()))?;
    let (filename, data) =
        image.ok_or_else(|| AppError::BadRequest("image is required".to_string()))?;

    let cover = state
        .services
        .catalog
        .upload_cover(book_id, &filename, data)
        .await?;
    Ok(success(cover))
}

/// Remove a cover image (admin)
#[utoipa::path(
    post,
    path = "/book/deleteCover",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CoverRequest,
    responses(
        (status = 200, description = "Cover removed"),
        (status = 404, description = "Book has no cover", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_cover(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CoverRequest>,
) -> ApiResult<()> {
    state.services.catalog.delete_cover(request.book_id).await?;
    Ok(success(()))
}
