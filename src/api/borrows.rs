//! Borrowing endpoints

use axum::extract::State;

use crate::{
    models::{
        borrow::{
            AllRecordsQuery, BorrowRecordDetails, BorrowRequest, BorrowResponse, RecordsQuery,
            ReturnResponse,
        },
        PaginatedResponse,
    },
    AppState,
};

use super::{success, ApiJson, ApiResult, AuthenticatedUser};

/// Borrow one copy of a book
#[utoipa::path(
    post,
    path = "/borrow/borrow",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "Book borrowed", body = BorrowResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already borrowed by caller", body = crate::error::ErrorResponse),
        (status = 422, description = "Out of stock or borrow limit reached", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(request): ApiJson<BorrowRequest>,
) -> ApiResult<BorrowResponse> {
    let response = state
        .services
        .borrows
        .borrow(claims.user_id, request.book_id)
        .await?;
    Ok(success(response))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrow/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 422, description = "No open borrow or already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(request): ApiJson<BorrowRequest>,
) -> ApiResult<ReturnResponse> {
    let response = state
        .services
        .borrows
        .return_book(claims.user_id, request.book_id)
        .await?;
    Ok(success(response))
}

/// Caller's borrow records
#[utoipa::path(
    post,
    path = "/borrow/records",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = RecordsQuery,
    responses(
        (status = 200, description = "Records, newest first", body = PaginatedResponse<BorrowRecordDetails>)
    )
)]
pub async fn records(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(query): ApiJson<RecordsQuery>,
) -> ApiResult<PaginatedResponse<BorrowRecordDetails>> {
    let page = state.services.borrows.records(claims.user_id, &query).await?;
    Ok(success(page))
}

/// Every borrow record (admin)
#[utoipa::path(
    post,
    path = "/borrow/allRecords",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = AllRecordsQuery,
    responses(
        (status = 200, description = "Records, newest first", body = PaginatedResponse<BorrowRecordDetails>),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse)
    )
)]
pub async fn all_records(
    State(state): State<AppState>,
    ApiJson(query): ApiJson<AllRecordsQuery>,
) -> ApiResult<PaginatedResponse<BorrowRecordDetails>> {
    let page = state.services.borrows.all_records(&query).await?;
    Ok(success(page))
}
