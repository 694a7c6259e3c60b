//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, books, borrows, health, users};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf API",
        version = "0.3.0",
        description = "Library management REST API. Successful responses are wrapped as {code: 0, message, data}."
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Users
        users::register,
        users::login,
        users::send_email_code,
        users::forget_password,
        users::profile,
        users::change_password,
        // Books
        books::add_book,
        books::edit_book,
        books::delete_book,
        books::book_detail,
        books::search_books,
        books::upload_cover,
        books::delete_cover,
        // Borrows
        borrows::borrow,
        borrows::return_book,
        borrows::records,
        borrows::all_records,
        // Admin
        admin::email_code_list,
        admin::email_code_stats,
        admin::set_user_role,
    ),
    components(
        schemas(
            // Users
            crate::models::user::UserInfo,
            crate::models::user::UserRole,
            crate::models::user::UserStatus,
            crate::models::user::RegisterRequest,
            crate::models::user::LoginRequest,
            crate::models::user::SendEmailCodeRequest,
            crate::models::user::ForgetPasswordRequest,
            crate::models::user::ChangePasswordRequest,
            crate::models::user::SetRoleRequest,
            crate::services::users::LoginResponse,
            crate::services::users::ProfileResponse,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::BookIdRequest,
            crate::models::book::BookQuery,
            crate::models::book::CoverRequest,
            crate::models::book::CoverResponse,
            // Borrows
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::BorrowRecordDetails,
            crate::models::borrow::BorrowRequest,
            crate::models::borrow::BorrowResponse,
            crate::models::borrow::ReturnResponse,
            crate::models::borrow::StatusFilter,
            crate::models::borrow::RecordsQuery,
            crate::models::borrow::AllRecordsQuery,
            // Admin
            crate::models::email_code::CodePurpose,
            crate::models::email_code::EmailCodeRecord,
            crate::models::email_code::EmailCodeQuery,
            crate::models::email_code::EmailCodeList,
            crate::models::email_code::EmailCodeStats,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Accounts and authentication"),
        (name = "books", description = "Catalog management"),
        (name = "borrows", description = "Borrowing and returns"),
        (name = "admin", description = "Administration")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/user/login", "/book/uploadCover", "/borrow/return", "/admin/userRole"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        assert!(doc
            .components
            .as_ref()
            .map(|c| c.security_schemes.contains_key("bearer_auth"))
            .unwrap_or(false));
    }
}
