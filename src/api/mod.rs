//! API handlers for Bookshelf REST endpoints

pub mod admin;
pub mod books;
pub mod borrows;
pub mod health;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    body::{to_bytes, Body},
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Query, Request, State},
    http::{header::CONTENT_TYPE, request::Parts},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::{AppError, AppResult},
    models::UserClaims,
    services::catalog::MAX_COVER_BYTES,
    AppState,
};

/// Largest JSON body inspected for a `token` field
const MAX_TOKEN_BODY_BYTES: usize = 1024 * 1024;

/// Success envelope: `{"code":0,"message":"success","data":...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u32,
    pub message: String,
    pub data: T,
}

/// Wrap a payload in the success envelope
pub fn success<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: 0,
        message: "success".to_string(),
        data,
    })
}

/// JSON body whose rejections are reported through the error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Claims placed in request extensions by [`authenticate`]
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserClaims>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| AppError::Authentication("Missing token".to_string()))
    }
}

#[derive(Deserialize)]
struct TokenParam {
    token: Option<String>,
}

fn non_empty(token: Option<String>) -> Option<String> {
    token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false)
}

/// Resolve the session token from the bearer header, the `token` query
/// parameter or a `token` field of a JSON body, in that order.
pub async fn authenticate(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut request = request;
    let mut token = non_empty(bearer.map(|TypedHeader(Authorization(bearer))| bearer.token().to_string()));

    if token.is_none() {
        token = Query::<TokenParam>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(param)| non_empty(param.token));
    }

    if token.is_none() && is_json(&request) {
        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, MAX_TOKEN_BODY_BYTES)
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read body: {}", e)))?;
        token = serde_json::from_slice::<TokenParam>(&bytes)
            .ok()
            .and_then(|param| non_empty(param.token));
        request = Request::from_parts(parts, Body::from(bytes));
    }

    let token = token.ok_or_else(|| AppError::Authentication("Missing token".to_string()))?;
    let claims = state.services.tokens.validate(&token)?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Reject callers the admin resolver does not recognise
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = request
        .extensions()
        .get::<UserClaims>()
        .cloned()
        .ok_or_else(|| AppError::Authentication("Missing token".to_string()))?;

    if !state.services.admins.is_admin(&claims).await? {
        tracing::warn!("User {} denied admin access to {}", claims.user_id, request.uri().path());
        return Err(AppError::Authorization(
            "Administrator privileges required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/user/register", post(users::register))
        .route("/user/login", post(users::login))
        .route("/user/sendEmailCode", post(users::send_email_code))
        .route("/user/forgetPassword", post(users::forget_password));

    let admin = Router::new()
        .route("/book/add", post(books::add_book))
        .route("/book/edit", post(books::edit_book))
        .route("/book/delete", post(books::delete_book))
        .route(
            "/book/uploadCover",
            post(books::upload_cover).layer(DefaultBodyLimit::max(MAX_COVER_BYTES * 2)),
        )
        .route("/book/deleteCover", post(books::delete_cover))
        .route("/borrow/allRecords", post(borrows::all_records))
        .route("/admin/emailCodeList", post(admin::email_code_list))
        .route("/admin/emailCodeStats", post(admin::email_code_stats))
        .route("/admin/userRole", post(admin::set_user_role))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let protected = Router::new()
        .route("/user/profile", post(users::profile))
        .route("/user/changePassword", post(users::change_password))
        .route("/user/borrowRecords", post(borrows::records))
        .route("/book/detail", post(books::book_detail))
        .route("/book/search", post(books::search_books))
        .route("/borrow/borrow", post(borrows::borrow))
        .route("/borrow/return", post(borrows::return_book))
        .route("/borrow/records", post(borrows::records))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let api = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .merge(public)
        .merge(protected)
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Handler result carrying the success envelope
pub type ApiResult<T> = AppResult<Json<ApiResponse<T>>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, repository::Repository, services::Services};
    use axum::http::{header::AUTHORIZATION, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state(config: AppConfig) -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let services = Services::new(Repository::new(pool.clone()), &config).unwrap();
        AppState {
            config: Arc::new(config),
            services: Arc::new(services),
            pool,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn token_for(state: &AppState, email: &str, role: crate::models::UserRole) -> String {
        let user = crate::models::User {
            id: 1,
            email: email.to_string(),
            password: String::new(),
            role,
            status: crate::models::UserStatus::Normal,
            register_time: chrono::Utc::now(),
        };
        state.services.tokens.issue(&user).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = create_router(state(AppConfig::default()));
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthenticated() {
        let app = create_router(state(AppConfig::default()));
        let response = app
            .oneshot(
                Request::post("/api/borrow/borrow")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"book_id":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], 10027);
    }

    #[tokio::test]
    async fn test_garbage_token_in_body_is_rejected() {
        let app = create_router(state(AppConfig::default()));
        let response = app
            .oneshot(
                Request::post("/api/user/profile")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"token":"not-a-jwt"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_json(response).await["code"], 10028);
    }

    #[tokio::test]
    async fn test_admin_route_rejects_bad_payload_after_allow_list() {
        let mut config = AppConfig::default();
        config.auth.admin_emails = vec!["boss@example.org".to_string()];
        let state = state(config);
        let token = token_for(&state, "boss@example.org", crate::models::UserRole::User);

        // Passing both middlewares lands on the handler's body validation
        let response = create_router(state)
            .oneshot(
                Request::post("/api/admin/emailCodeList")
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"page":0,"limit":10}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], 10001);
    }

    #[tokio::test]
    async fn test_token_in_query_is_accepted() {
        let mut config = AppConfig::default();
        config.auth.admin_emails = vec!["boss@example.org".to_string()];
        let state = state(config);
        let token = token_for(&state, "boss@example.org", crate::models::UserRole::Admin);

        let response = create_router(state)
            .oneshot(
                Request::post(format!("/api/admin/emailCodeList?token={}", token))
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"page":1,"limit":500}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
