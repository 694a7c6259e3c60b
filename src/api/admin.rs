//! Administration endpoints

use axum::extract::State;

use crate::{
    models::{
        email_code::{EmailCodeList, EmailCodeQuery, EmailCodeStats},
        user::{SetRoleRequest, UserInfo},
    },
    AppState,
};

use super::{success, ApiJson, ApiResult};

/// Issued verification codes, newest first
#[utoipa::path(
    post,
    path = "/admin/emailCodeList",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = EmailCodeQuery,
    responses(
        (status = 200, description = "Audit records", body = EmailCodeList),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse)
    )
)]
pub async fn email_code_list(
    State(state): State<AppState>,
    ApiJson(query): ApiJson<EmailCodeQuery>,
) -> ApiResult<EmailCodeList> {
    let list = state.services.admin.email_codes(&query).await?;
    Ok(success(list))
}

/// Verification code counters
#[utoipa::path(
    post,
    path = "/admin/emailCodeStats",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Counters", body = EmailCodeStats)
    )
)]
pub async fn email_code_stats(State(state): State<AppState>) -> ApiResult<EmailCodeStats> {
    let stats = state.services.admin.email_code_stats().await?;
    Ok(success(stats))
}

/// Persist a role on an account
#[utoipa::path(
    post,
    path = "/admin/userRole",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserInfo),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_user_role(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SetRoleRequest>,
) -> ApiResult<UserInfo> {
    let user = state
        .services
        .users
        .set_role(&request.email, request.role)
        .await?;
    Ok(success(user))
}
