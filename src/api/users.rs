//! Account endpoints

use axum::extract::State;

use crate::{
    models::user::{
        ChangePasswordRequest, ForgetPasswordRequest, LoginRequest, RegisterRequest,
        SendEmailCodeRequest, UserInfo,
    },
    services::users::{LoginResponse, ProfileResponse},
    AppState,
};

use super::{success, ApiJson, ApiResult, AuthenticatedUser};

/// Create an account with a `register` verification code
#[utoipa::path(
    post,
    path = "/user/register",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = UserInfo),
        (status = 400, description = "Invalid email, password or code", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<UserInfo> {
    let user = state.services.users.register(&request).await?;
    Ok(success(user))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/user/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse),
        (status = 403, description = "Account disabled", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = state.services.users.login(&request).await?;
    Ok(success(response))
}

/// Email a verification code
#[utoipa::path(
    post,
    path = "/user/sendEmailCode",
    tag = "users",
    request_body = SendEmailCodeRequest,
    responses(
        (status = 200, description = "Code issued"),
        (status = 404, description = "Email not registered (forget)", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered (register)", body = crate::error::ErrorResponse),
        (status = 429, description = "Requested again within the cooldown", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_email_code(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SendEmailCodeRequest>,
) -> ApiResult<()> {
    state.services.users.send_code(&request).await?;
    Ok(success(()))
}

/// Reset a forgotten password
#[utoipa::path(
    post,
    path = "/user/forgetPassword",
    tag = "users",
    request_body = ForgetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Invalid password or code", body = crate::error::ErrorResponse),
        (status = 404, description = "Email not registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn forget_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ForgetPasswordRequest>,
) -> ApiResult<()> {
    state.services.users.forget_password(&request).await?;
    Ok(success(()))
}

/// Current account and open borrow count
#[utoipa::path(
    post,
    path = "/user/profile",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn profile(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> ApiResult<ProfileResponse> {
    let profile = state.services.users.profile(claims.user_id).await?;
    Ok(success(profile))
}

/// Change own password
#[utoipa::path(
    post,
    path = "/user/changePassword",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Old password is wrong", body = crate::error::ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> ApiResult<()> {
    state
        .services
        .users
        .change_password(claims.user_id, &request)
        .await?;
    Ok(success(()))
}
