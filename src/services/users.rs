//! Account registration, login and password management

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use validator::ValidateEmail;

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{
            ChangePasswordRequest, ForgetPasswordRequest, LoginRequest, RegisterRequest,
            SendEmailCodeRequest, UserInfo, MIN_PASSWORD_LEN,
        },
        CodePurpose, User, UserRole, UserStatus,
    },
    repository::Repository,
    services::{auth::TokenService, codes::VerificationCodeStore, email::EmailService},
};

/// Successful login
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user_info: UserInfo,
    pub token: String,
}

/// Own profile
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user_info: UserInfo,
    pub current_borrow_count: i64,
}

/// Trimmed email, rejected unless well formed
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim();
    if !email.validate_email() {
        return Err(AppError::InvalidEmail);
    }
    Ok(email.to_string())
}

/// Length and confirmation checks shared by every password change
pub fn check_new_password(password: &str, confirmation: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    if password != confirmation {
        return Err(AppError::PasswordMismatch);
    }
    Ok(())
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    tokens: TokenService,
    codes: Arc<VerificationCodeStore>,
    email: EmailService,
}

impl UsersService {
    pub fn new(
        repository: Repository,
        tokens: TokenService,
        codes: Arc<VerificationCodeStore>,
        email: EmailService,
    ) -> Self {
        Self {
            repository,
            tokens,
            codes,
            email,
        }
    }

    /// Create an account after consuming a `register` code
    pub async fn register(&self, request: &RegisterRequest) -> AppResult<UserInfo> {
        let email = normalize_email(&request.email)?;
        check_new_password(&request.password, &request.confirm_password)?;

        if self.repository.users.email_exists(&email).await? {
            return Err(AppError::EmailTaken);
        }

        self.codes
            .verify(&email, CodePurpose::Register, &request.code)
            .await?;

        let hash = hash_password(&request.password)?;
        let user = self.repository.users.create(&email, &hash, Utc::now()).await?;

        tracing::info!("Registered user {} ({})", user.id, user.email);
        Ok(UserInfo::from(&user))
    }

    /// Check credentials and issue a token
    pub async fn login(&self, request: &LoginRequest) -> AppResult<LoginResponse> {
        let user = self
            .repository
            .users
            .get_by_email(&request.email)
            .await?
            .ok_or(AppError::BadCredentials)?;

        if !verify_password(&user, &request.password)? {
            return Err(AppError::BadCredentials);
        }
        if user.status == UserStatus::Disabled {
            return Err(AppError::AccountDisabled);
        }

        let token = self.tokens.issue(&user)?;
        tracing::debug!("User {} logged in", user.id);

        Ok(LoginResponse {
            user_info: UserInfo::from(&user),
            token,
        })
    }

    /// Issue a code for the requested purpose and mail it in the background
    pub async fn send_code(&self, request: &SendEmailCodeRequest) -> AppResult<()> {
        let email = normalize_email(&request.email)?;
        let registered = self.repository.users.email_exists(&email).await?;

        match request.action {
            CodePurpose::Register if registered => return Err(AppError::EmailTaken),
            CodePurpose::Forget if !registered => return Err(AppError::EmailNotRegistered),
            _ => {}
        }

        let code = self.codes.issue(&email, request.action).await?;
        tracing::info!("Issued {} code for {}", request.action, email);

        self.email.dispatch_code(email, code, request.action);
        Ok(())
    }

    /// Reset a password with a `forget` code
    pub async fn forget_password(&self, request: &ForgetPasswordRequest) -> AppResult<()> {
        let email = normalize_email(&request.email)?;
        check_new_password(&request.new_password, &request.confirm_new_password)?;

        let user = self
            .repository
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AppError::EmailNotRegistered)?;

        self.codes
            .verify(&email, CodePurpose::Forget, &request.code)
            .await?;

        let hash = hash_password(&request.new_password)?;
        self.repository.users.update_password(user.id, &hash).await?;

        tracing::info!("Password reset for user {}", user.id);
        Ok(())
    }

    /// Account details plus the number of open borrows
    pub async fn profile(&self, user_id: i64) -> AppResult<ProfileResponse> {
        let user = self.repository.users.get_by_id(user_id).await?;
        let current_borrow_count = self.repository.borrows.count_active(user_id).await?;

        Ok(ProfileResponse {
            user_info: UserInfo::from(&user),
            current_borrow_count,
        })
    }

    pub async fn change_password(&self, user_id: i64, request: &ChangePasswordRequest) -> AppResult<()> {
        check_new_password(&request.new_password, &request.confirm_new_password)?;

        let user = self.repository.users.get_by_id(user_id).await?;
        if !verify_password(&user, &request.old_password)? {
            return Err(AppError::BadCredentials);
        }

        let hash = hash_password(&request.new_password)?;
        self.repository.users.update_password(user.id, &hash).await?;

        tracing::info!("Password changed for user {}", user.id);
        Ok(())
    }

    /// Persist a role for an account (admin)
    pub async fn set_role(&self, email: &str, role: UserRole) -> AppResult<UserInfo> {
        let email = normalize_email(email)?;
        let user = self.repository.users.set_role(&email, role).await?;

        tracing::info!("Role of user {} set to {}", user.id, role);
        Ok(UserInfo::from(&user))
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
