//! User model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::email_code::CodePurpose;
use super::text_enum;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Persisted user role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

text_enum!(UserRole {
    User => "user",
    Admin => "admin",
});

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Normal,
    Disabled,
}

text_enum!(UserStatus {
    Normal => "normal",
    Disabled => "disabled",
});

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub register_time: DateTime<Utc>,
}

/// Public view of a user account
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub role: UserRole,
    pub register_time: DateTime<Utc>,
    pub status: UserStatus,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            register_time: user.register_time,
            status: user.status,
        }
    }
}

/// Registration request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// Verification code issued for the `register` purpose
    pub code: String,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Verification code request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendEmailCodeRequest {
    pub email: String,
    pub action: CodePurpose,
}

/// Password recovery request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

/// Change own password request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

/// Admin role change request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub email: String,
    pub role: UserRole,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let mut validation = Validation::default();
        validation.leeway = 0;
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )?;
        Ok(token_data.claims)
    }
}
