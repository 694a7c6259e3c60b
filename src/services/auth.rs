//! Session token issuance and validation

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{User, UserClaims},
};

#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl_hours: u64,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            ttl_hours: config.jwt_expiration_hours,
        }
    }

    /// Sign a token carrying the user's id, email and current role
    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: now + (self.ttl_hours as i64 * 3600),
            iat: now,
        };

        claims
            .create_token(&self.secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Verify signature and expiry with no clock leeway
    pub fn validate(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.secret).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })
    }
}
