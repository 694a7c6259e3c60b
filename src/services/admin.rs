//! Admin privilege resolution.
//!
//! A request is admin when any source in the chain says so: the configured
//! allow-list, the role carried by the token, then the role persisted on the
//! account. The first definite answer wins.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        email_code::{EmailCodeList, EmailCodeQuery, EmailCodeStats},
        UserClaims, UserRole,
    },
    repository::Repository,
};

/// Answer of a single admin source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    /// No opinion; ask the next source
    Unknown,
}

#[async_trait]
pub trait AdminCheck: Send + Sync {
    async fn check(&self, claims: &UserClaims) -> AppResult<Decision>;
}

/// Persisted role lookup by email
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleLookup: Send + Sync {
    /// Role string stored for the account, `None` when it does not exist
    async fn role_of(&self, email: &str) -> AppResult<Option<String>>;
}

/// Configured allow-list of admin emails
pub struct AllowList {
    config: AuthConfig,
}

#[async_trait]
impl AdminCheck for AllowList {
    async fn check(&self, claims: &UserClaims) -> AppResult<Decision> {
        Ok(if self.config.is_admin_email(&claims.email) {
            Decision::Allow
        } else {
            Decision::Unknown
        })
    }
}

/// Role embedded in the token at login time
pub struct TokenClaim;

#[async_trait]
impl AdminCheck for TokenClaim {
    async fn check(&self, claims: &UserClaims) -> AppResult<Decision> {
        Ok(if claims.role == UserRole::Admin {
            Decision::Allow
        } else {
            Decision::Unknown
        })
    }
}

/// Role currently stored on the account
pub struct PersistedRole {
    lookup: Arc<dyn RoleLookup>,
}

#[async_trait]
impl AdminCheck for PersistedRole {
    async fn check(&self, claims: &UserClaims) -> AppResult<Decision> {
        let role = self.lookup.role_of(&claims.email).await?;
        Ok(match role {
            Some(role) if role.trim().eq_ignore_ascii_case(UserRole::Admin.as_str()) => {
                Decision::Allow
            }
            _ => Decision::Deny,
        })
    }
}

#[derive(Clone)]
pub struct AdminResolver {
    chain: Arc<Vec<Box<dyn AdminCheck>>>,
}

impl AdminResolver {
    pub fn new(config: AuthConfig, lookup: Arc<dyn RoleLookup>) -> Self {
        Self::with_chain(vec![
            Box::new(AllowList { config }),
            Box::new(TokenClaim),
            Box::new(PersistedRole { lookup }),
        ])
    }

    pub fn with_chain(chain: Vec<Box<dyn AdminCheck>>) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }

    pub async fn is_admin(&self, claims: &UserClaims) -> AppResult<bool> {
        for source in self.chain.iter() {
            match source.check(claims).await? {
                Decision::Allow => return Ok(true),
                Decision::Deny => return Ok(false),
                Decision::Unknown => {}
            }
        }
        Ok(false)
    }
}

/// Verification code audit views
#[derive(Clone)]
pub struct AdminService {
    repository: Repository,
}

impl AdminService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn email_codes(&self, query: &EmailCodeQuery) -> AppResult<EmailCodeList> {
        query
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let (list, total) = self.repository.email_codes.list(query).await?;
        Ok(EmailCodeList { total, list })
    }

    pub async fn email_code_stats(&self) -> AppResult<EmailCodeStats> {
        self.repository.email_codes.stats(Utc::now()).await
    }
}
