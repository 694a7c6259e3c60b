//! Business logic services

pub mod admin;
pub mod auth;
pub mod borrows;
pub mod catalog;
pub mod codes;
pub mod email;
pub mod ledger;
pub mod storage;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub tokens: auth::TokenService,
    pub admins: admin::AdminResolver,
    pub admin: admin::AdminService,
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowsService,
    pub codes: Arc<codes::VerificationCodeStore>,
}

impl Services {
    /// Wire every service over the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let mailer = email::build_mailer(&config.email)?;
        let email = email::EmailService::new(mailer, config.codes.ttl_minutes);

        let codes = Arc::new(codes::VerificationCodeStore::new(
            Arc::new(repository.email_codes.clone()),
            codes::CodePolicy::from(&config.codes),
        ));

        let ledger: Arc<dyn ledger::BorrowLedger> = Arc::new(repository.borrows.clone());
        let storage: Arc<dyn storage::ObjectStore> =
            Arc::new(storage::S3Storage::new(config.storage.clone())?);
        let tokens = auth::TokenService::new(&config.auth);

        Ok(Self {
            admins: admin::AdminResolver::new(
                config.auth.clone(),
                Arc::new(repository.users.clone()),
            ),
            admin: admin::AdminService::new(repository.clone()),
            users: users::UsersService::new(repository.clone(), tokens.clone(), codes.clone(), email),
            catalog: catalog::CatalogService::new(repository.clone(), ledger.clone(), storage),
            borrows: borrows::BorrowsService::new(
                repository,
                ledger,
                ledger::LoanPolicy::from(&config.loans),
            ),
            tokens,
            codes,
        })
    }
}
