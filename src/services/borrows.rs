//! Borrow and return service

use std::sync::Arc;

use chrono::Utc;

use crate::{
    error::AppResult,
    models::{
        borrow::{AllRecordsQuery, BorrowRecordDetails, BorrowResponse, RecordsQuery, ReturnResponse},
        PageRequest, PaginatedResponse,
    },
    repository::Repository,
    services::ledger::{BorrowLedger, LoanPolicy},
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    ledger: Arc<dyn BorrowLedger>,
    policy: LoanPolicy,
}

impl BorrowsService {
    pub fn new(repository: Repository, ledger: Arc<dyn BorrowLedger>, policy: LoanPolicy) -> Self {
        Self {
            repository,
            ledger,
            policy,
        }
    }

    /// Borrow one copy of a book
    pub async fn borrow(&self, user_id: i64, book_id: i64) -> AppResult<BorrowResponse> {
        let record = self
            .ledger
            .borrow(user_id, book_id, &self.policy, Utc::now())
            .await?;

        tracing::info!(
            "User {} borrowed book {} (record {}, due {})",
            user_id,
            book_id,
            record.id,
            record.due_date
        );

        Ok(BorrowResponse {
            record_id: record.id,
            borrow_date: record.borrow_date,
            due_date: record.due_date,
        })
    }

    /// Return the caller's open copy of a book
    pub async fn return_book(&self, user_id: i64, book_id: i64) -> AppResult<ReturnResponse> {
        let now = Utc::now();
        let record = self.ledger.return_book(user_id, book_id, now).await?;

        tracing::info!("User {} returned book {} (record {})", user_id, book_id, record.id);

        Ok(ReturnResponse {
            record_id: record.id,
            return_date: record.return_date.unwrap_or(now),
        })
    }

    /// Caller's own records
    pub async fn records(
        &self,
        user_id: i64,
        query: &RecordsQuery,
    ) -> AppResult<PaginatedResponse<BorrowRecordDetails>> {
        let page = PageRequest::new(query.page, query.limit);
        let (records, total) = self
            .repository
            .borrows
            .list_for_user(user_id, query, page)
            .await?;
        Ok(PaginatedResponse::new(records, total, page))
    }

    /// Every record (admin)
    pub async fn all_records(
        &self,
        query: &AllRecordsQuery,
    ) -> AppResult<PaginatedResponse<BorrowRecordDetails>> {
        let page = PageRequest::new(query.page, query.limit);
        let (records, total) = self.repository.borrows.list_all(query, page).await?;
        Ok(PaginatedResponse::new(records, total, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, repository::memory::MemoryLedger};
    use sqlx::postgres::PgPoolOptions;

    fn service(ledger: Arc<MemoryLedger>) -> BorrowsService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        BorrowsService::new(Repository::new(pool), ledger, LoanPolicy::default())
    }

    #[tokio::test]
    async fn test_borrow_then_return_round_trip() {
        let ledger = Arc::new(MemoryLedger::default());
        ledger.add_book(1, 3).await;
        let service = service(ledger.clone());

        let borrowed = service.borrow(10, 1).await.unwrap();
        assert_eq!(borrowed.due_date - borrowed.borrow_date, chrono::Duration::days(30));
        assert_eq!(ledger.book(1).await.unwrap().available_quantity, 2);

        let returned = service.return_book(10, 1).await.unwrap();
        assert_eq!(returned.record_id, borrowed.record_id);
        assert_eq!(ledger.book(1).await.unwrap().available_quantity, 3);

        let err = service.return_book(10, 1).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyReturned));
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_book_are_reported() {
        let ledger = Arc::new(MemoryLedger::default());
        ledger.add_book(1, 3).await;
        let service = service(ledger);

        service.borrow(10, 1).await.unwrap();
        assert!(matches!(service.borrow(10, 1).await, Err(AppError::DuplicateBorrow)));
        assert!(matches!(service.borrow(10, 99).await, Err(AppError::BookNotFound(99))));
        assert!(matches!(service.return_book(11, 1).await, Err(AppError::NoActiveBorrow)));
    }
}
