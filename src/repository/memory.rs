//! In-memory [`BorrowLedger`] used by tests.
//!
//! A single async mutex stands in for the row locks of the PostgreSQL
//! adapter; the rules come from the same [`LoanPolicy`] and [`restock`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{book::UpdateBook, Book, BorrowRecord, BorrowStatus},
    services::ledger::{restock, BorrowLedger, BorrowSnapshot, LoanPolicy},
};

#[derive(Default)]
struct LedgerState {
    books: HashMap<i64, Book>,
    records: Vec<BorrowRecord>,
}

impl LedgerState {
    fn open_for_user(&self, user_id: i64) -> i64 {
        self.records
            .iter()
            .filter(|r| r.user_id == user_id && r.status == BorrowStatus::Borrowed)
            .count() as i64
    }

    fn open_for_book(&self, book_id: i64) -> i64 {
        self.records
            .iter()
            .filter(|r| r.book_id == book_id && r.status == BorrowStatus::Borrowed)
            .count() as i64
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub async fn add_book(&self, id: i64, total: i32) {
        let now = Utc::now();
        self.state.lock().await.books.insert(
            id,
            Book {
                id,
                title: format!("Book {}", id),
                author: "Anonymous".to_string(),
                isbn: format!("978000000{:04}", id),
                category: "general".to_string(),
                total_quantity: total,
                available_quantity: total,
                description: String::new(),
                cover_image_url: None,
                create_time: now,
                update_time: now,
            },
        );
    }

    pub async fn book(&self, id: i64) -> Option<Book> {
        self.state.lock().await.books.get(&id).cloned()
    }

    /// Drop the book row without touching its records
    pub async fn remove_book(&self, id: i64) {
        self.state.lock().await.books.remove(&id);
    }

    pub async fn open_records(&self) -> i64 {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .filter(|r| r.status == BorrowStatus::Borrowed)
            .count() as i64
    }
}

#[async_trait]
impl BorrowLedger for MemoryLedger {
    async fn borrow(
        &self,
        user_id: i64,
        book_id: i64,
        policy: &LoanPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let mut state = self.state.lock().await;

        let snapshot = BorrowSnapshot {
            available_quantity: state.books.get(&book_id).map(|b| b.available_quantity),
            active_borrows: state.open_for_user(user_id),
            already_borrowed: state.records.iter().any(|r| {
                r.user_id == user_id && r.book_id == book_id && r.status == BorrowStatus::Borrowed
            }),
        };
        policy.check_borrow(book_id, &snapshot)?;

        let record = BorrowRecord {
            id: state.records.len() as i64 + 1,
            user_id,
            book_id,
            borrow_date: now,
            due_date: policy.due_date(now),
            return_date: None,
            status: BorrowStatus::Borrowed,
        };
        if let Some(book) = state.books.get_mut(&book_id) {
            book.available_quantity -= 1;
        }
        state.records.push(record.clone());
        Ok(record)
    }

    async fn return_book(
        &self,
        user_id: i64,
        book_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let mut state = self.state.lock().await;

        if !state.books.contains_key(&book_id) {
            return Err(AppError::BookNotFound(book_id));
        }

        let open = state.records.iter_mut().find(|r| {
            r.user_id == user_id && r.book_id == book_id && r.status == BorrowStatus::Borrowed
        });
        let record = match open {
            Some(record) => {
                record.status = BorrowStatus::Returned;
                record.return_date = Some(now);
                record.clone()
            }
            None => {
                let returned = state
                    .records
                    .iter()
                    .any(|r| r.user_id == user_id && r.book_id == book_id);
                return Err(if returned {
                    AppError::AlreadyReturned
                } else {
                    AppError::NoActiveBorrow
                });
            }
        };

        if let Some(book) = state.books.get_mut(&book_id) {
            book.available_quantity += 1;
        }
        Ok(record)
    }

    async fn update_book(&self, update: &UpdateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        let borrowed = state.open_for_book(update.id);

        let mut book = state
            .books
            .get(&update.id)
            .cloned()
            .ok_or(AppError::BookNotFound(update.id))?;

        if let Some(isbn) = update.new_isbn(&book.isbn) {
            if state.books.values().any(|b| b.id != book.id && b.isbn == isbn) {
                return Err(AppError::DuplicateIsbn(isbn.to_string()));
            }
        }

        update.apply_to(&mut book);
        if let Some(total) = update.total_quantity {
            book.available_quantity = restock(total, borrowed)?;
            book.total_quantity = total;
        }
        book.update_time = now;

        state.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn delete_book(&self, book_id: i64) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.books.contains_key(&book_id) {
            return Err(AppError::BookNotFound(book_id));
        }
        if state.open_for_book(book_id) > 0 {
            return Err(AppError::BookInUse);
        }
        state.books.remove(&book_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_last_copy_goes_to_exactly_one_borrower() {
        let ledger = Arc::new(MemoryLedger::default());
        ledger.add_book(1, 1).await;
        let policy = LoanPolicy::default();

        let handles: Vec<_> = (1..=16)
            .map(|user_id| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.borrow(user_id, 1, &policy, Utc::now()).await })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => granted += 1,
                Err(e) => assert!(matches!(e, AppError::OutOfStock)),
            }
        }

        assert_eq!(granted, 1);
        assert_eq!(ledger.book(1).await.unwrap().available_quantity, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_returns_restore_full_stock() {
        let ledger = Arc::new(MemoryLedger::default());
        ledger.add_book(7, 3).await;
        let policy = LoanPolicy::default();
        let now = Utc::now();

        for user_id in 1..=3 {
            assert_ok!(ledger.borrow(user_id, 7, &policy, now).await);
        }
        let err = ledger.borrow(4, 7, &policy, now).await.unwrap_err();
        assert!(matches!(err, AppError::OutOfStock));

        let handles: Vec<_> = (1..=3)
            .map(|user_id| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.return_book(user_id, 7, Utc::now()).await })
            })
            .collect();
        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }

        let book = ledger.book(7).await.unwrap();
        assert_eq!(book.available_quantity, 3);
        assert_eq!(ledger.open_records().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_double_return_succeeds_once() {
        let ledger = Arc::new(MemoryLedger::default());
        ledger.add_book(2, 1).await;
        assert_ok!(ledger.borrow(5, 2, &LoanPolicy::default(), Utc::now()).await);

        let first = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.return_book(5, 2, Utc::now()).await }
        });
        let second = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.return_book(5, 2, Utc::now()).await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::AlreadyReturned))));
        assert_eq!(ledger.book(2).await.unwrap().available_quantity, 1);
    }

    #[tokio::test]
    async fn test_borrow_limit_applies_across_books() {
        let ledger = MemoryLedger::default();
        let policy = LoanPolicy::default();
        let now = Utc::now();
        for id in 1..=6 {
            ledger.add_book(id, 2).await;
        }
        for id in 1..=5 {
            assert_ok!(ledger.borrow(9, id, &policy, now).await);
        }

        let err = ledger.borrow(9, 6, &policy, now).await.unwrap_err();
        assert!(matches!(err, AppError::BorrowLimitExceeded(5)));
        assert_eq!(ledger.book(6).await.unwrap().available_quantity, 2);
    }

    #[tokio::test]
    async fn test_shrinking_below_borrowed_copies_is_rejected() {
        let ledger = MemoryLedger::default();
        let policy = LoanPolicy::default();
        let now = Utc::now();
        ledger.add_book(3, 4).await;
        assert_ok!(ledger.borrow(1, 3, &policy, now).await);
        assert_ok!(ledger.borrow(2, 3, &policy, now).await);

        let shrink = UpdateBook {
            id: 3,
            total_quantity: Some(1),
            ..Default::default()
        };
        let err = ledger.update_book(&shrink, now).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidQuantity { requested: 1, borrowed: 2 }));

        let book = ledger.book(3).await.unwrap();
        assert_eq!((book.total_quantity, book.available_quantity), (4, 2));

        let grow = UpdateBook {
            id: 3,
            total_quantity: Some(6),
            ..Default::default()
        };
        let book = ledger.update_book(&grow, now).await.unwrap();
        assert_eq!((book.total_quantity, book.available_quantity), (6, 4));
    }

    #[tokio::test]
    async fn test_return_of_missing_book_leaves_record_open() {
        let ledger = MemoryLedger::default();
        let now = Utc::now();
        ledger.add_book(8, 1).await;
        assert_ok!(ledger.borrow(1, 8, &LoanPolicy::default(), now).await);
        ledger.remove_book(8).await;

        let err = ledger.return_book(1, 8, now).await.unwrap_err();
        assert!(matches!(err, AppError::BookNotFound(8)));
        assert_eq!(ledger.open_records().await, 1);
    }

    #[tokio::test]
    async fn test_book_with_open_borrows_cannot_be_deleted() {
        let ledger = MemoryLedger::default();
        let now = Utc::now();
        ledger.add_book(4, 1).await;
        assert_ok!(ledger.borrow(1, 4, &LoanPolicy::default(), now).await);

        assert!(matches!(ledger.delete_book(4).await, Err(AppError::BookInUse)));

        assert_ok!(ledger.return_book(1, 4, now).await);
        assert_ok!(ledger.delete_book(4).await);
        assert!(ledger.book(4).await.is_none());
    }
}
