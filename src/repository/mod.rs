//! Repository layer for database operations
//!
//! Each aggregate has a store trait so services can be exercised against
//! mocks; the Postgres implementations live in the submodules.

pub mod books;
pub mod loans;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        loan::{Loan, LoanStudentRow, NewLoan},
        user::{NewUser, User},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersStore: Send + Sync {
    /// NotFound when absent
    async fn get_by_id(&self, id: i32) -> AppResult<User>;
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn email_exists(&self, email: &str) -> AppResult<bool>;
    async fn student_id_exists(&self, student_id: &str) -> AppResult<bool>;
    /// Conflict when the email or student id is already taken
    async fn create(&self, user: &NewUser) -> AppResult<User>;
    async fn list_students(&self) -> AppResult<Vec<User>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BooksStore: Send + Sync {
    async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>>;
    /// NotFound when absent
    async fn get_by_id(&self, id: i32) -> AppResult<Book>;
    async fn get_by_bid(&self, bid: i32) -> AppResult<Option<Book>>;
    async fn bid_exists(&self, bid: i32, exclude_id: Option<i32>) -> AppResult<bool>;
    /// Conflict when the bid is already used or still held by an active loan
    async fn create(&self, book: &CreateBook) -> AppResult<Book>;
    /// Conflict when a bid change touches a bid held by an active loan
    async fn update(&self, id: i32, book: &UpdateBook) -> AppResult<Book>;
    /// NotFound when absent
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansStore: Send + Sync {
    /// NotFound when absent
    async fn get_by_id(&self, id: i32) -> AppResult<Loan>;
    async fn has_active_loan(&self, bid: i32) -> AppResult<bool>;
    /// Inserts the loan and marks the book issued in one transaction.
    /// Conflict when another active loan holds the bid, NotFound when no
    /// book carries it any more.
    async fn open(&self, loan: &NewLoan) -> AppResult<Loan>;
    /// Sets the return date and marks the book available in one transaction.
    /// Conflict when the loan was already closed.
    async fn close(&self, id: i32, return_date: DateTime<Utc>) -> AppResult<Loan>;
    /// Active loans with their borrower, optionally only those due before a date
    async fn list_active(&self, due_before: Option<DateTime<Utc>>) -> AppResult<Vec<LoanStudentRow>>;
    /// Full history, newest first
    async fn list(&self, student_id: Option<i32>) -> AppResult<Vec<Loan>>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }
}
