//! Loan management service

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{IssueLoan, Loan, LoanDetails, NewLoan},
        user::{Role, StudentSummary},
    },
    repository::{BooksStore, LoansStore, UsersStore},
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days `as_of` is past `due_date`, never negative
pub fn overdue_days(due_date: DateTime<Utc>, as_of: DateTime<Utc>) -> i64 {
    let seconds = (as_of - due_date).num_seconds();
    if seconds <= 0 {
        0
    } else {
        seconds / SECONDS_PER_DAY
    }
}

/// Flat-rate fine for a loan due at `due_date`, evaluated at `as_of`
pub fn compute_fine(due_date: DateTime<Utc>, as_of: DateTime<Utc>, rate_per_day: i64) -> i64 {
    overdue_days(due_date, as_of) * rate_per_day
}

#[derive(Clone)]
pub struct LoansService {
    users: Arc<dyn UsersStore>,
    books: Arc<dyn BooksStore>,
    loans: Arc<dyn LoansStore>,
    fine_per_day: i64,
}

impl LoansService {
    pub fn new(
        users: Arc<dyn UsersStore>,
        books: Arc<dyn BooksStore>,
        loans: Arc<dyn LoansStore>,
        fine_per_day: i64,
    ) -> Self {
        Self { users, books, loans, fine_per_day }
    }

    /// Fine for a loan due at `due_date`, as of `as_of` (now when omitted)
    pub fn fine(&self, due_date: DateTime<Utc>, as_of: Option<DateTime<Utc>>) -> i64 {
        compute_fine(due_date, as_of.unwrap_or_else(Utc::now), self.fine_per_day)
    }

    /// Closed loans are evaluated at their return date, open ones at `now`
    fn details(&self, loan: Loan, student: Option<StudentSummary>, now: DateTime<Utc>) -> LoanDetails {
        let as_of = loan.return_date.unwrap_or(now);
        LoanDetails {
            overdue_days: overdue_days(loan.due_date, as_of),
            fine: compute_fine(loan.due_date, as_of, self.fine_per_day),
            loan,
            student,
        }
    }

    /// Issue a book to a student
    pub async fn issue(&self, request: IssueLoan) -> AppResult<Loan> {
        let student = self.users.get_by_id(request.student_id).await?;
        if student.role != Role::Student {
            return Err(AppError::Validation(format!(
                "User {} is not a student",
                request.student_id
            )));
        }

        let book = self
            .books
            .get_by_bid(request.bid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with bid {} not found", request.bid)))?;

        // Early check; the storage layer still rejects a racing second issue
        if self.loans.has_active_loan(book.bid).await? {
            return Err(AppError::Conflict(format!("Book {} is already issued", book.bid)));
        }

        let loan = self
            .loans
            .open(&NewLoan {
                student_id: student.id,
                bid: book.bid,
                title: book.title,
                issue_date: Utc::now(),
                due_date: request.due_date,
            })
            .await?;

        tracing::info!(
            loan_id = loan.id,
            bid = loan.bid,
            student_id = loan.student_id,
            "Book issued"
        );

        Ok(loan)
    }

    /// Return a loan. A return date before the issue date is accepted as given.
    pub async fn return_loan(
        &self,
        loan_id: i32,
        return_date: Option<DateTime<Utc>>,
    ) -> AppResult<LoanDetails> {
        let loan = self.loans.get_by_id(loan_id).await?;
        if !loan.is_active() {
            return Err(AppError::Conflict(format!("Loan {} already returned", loan_id)));
        }

        let now = Utc::now();
        let closed = self.loans.close(loan_id, return_date.unwrap_or(now)).await?;
        let student = self.student_summary(closed.student_id).await?;
        let details = self.details(closed, student, now);

        tracing::info!(
            loan_id = details.loan.id,
            bid = details.loan.bid,
            fine = details.fine,
            "Book returned"
        );

        Ok(details)
    }

    /// All active loans with their borrower
    pub async fn list_active(&self) -> AppResult<Vec<LoanDetails>> {
        self.active_loans(None).await
    }

    /// Active loans already past their due date
    pub async fn list_overdue(&self) -> AppResult<Vec<LoanDetails>> {
        self.active_loans(Some(Utc::now())).await
    }

    async fn active_loans(&self, due_before: Option<DateTime<Utc>>) -> AppResult<Vec<LoanDetails>> {
        let now = Utc::now();
        let rows = self.loans.list_active(due_before).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let (loan, student) = row.into_parts();
                self.details(loan, Some(student), now)
            })
            .collect())
    }

    /// Loan history, optionally for a single student
    pub async fn list(&self, student_id: Option<i32>) -> AppResult<Vec<LoanDetails>> {
        if let Some(id) = student_id {
            // Unknown student ids are reported rather than answered with an empty list
            self.users.get_by_id(id).await?;
        }

        let now = Utc::now();
        let loans = self.loans.list(student_id).await?;
        Ok(loans
            .into_iter()
            .map(|loan| self.details(loan, None, now))
            .collect())
    }

    /// Get a single loan with its borrower
    pub async fn get(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let loan = self.loans.get_by_id(loan_id).await?;
        let student = self.student_summary(loan.student_id).await?;
        Ok(self.details(loan, student, Utc::now()))
    }

    async fn student_summary(&self, user_id: i32) -> AppResult<Option<StudentSummary>> {
        match self.users.get_by_id(user_id).await {
            Ok(user) => Ok(Some(StudentSummary::from(&user))),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
