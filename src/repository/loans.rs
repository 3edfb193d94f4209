//! Loans repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanStudentRow, NewLoan},
};

use super::LoansStore;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoansStore for LoansRepository {
    /// Get loan by ID
    async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn has_active_loan(&self, bid: i32) -> AppResult<bool> {
        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE bid = $1 AND return_date IS NULL)",
        )
        .bind(bid)
        .fetch_one(&self.pool)
        .await?;
        Ok(active)
    }

    async fn open(&self, loan: &NewLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        // loans_active_bid_key rejects a second active loan for the same bid
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (student_id, bid, title, issue_date, due_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(loan.student_id)
        .bind(loan.bid)
        .bind(&loan.title)
        .bind(loan.issue_date)
        .bind(loan.due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::unique_violation(e, format!("Book {} is already issued", loan.bid)))?;

        let marked = sqlx::query("UPDATE books SET status = 'issued', updated_at = NOW() WHERE bid = $1")
            .bind(loan.bid)
            .execute(&mut *tx)
            .await?;

        // The book was deleted or renumbered since it was looked up; dropping
        // the transaction rolls the insert back
        if marked.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with bid {} not found", loan.bid)));
        }

        tx.commit().await?;

        Ok(created)
    }

    async fn close(&self, id: i32, return_date: DateTime<Utc>) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET return_date = $2
            WHERE id = $1 AND return_date IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(return_date)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("Loan {} already returned", id)))?;

        // The book may have been deleted meanwhile; nothing to free then
        sqlx::query("UPDATE books SET status = 'available', updated_at = NOW() WHERE bid = $1")
            .bind(closed.bid)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(closed)
    }

    async fn list_active(&self, due_before: Option<DateTime<Utc>>) -> AppResult<Vec<LoanStudentRow>> {
        let loans = sqlx::query_as::<_, LoanStudentRow>(
            r#"
            SELECT l.id, l.student_id, l.bid, l.title, l.issue_date, l.due_date, l.return_date,
                   u.name AS student_name, u.email AS student_email,
                   u.student_id AS student_number
            FROM loans l
            JOIN users u ON u.id = l.student_id
            WHERE l.return_date IS NULL
              AND ($1::timestamptz IS NULL OR l.due_date < $1)
            ORDER BY l.due_date, l.id
            "#,
        )
        .bind(due_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn list(&self, student_id: Option<i32>) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE ($1::int IS NULL OR student_id = $1)
            ORDER BY issue_date DESC, id DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }
}
