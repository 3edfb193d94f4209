//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

use super::BooksStore;

const DUPLICATE_BID: &str = "A book with this bid already exists";

/// `ILIKE` pattern matching `term` anywhere, with its wildcards taken literally
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksStore for BooksRepository {
    /// List books ordered by catalog number
    async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let search = query.q.as_deref().map(contains_pattern);

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::text IS NULL OR title ILIKE $3 ESCAPE '\' OR author ILIKE $3 ESCAPE '\')
            ORDER BY bid
            "#,
        )
        .bind(query.status.map(|s| s.as_str()))
        .bind(&query.category)
        .bind(search)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Get book by database ID
    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Get book by catalog number
    async fn get_by_bid(&self, bid: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE bid = $1")
            .bind(bid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(book)
    }

    async fn bid_exists(&self, bid: i32, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE bid = $1 AND id != $2)")
                .bind(bid)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE bid = $1)")
                .bind(bid)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        // A bid still held by an active loan is refused here as well as in the service
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (bid, title, author, category, status)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM loans WHERE bid = $1 AND return_date IS NULL)
            RETURNING *
            "#,
        )
        .bind(book.bid)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.category)
        .bind(book.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::unique_violation(e, DUPLICATE_BID))?
        .ok_or_else(|| {
            AppError::Conflict(format!("Bid {} is still held by an active loan", book.bid))
        })
    }

    /// A bid change only applies while neither the old nor the new bid is on
    /// loan. `status` is re-read on the locked row, so an issue committed after
    /// the caller's read still blocks the change.
    async fn update(&self, id: i32, book: &UpdateBook) -> AppResult<Book> {
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                bid = COALESCE($2, bid),
                title = COALESCE($3, title),
                author = COALESCE($4, author),
                category = COALESCE($5, category),
                updated_at = NOW()
            WHERE id = $1
              AND ($2::int IS NULL OR $2 = bid OR (
                    status = 'available'
                    AND NOT EXISTS (SELECT 1 FROM loans l
                                    WHERE l.bid = books.bid AND l.return_date IS NULL)
                    AND NOT EXISTS (SELECT 1 FROM loans l
                                    WHERE l.bid = $2 AND l.return_date IS NULL)))
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(book.bid)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.category)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::unique_violation(e, DUPLICATE_BID))?;

        if let Some(updated) = updated {
            return Ok(updated);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Err(AppError::Conflict(format!(
                "Book with id {} is on loan, its bid cannot change",
                id
            )))
        } else {
            Err(AppError::NotFound(format!("Book with id {} not found", id)))
        }
    }

    /// Delete a book. Loans referencing its bid are left untouched.
    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        Ok(())
    }
}
