//! Book catalog service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, BookStatus, CreateBook, UpdateBook},
    repository::{BooksStore, LoansStore},
};

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BooksStore>,
    loans: Arc<dyn LoansStore>,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BooksStore>, loans: Arc<dyn LoansStore>) -> Self {
        Self { books, loans }
    }

    /// A bid still held by an active loan cannot be given to a catalog entry,
    /// since that entry would show as available while the copy is out.
    async fn ensure_bid_not_on_loan(&self, bid: i32) -> AppResult<()> {
        if self.loans.has_active_loan(bid).await? {
            return Err(AppError::Conflict(format!(
                "Bid {} is still held by an active loan; return it first",
                bid
            )));
        }
        Ok(())
    }

    /// List books with optional filters
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.books.list(query).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.books.get_by_id(id).await
    }

    /// Add a book to the catalog
    pub async fn add_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;

        // Only a loan may put a book in the issued state
        if book.status == BookStatus::Issued {
            return Err(AppError::Validation(
                "New books must be available; issue a loan to mark a book issued".to_string(),
            ));
        }

        if self.books.bid_exists(book.bid, None).await? {
            return Err(AppError::Conflict(format!("A book with bid {} already exists", book.bid)));
        }
        self.ensure_bid_not_on_loan(book.bid).await?;

        let created = self.books.create(&book).await?;
        tracing::info!(book_id = created.id, bid = created.bid, "Book added");
        Ok(created)
    }

    /// Update an existing book
    pub async fn update_book(&self, id: i32, book: UpdateBook) -> AppResult<Book> {
        book.validate()?;

        let existing = self.books.get_by_id(id).await?;

        if let Some(bid) = book.bid.filter(|bid| *bid != existing.bid) {
            if existing.status == BookStatus::Issued {
                return Err(AppError::Conflict(format!(
                    "Book {} is on loan, its bid cannot change",
                    existing.bid
                )));
            }
            if self.books.bid_exists(bid, Some(id)).await? {
                return Err(AppError::Conflict(format!("A book with bid {} already exists", bid)));
            }
            self.ensure_bid_not_on_loan(bid).await?;
        }

        // The store re-checks the loan state atomically with the write
        let updated = self.books.update(id, &book).await?;
        tracing::info!(book_id = updated.id, bid = updated.bid, "Book updated");
        Ok(updated)
    }

    /// Delete a book. Active loans on it are not checked.
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MockBooksStore, MockLoansStore};
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;

    fn book(id: i32, bid: i32, status: BookStatus) -> Book {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Book {
            id,
            bid,
            title: "The Left Hand of Darkness".to_string(),
            author: "Ursula K. Le Guin".to_string(),
            category: "Fiction".to_string(),
            status,
            created_at: at,
            updated_at: at,
        }
    }

    fn no_active_loans() -> MockLoansStore {
        let mut loans = MockLoansStore::new();
        loans.expect_has_active_loan().returning(|_| Ok(false));
        loans
    }

    fn service(books: MockBooksStore) -> CatalogService {
        CatalogService::new(Arc::new(books), Arc::new(no_active_loans()))
    }

    fn create_request(bid: i32) -> CreateBook {
        CreateBook {
            bid,
            title: "The Left Hand of Darkness".to_string(),
            author: "Ursula K. Le Guin".to_string(),
            category: "Fiction".to_string(),
            status: BookStatus::Available,
        }
    }

    #[tokio::test]
    async fn test_add_book() {
        let mut books = MockBooksStore::new();
        books.expect_bid_exists().with(eq(16), eq(None)).returning(|_, _| Ok(false));
        books
            .expect_create()
            .times(1)
            .returning(|b| Ok(book(1, b.bid, b.status)));

        let created = service(books)
            .add_book(create_request(16))
            .await
            .unwrap();

        assert_eq!(created.bid, 16);
        assert_eq!(created.status, BookStatus::Available);
    }

    #[tokio::test]
    async fn test_add_duplicate_bid_conflicts() {
        let mut books = MockBooksStore::new();
        books.expect_bid_exists().returning(|_, _| Ok(true));
        books.expect_create().never();

        let result = service(books).add_book(create_request(16)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_add_issued_book_rejected() {
        let mut books = MockBooksStore::new();
        books.expect_create().never();

        let mut request = create_request(16);
        request.status = BookStatus::Issued;
        let result = service(books).add_book(request).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_bid_collision_conflicts() {
        let mut books = MockBooksStore::new();
        books
            .expect_get_by_id()
            .returning(|id| Ok(book(id, 16, BookStatus::Available)));
        books
            .expect_bid_exists()
            .with(eq(17), eq(Some(1)))
            .returning(|_, _| Ok(true));
        books.expect_update().never();

        let update = UpdateBook { bid: Some(17), ..Default::default() };
        let result = service(books).update_book(1, update).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_same_bid_skips_collision_check() {
        let mut books = MockBooksStore::new();
        books
            .expect_get_by_id()
            .returning(|id| Ok(book(id, 16, BookStatus::Issued)));
        books.expect_bid_exists().never();
        books.expect_update().times(1).returning(|id, b| {
            let mut updated = book(id, 16, BookStatus::Issued);
            if let Some(title) = &b.title {
                updated.title = title.clone();
            }
            Ok(updated)
        });

        let update = UpdateBook {
            bid: Some(16),
            title: Some("The Dispossessed".to_string()),
            ..Default::default()
        };
        let updated = service(books)
            .update_book(1, update)
            .await
            .unwrap();
        assert_eq!(updated.title, "The Dispossessed");
    }

    #[tokio::test]
    async fn test_update_bid_of_issued_book_conflicts() {
        let mut books = MockBooksStore::new();
        books
            .expect_get_by_id()
            .returning(|id| Ok(book(id, 16, BookStatus::Issued)));
        books.expect_update().never();

        let update = UpdateBook { bid: Some(18), ..Default::default() };
        let result = service(books).update_book(1, update).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_book_not_found() {
        let mut books = MockBooksStore::new();
        books
            .expect_get_by_id()
            .returning(|id| Err(AppError::NotFound(format!("Book with id {} not found", id))));
        books
            .expect_delete()
            .returning(|id| Err(AppError::NotFound(format!("Book with id {} not found", id))));

        let svc = service(books);
        let update = UpdateBook { title: Some("x".to_string()), ..Default::default() };
        assert!(matches!(svc.update_book(5, update).await, Err(AppError::NotFound(_))));
        assert!(matches!(svc.delete_book(5).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_get_books() {
        let mut books = MockBooksStore::new();
        books
            .expect_list()
            .withf(|q: &BookQuery| q.status == Some(BookStatus::Available))
            .returning(|_| Ok(vec![book(1, 16, BookStatus::Available)]));
        books
            .expect_get_by_id()
            .with(eq(2))
            .returning(|id| Err(AppError::NotFound(format!("Book with id {} not found", id))));

        let svc = service(books);
        let query = BookQuery {
            status: Some(BookStatus::Available),
            ..Default::default()
        };
        let listed = svc.list_books(&query).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].bid, 16);

        assert!(matches!(svc.get_book(2).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_re_adding_bid_of_deleted_book_on_loan_conflicts() {
        let mut books = MockBooksStore::new();
        books.expect_bid_exists().with(eq(16), eq(None)).returning(|_, _| Ok(false));
        books.expect_create().never();

        let mut loans = MockLoansStore::new();
        loans.expect_has_active_loan().with(eq(16)).returning(|_| Ok(true));

        let result = CatalogService::new(Arc::new(books), Arc::new(loans))
            .add_book(create_request(16))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_onto_bid_held_by_active_loan_conflicts() {
        let mut books = MockBooksStore::new();
        books
            .expect_get_by_id()
            .returning(|id| Ok(book(id, 17, BookStatus::Available)));
        books.expect_bid_exists().with(eq(16), eq(Some(1))).returning(|_, _| Ok(false));
        books.expect_update().never();

        let mut loans = MockLoansStore::new();
        loans.expect_has_active_loan().with(eq(16)).returning(|_| Ok(true));

        let update = UpdateBook { bid: Some(16), ..Default::default() };
        let result = CatalogService::new(Arc::new(books), Arc::new(loans))
            .update_book(1, update)
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_losing_race_with_issue_conflicts() {
        // Read as available, but a loan was opened before the write landed
        let mut books = MockBooksStore::new();
        books
            .expect_get_by_id()
            .returning(|id| Ok(book(id, 16, BookStatus::Available)));
        books.expect_bid_exists().returning(|_, _| Ok(false));
        books.expect_update().times(1).returning(|_, _| {
            Err(AppError::Conflict("Book 16 is on loan, its bid cannot change".to_string()))
        });

        let update = UpdateBook { bid: Some(18), ..Default::default() };
        let result = service(books).update_book(1, update).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
