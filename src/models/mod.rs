//! Data models for the library server

pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookStatus};
pub use loan::{Loan, LoanDetails};
pub use user::{Role, StudentSummary, User};
