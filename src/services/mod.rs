//! Business logic services

pub mod auth;
pub mod catalog;
pub mod loans;

use std::sync::Arc;

use crate::{
    config::{AuthConfig, LoansConfig},
    repository::{BooksStore, LoansStore, Repository, UsersStore},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services backed by the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, loans_config: LoansConfig) -> Self {
        Self::from_stores(
            Arc::new(repository.users),
            Arc::new(repository.books),
            Arc::new(repository.loans),
            auth_config,
            loans_config,
        )
    }

    /// Wire services over arbitrary store implementations
    pub fn from_stores(
        users: Arc<dyn UsersStore>,
        books: Arc<dyn BooksStore>,
        loans: Arc<dyn LoansStore>,
        auth_config: AuthConfig,
        loans_config: LoansConfig,
    ) -> Self {
        Self {
            auth: auth::AuthService::new(users.clone(), auth_config),
            catalog: catalog::CatalogService::new(books.clone(), loans.clone()),
            loans: loans::LoansService::new(users, books, loans, loans_config.fine_per_day),
        }
    }
}
