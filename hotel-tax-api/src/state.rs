//! Shared request state: the repository handle and the expected bearer token.

use std::path::PathBuf;
use std::sync::Arc;

use hotel_tax_core::TaxRepository;
use hotel_tax_core::db::RepositoryRegistry;
use hotel_tax_sqlite::SqliteRepositoryFactory;

#[derive(Clone)]
pub struct AppState {
    repo: Arc<dyn TaxRepository>,
    auth_token: Option<Arc<str>>,
}

impl AppState {
    /// State with authentication disabled.
    pub fn new(repo: Arc<dyn TaxRepository>) -> Self {
        Self {
            repo,
            auth_token: None,
        }
    }

    /// Require `Authorization: Bearer <token>` on every API route.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(Arc::from(token.into()));
        self
    }

    pub fn repo(&self) -> &dyn TaxRepository {
        self.repo.as_ref()
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

/// Registry with every storage backend this server can run on.
///
/// `seeds_dir` overrides where the SQLite backend looks for seed files.
pub fn build_registry(seeds_dir: Option<PathBuf>) -> RepositoryRegistry {
    let sqlite = match seeds_dir {
        Some(dir) => SqliteRepositoryFactory::with_seeds_dir(dir),
        None => SqliteRepositoryFactory::new(),
    };

    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(sqlite));
    registry
}
