use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use hotel_tax_core::db::repository::{RepositoryError, TaxRepository};
use hotel_tax_core::db::{DbConfig, RepositoryFactory};

use crate::repository::SqliteRepository;

/// Resolve the seeds directory at runtime so it works in both development and
/// packaged distribution.
///
/// Resolution order:
/// 1. **`HOTEL_TAX_SEEDS_DIR`**: if set, use this path.
/// 2. **`./seeds`**: if the directory exists in the current working directory.
/// 3. **Crate manifest dir**: `$CARGO_MANIFEST_DIR/seeds` as last resort
///    (dev/tests when run from the build tree).
pub fn default_seeds_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HOTEL_TAX_SEEDS_DIR") {
        return PathBuf::from(dir);
    }
    let cwd_seeds = PathBuf::from("./seeds");
    if cwd_seeds.is_dir() {
        return cwd_seeds;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds")
}

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`hotel_tax_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use hotel_tax_core::db::RepositoryRegistry;
/// use hotel_tax_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory::new()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SqliteRepositoryFactory {
    seeds_dir: Option<PathBuf>,
}

impl SqliteRepositoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load seed files from `dir` instead of [`default_seeds_dir`].
    pub fn with_seeds_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            seeds_dir: Some(dir.into()),
        }
    }

    fn seeds_dir(&self) -> PathBuf {
        self.seeds_dir.clone().unwrap_or_else(default_seeds_dir)
    }
}

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.connection_string`.
    ///
    /// Accepted connection-string values:
    /// * A bare file path, e.g. `"hotel_tax.db"`. The file is created if it
    ///   does not exist.
    /// * A `sqlite:` URL, e.g. `"sqlite://data/hotel_tax.db"`.
    /// * `":memory:"`, an ephemeral in-memory database (useful for tests).
    ///
    /// Migrations always run. Seeds run only when the resolved seeds
    /// directory exists.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn TaxRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.connection_string)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;

        let seeds_dir = self.seeds_dir();
        if seeds_dir.is_dir() {
            repo.run_seeds(&seeds_dir)
                .await
                .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        } else {
            debug!(dir = %seeds_dir.display(), "No seeds directory, skipping seeds");
        }

        Ok(Box::new(repo))
    }
}
