pub mod calculations;
pub mod catalog;
pub mod db;
pub mod directory;
pub mod error;
pub mod exemptions;
pub mod models;

pub use calculations::{ReportGenerator, TaxCalculator};
pub use catalog::RateCatalog;
pub use db::repository::{CalculationSnapshot, RepositoryError, TaxRepository};
pub use directory::Directory;
pub use error::{TaxError, ValidationErrors};
pub use exemptions::{ExemptionRegistry, ExemptionSnapshot};
pub use models::*;
