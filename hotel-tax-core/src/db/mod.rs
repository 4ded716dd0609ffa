pub mod factory;
pub mod repository;

pub use factory::{DbConfig, RepositoryFactory, RepositoryRegistry};
pub use repository::{CalculationSnapshot, CalculationVisitor, RepositoryError, TaxRepository};
