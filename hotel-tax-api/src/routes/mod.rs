pub mod calculations;
pub mod configurations;
pub mod directory;
pub mod exemptions;
pub mod health;
pub mod reports;
