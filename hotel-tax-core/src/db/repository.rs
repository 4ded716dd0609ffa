use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{
    CalculationFilter, CalculationResult, Client, ConfigurationFilter, Establishment,
    ExemptionFilter, NewCalculation, NewClient, NewEstablishment, NewTaxConfiguration,
    NewTaxExemption, TaxConfiguration, TaxExemption,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Callback fed one calculation at a time by [`TaxRepository::scan_calculations`].
pub type CalculationVisitor<'a> = dyn FnMut(CalculationResult) + Send + 'a;

/// Everything one calculation reads from the catalog and the registry,
/// taken from a single consistent view of storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationSnapshot {
    /// Active configurations of the establishment, by id ascending.
    pub configurations: Vec<TaxConfiguration>,
    /// Active exemptions of the client, by id ascending. Empty without a client.
    pub exemptions: Vec<TaxExemption>,
}

#[async_trait]
pub trait TaxRepository: Send + Sync {
    // Establishments
    async fn get_establishment(&self, id: i64) -> Result<Establishment, RepositoryError>;
    async fn list_establishments(&self) -> Result<Vec<Establishment>, RepositoryError>;
    async fn insert_establishment(
        &self,
        establishment: &NewEstablishment,
    ) -> Result<Establishment, RepositoryError>;

    // Clients
    async fn get_client(&self, id: i64) -> Result<Client, RepositoryError>;
    async fn list_clients(&self) -> Result<Vec<Client>, RepositoryError>;
    async fn insert_client(&self, client: &NewClient) -> Result<Client, RepositoryError>;

    // Tax configurations, listed by id ascending
    async fn list_configurations(
        &self,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<TaxConfiguration>, RepositoryError>;
    async fn get_configuration(&self, id: i64) -> Result<TaxConfiguration, RepositoryError>;
    async fn insert_configuration(
        &self,
        configuration: &NewTaxConfiguration,
    ) -> Result<TaxConfiguration, RepositoryError>;
    async fn update_configuration(
        &self,
        id: i64,
        configuration: &NewTaxConfiguration,
    ) -> Result<TaxConfiguration, RepositoryError>;
    async fn set_configuration_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<TaxConfiguration, RepositoryError>;

    // Tax exemptions, listed by id ascending
    async fn list_exemptions(
        &self,
        filter: &ExemptionFilter,
    ) -> Result<Vec<TaxExemption>, RepositoryError>;
    async fn get_exemption(&self, id: i64) -> Result<TaxExemption, RepositoryError>;
    async fn insert_exemption(
        &self,
        exemption: &NewTaxExemption,
    ) -> Result<TaxExemption, RepositoryError>;
    async fn update_exemption(
        &self,
        id: i64,
        exemption: &NewTaxExemption,
    ) -> Result<TaxExemption, RepositoryError>;
    async fn set_exemption_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<TaxExemption, RepositoryError>;

    /// Lowest-id active exemption for the pair whose window contains `on`.
    async fn find_exemption(
        &self,
        client_id: i64,
        tax_configuration_id: i64,
        on: NaiveDate,
    ) -> Result<Option<TaxExemption>, RepositoryError>;

    /// Reads the establishment's active configurations and, when
    /// `client_id` is set, the client's active exemptions in one read
    /// transaction.
    async fn load_calculation_snapshot(
        &self,
        establishment_id: i64,
        client_id: Option<i64>,
    ) -> Result<CalculationSnapshot, RepositoryError>;

    // Calculations (append-only)

    /// Stores the result and all of its lines atomically.
    async fn insert_calculation(
        &self,
        calculation: &NewCalculation,
    ) -> Result<CalculationResult, RepositoryError>;
    async fn get_calculation(&self, id: i64) -> Result<CalculationResult, RepositoryError>;

    /// Streams every calculation matching `filter` to `visit`, in id order,
    /// without holding the whole set in memory. Returns the number visited.
    async fn scan_calculations(
        &self,
        filter: &CalculationFilter,
        visit: &mut CalculationVisitor<'_>,
    ) -> Result<u64, RepositoryError>;
}
