//! Rate Catalog: per-establishment tax configurations.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::db::repository::{RepositoryError, TaxRepository};
use crate::error::{NotFoundContext, TaxError, ValidationErrors};
use crate::models::{
    ConfigurationFilter, NewTaxConfiguration, TaxConfiguration, TaxConfigurationInput, TaxType,
};

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("tag pattern compiles"));

static COUNTRY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").expect("country pattern compiles"));

pub(crate) fn is_country_code(value: &str) -> bool {
    COUNTRY_PATTERN.is_match(value)
}

/// Checks the fields of a configuration payload that need no storage
/// access. Tags are trimmed and deduplicated in order.
pub fn validate_configuration(
    input: &TaxConfigurationInput,
) -> Result<NewTaxConfiguration, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = input.name.trim().to_string();
    if name.is_empty() {
        errors.add("name", "must not be empty");
    }

    if input.rate < Decimal::ZERO {
        errors.add("rate", "must be non-negative");
    }

    let tax_type = TaxType::parse(input.tax_type.trim());
    if tax_type.is_none() {
        errors.add(
            "type",
            format!(
                "must be one of percentage, fixed_per_night, fixed_amount (got '{}')",
                input.tax_type
            ),
        );
    }

    let mut applicable_to: Vec<String> = Vec::new();
    for tag in input.applicable_to.iter().map(|t| t.trim()) {
        if !TAG_PATTERN.is_match(tag) {
            errors.add("applicableTo", format!("'{tag}' is not a lowercase category tag"));
        } else if !applicable_to.iter().any(|t| t == tag) {
            applicable_to.push(tag.to_string());
        }
    }
    if input.applicable_to.is_empty() {
        errors.add("applicableTo", "must not be empty");
    }

    let country_code = input
        .country_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if let Some(code) = country_code
        && !is_country_code(code)
    {
        errors.add("countryCode", "must be two uppercase letters");
    }

    errors.into_result()?;
    let Some(tax_type) = tax_type else {
        return Err(ValidationErrors::single("type", "is required"));
    };

    Ok(NewTaxConfiguration {
        establishment_id: input.establishment_id,
        name,
        description: input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        rate: input.rate,
        tax_type,
        applicable_to,
        country_code: country_code.map(str::to_string),
        active: input.active,
    })
}

pub struct RateCatalog<'a> {
    repo: &'a dyn TaxRepository,
}

impl<'a> RateCatalog<'a> {
    pub fn new(repo: &'a dyn TaxRepository) -> Self {
        Self { repo }
    }

    /// Configurations ordered by id ascending.
    pub async fn list_configurations(
        &self,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<TaxConfiguration>, TaxError> {
        let configurations = self.repo.list_configurations(filter).await?;
        debug!(count = configurations.len(), ?filter, "Listed tax configurations");
        Ok(configurations)
    }

    pub async fn get_configuration(&self, id: i64) -> Result<TaxConfiguration, TaxError> {
        self.repo
            .get_configuration(id)
            .await
            .or_not_found(|| format!("Tax configuration {id}"))
    }

    /// Creates a configuration when `id` is `None`, otherwise replaces the
    /// stored record.
    ///
    /// # Errors
    /// * `Validation` for bad fields or an unknown establishment.
    /// * `NotFound` when `id` does not exist.
    /// * `Conflict` when an update would move the record to another
    ///   establishment.
    pub async fn upsert_configuration(
        &self,
        id: Option<i64>,
        input: &TaxConfigurationInput,
    ) -> Result<TaxConfiguration, TaxError> {
        let configuration = validate_configuration(input)?;

        if configuration.tax_type == TaxType::Percentage
            && configuration.rate > Decimal::ONE_HUNDRED
        {
            warn!(
                name = %configuration.name,
                rate = %configuration.rate,
                "Percentage rate above 100"
            );
        }

        match self.repo.get_establishment(configuration.establishment_id).await {
            Ok(_) => {}
            Err(RepositoryError::NotFound) => {
                return Err(TaxError::validation(
                    "establishmentId",
                    format!("establishment {} does not exist", configuration.establishment_id),
                ));
            }
            Err(other) => return Err(other.into()),
        }

        let Some(id) = id else {
            let created = self.repo.insert_configuration(&configuration).await?;
            info!(id = created.id, name = %created.name, "Created tax configuration");
            return Ok(created);
        };

        let existing = self.get_configuration(id).await?;
        if existing.establishment_id != configuration.establishment_id {
            return Err(TaxError::Conflict(format!(
                "tax configuration {id} belongs to establishment {}",
                existing.establishment_id
            )));
        }

        let updated = self
            .repo
            .update_configuration(id, &configuration)
            .await
            .or_not_found(|| format!("Tax configuration {id}"))?;
        info!(id, name = %updated.name, "Updated tax configuration");
        Ok(updated)
    }

    /// Sets `active = false`. Deactivating twice is not an error.
    pub async fn deactivate_configuration(&self, id: i64) -> Result<TaxConfiguration, TaxError> {
        let configuration = self
            .repo
            .set_configuration_active(id, false)
            .await
            .or_not_found(|| format!("Tax configuration {id}"))?;
        info!(id, "Deactivated tax configuration");
        Ok(configuration)
    }
}
