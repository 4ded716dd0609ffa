//! Exemption Registry: time-bounded waivers of one tax configuration for
//! one client.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::db::repository::{RepositoryError, TaxRepository};
use crate::error::{NotFoundContext, TaxError, ValidationErrors};
use crate::models::{ExemptionFilter, NewTaxExemption, TaxExemption, TaxExemptionInput};

/// A client's exemptions loaded once, answering the same question as
/// [`ExemptionRegistry::find_exemption`] without further queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExemptionSnapshot {
    client_id: i64,
    exemptions: Vec<TaxExemption>,
}

impl ExemptionSnapshot {
    /// Keeps only `client_id`'s exemptions, ordered by id.
    pub fn new(client_id: i64, mut exemptions: Vec<TaxExemption>) -> Self {
        exemptions.retain(|e| e.client_id == client_id);
        exemptions.sort_by_key(|e| e.id);
        Self {
            client_id,
            exemptions,
        }
    }

    pub fn client_id(&self) -> i64 {
        self.client_id
    }

    pub fn len(&self) -> usize {
        self.exemptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exemptions.is_empty()
    }

    /// Lowest-id exemption on `tax_configuration_id` covering `on`.
    pub fn find(&self, tax_configuration_id: i64, on: NaiveDate) -> Option<&TaxExemption> {
        self.exemptions
            .iter()
            .find(|e| e.tax_configuration_id == tax_configuration_id && e.covers(on))
    }

    pub fn is_exempt(&self, tax_configuration_id: i64, on: NaiveDate) -> bool {
        self.find(tax_configuration_id, on).is_some()
    }
}

/// Checks the fields of an exemption payload that need no storage access.
pub fn validate_exemption(input: &TaxExemptionInput) -> Result<NewTaxExemption, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let reason = input.reason.trim().to_string();
    if reason.is_empty() {
        errors.add("reason", "must not be empty");
    }
    if input.valid_from > input.valid_until {
        errors.add("validUntil", "must not be before validFrom");
    }

    errors.into_result()?;

    Ok(NewTaxExemption {
        establishment_id: input.establishment_id,
        client_id: input.client_id,
        tax_configuration_id: input.tax_configuration_id,
        reason,
        document_number: input
            .document_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        valid_from: input.valid_from,
        valid_until: input.valid_until,
        active: input.active,
    })
}

pub struct ExemptionRegistry<'a> {
    repo: &'a dyn TaxRepository,
}

impl<'a> ExemptionRegistry<'a> {
    pub fn new(repo: &'a dyn TaxRepository) -> Self {
        Self { repo }
    }

    pub async fn list_exemptions(
        &self,
        filter: &ExemptionFilter,
    ) -> Result<Vec<TaxExemption>, TaxError> {
        let exemptions = self.repo.list_exemptions(filter).await?;
        debug!(count = exemptions.len(), ?filter, "Listed exemptions");
        Ok(exemptions)
    }

    pub async fn get_exemption(&self, id: i64) -> Result<TaxExemption, TaxError> {
        self.repo
            .get_exemption(id)
            .await
            .or_not_found(|| format!("Tax exemption {id}"))
    }

    /// # Errors
    /// * `Validation` for an empty reason, `validFrom > validUntil`, or a
    ///   configuration that belongs to another establishment.
    /// * `NotFound` when the configuration or the client does not exist.
    pub async fn create_exemption(
        &self,
        input: &TaxExemptionInput,
    ) -> Result<TaxExemption, TaxError> {
        let exemption = validate_exemption(input)?;
        self.check_references(&exemption).await?;

        let created = self.repo.insert_exemption(&exemption).await?;
        info!(
            id = created.id,
            client_id = created.client_id,
            tax_configuration_id = created.tax_configuration_id,
            "Created tax exemption"
        );
        Ok(created)
    }

    /// Full-record update with the same checks as creation.
    pub async fn update_exemption(
        &self,
        id: i64,
        input: &TaxExemptionInput,
    ) -> Result<TaxExemption, TaxError> {
        let exemption = validate_exemption(input)?;
        self.get_exemption(id).await?;
        self.check_references(&exemption).await?;

        let updated = self
            .repo
            .update_exemption(id, &exemption)
            .await
            .or_not_found(|| format!("Tax exemption {id}"))?;
        info!(id, "Updated tax exemption");
        Ok(updated)
    }

    /// Sets `active = false`. Deactivating twice is not an error.
    pub async fn deactivate_exemption(&self, id: i64) -> Result<TaxExemption, TaxError> {
        let exemption = self
            .repo
            .set_exemption_active(id, false)
            .await
            .or_not_found(|| format!("Tax exemption {id}"))?;
        info!(id, "Deactivated tax exemption");
        Ok(exemption)
    }

    pub async fn find_exemption(
        &self,
        client_id: i64,
        tax_configuration_id: i64,
        on: NaiveDate,
    ) -> Result<Option<TaxExemption>, TaxError> {
        Ok(self
            .repo
            .find_exemption(client_id, tax_configuration_id, on)
            .await?)
    }

    pub async fn is_exempt(
        &self,
        client_id: i64,
        tax_configuration_id: i64,
        on: NaiveDate,
    ) -> Result<bool, TaxError> {
        Ok(self
            .find_exemption(client_id, tax_configuration_id, on)
            .await?
            .is_some())
    }

    async fn check_references(&self, exemption: &NewTaxExemption) -> Result<(), TaxError> {
        let configuration_id = exemption.tax_configuration_id;
        let configuration = self
            .repo
            .get_configuration(configuration_id)
            .await
            .or_not_found(|| format!("Tax configuration {configuration_id}"))?;
        if configuration.establishment_id != exemption.establishment_id {
            return Err(TaxError::validation(
                "taxConfigurationId",
                "belongs to a different establishment",
            ));
        }

        match self.repo.get_client(exemption.client_id).await {
            Ok(_) => Ok(()),
            Err(RepositoryError::NotFound) => {
                Err(TaxError::NotFound(format!("Client {}", exemption.client_id)))
            }
            Err(other) => Err(other.into()),
        }
    }
}
