use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::engine::{compute_breakdown, price_items};
use crate::db::repository::TaxRepository;
use crate::error::{NotFoundContext, TaxError};
use crate::exemptions::ExemptionSnapshot;
use crate::models::{CalculationRequest, CalculationResult, NewCalculation};

/// Runs a calculation against stored configurations and exemptions and
/// records the result.
///
/// Configurations and exemptions are read once per call inside one read
/// transaction, so every tax line of one result comes from the same snapshot. Repository failures abort
/// the calculation; nothing is retried or substituted.
pub struct TaxCalculator<'a> {
    repo: &'a dyn TaxRepository,
}

impl<'a> TaxCalculator<'a> {
    pub fn new(repo: &'a dyn TaxRepository) -> Self {
        Self { repo }
    }

    pub async fn calculate(
        &self,
        request: &CalculationRequest,
    ) -> Result<CalculationResult, TaxError> {
        self.calculate_at(request, Utc::now()).await
    }

    /// [`calculate`](Self::calculate) with an explicit computation time.
    pub async fn calculate_at(
        &self,
        request: &CalculationRequest,
        computed_at: DateTime<Utc>,
    ) -> Result<CalculationResult, TaxError> {
        let items = price_items(&request.items)?;

        let establishment_id = request.establishment_id;
        let establishment = self
            .repo
            .get_establishment(establishment_id)
            .await
            .or_not_found(|| format!("Establishment {establishment_id}"))?;
        if let Some(client_id) = request.client_id {
            self.repo
                .get_client(client_id)
                .await
                .or_not_found(|| format!("Client {client_id}"))?;
        }

        let business_date = establishment.local_date(computed_at);
        let effective_date = request.effective_date.unwrap_or(business_date);

        let exemption_client = request.client_id.filter(|_| request.check_for_exemptions);
        let snapshot = self
            .repo
            .load_calculation_snapshot(establishment_id, exemption_client)
            .await?;
        let configurations = snapshot.configurations;
        let exemptions =
            exemption_client.map(|client_id| ExemptionSnapshot::new(client_id, snapshot.exemptions));
        debug!(
            establishment_id,
            configurations = configurations.len(),
            exemptions = exemptions.as_ref().map_or(0, |s| s.len()),
            %effective_date,
            "Loaded calculation snapshot"
        );

        let breakdown =
            compute_breakdown(items, &configurations, exemptions.as_ref(), effective_date)?;

        let calculation = NewCalculation {
            establishment_id,
            client_id: request.client_id,
            stay_id: request.stay_id,
            currency: establishment.currency,
            effective_date,
            business_date,
            computed_at,
            breakdown,
        };
        let result = self.repo.insert_calculation(&calculation).await?;

        info!(
            id = result.id,
            establishment_id,
            subtotal = %result.subtotal,
            total_tax = %result.total_tax,
            exemptions = result.exemptions_applied.len(),
            "Recorded tax calculation"
        );
        Ok(result)
    }

    pub async fn get_calculation(&self, id: i64) -> Result<CalculationResult, TaxError> {
        self.repo
            .get_calculation(id)
            .await
            .or_not_found(|| format!("Calculation {id}"))
    }
}
