use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::line_item::{LineItem, PricedLineItem};
use super::tax_configuration::TaxType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRequest {
    pub establishment_id: i64,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub stay_id: Option<i64>,
    pub items: Vec<LineItem>,
    #[serde(default = "default_check_for_exemptions")]
    pub check_for_exemptions: bool,
    /// Date used for exemption windows; the establishment's current local
    /// day when omitted.
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

fn default_check_for_exemptions() -> bool {
    true
}

/// One tax configuration's contribution to a calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxDetail {
    pub tax_configuration_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub tax_type: TaxType,
    pub rate: Decimal,
    /// Money for percentage and fixed-amount taxes, nights for per-night taxes.
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub applied_to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedExemption {
    pub exemption_id: i64,
    pub tax_configuration_id: i64,
    pub reason: String,
    pub document_number: Option<String>,
    pub amount: Decimal,
}

/// The pure output of the engine before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxBreakdown {
    pub items: Vec<PricedLineItem>,
    pub subtotal: Decimal,
    pub tax_details: Vec<TaxDetail>,
    pub exemptions_applied: Vec<AppliedExemption>,
    pub total_tax: Decimal,
    pub total_amount: Decimal,
}

/// For persisting a calculation (no id)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalculation {
    pub establishment_id: i64,
    pub client_id: Option<i64>,
    pub stay_id: Option<i64>,
    pub currency: String,
    pub effective_date: NaiveDate,
    pub business_date: NaiveDate,
    pub computed_at: DateTime<Utc>,
    pub breakdown: TaxBreakdown,
}

impl NewCalculation {
    pub fn into_result(self, id: i64) -> CalculationResult {
        let TaxBreakdown {
            items,
            subtotal,
            tax_details,
            exemptions_applied,
            total_tax,
            total_amount,
        } = self.breakdown;

        CalculationResult {
            id,
            establishment_id: self.establishment_id,
            client_id: self.client_id,
            stay_id: self.stay_id,
            items,
            subtotal,
            tax_details,
            exemptions_applied,
            total_tax,
            total_amount,
            currency: self.currency,
            effective_date: self.effective_date,
            business_date: self.business_date,
            computed_at: self.computed_at,
        }
    }
}

/// An immutable, persisted calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub id: i64,
    pub establishment_id: i64,
    pub client_id: Option<i64>,
    pub stay_id: Option<i64>,
    pub items: Vec<PricedLineItem>,
    pub subtotal: Decimal,
    pub tax_details: Vec<TaxDetail>,
    pub exemptions_applied: Vec<AppliedExemption>,
    pub total_tax: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub effective_date: NaiveDate,
    /// Establishment-local day of `computed_at`; reports bucket on this.
    pub business_date: NaiveDate,
    pub computed_at: DateTime<Utc>,
}

/// Selection used by report scans. Both dates are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculationFilter {
    pub establishment_id: Option<i64>,
    pub from: NaiveDate,
    pub to: NaiveDate,
}
