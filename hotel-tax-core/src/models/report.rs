use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::tax_configuration::TaxType;

/// Report parameters as received from the caller.
///
/// Dates are optional here so their absence can be reported per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub establishment_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub establishment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub establishment_name: Option<String>,
    pub period: ReportPeriod,
    pub summary: ReportSummary,
    pub daily_breakdown: Vec<DailyTaxSummary>,
    pub exemptions: ExemptionSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Net tax after exemptions.
    pub total_tax_collected: Decimal,
    pub total_revenue: Decimal,
    pub number_of_calculations: u64,
    pub by_tax_type: Vec<TaxTypeSummary>,
    /// Revenue per line-item category.
    pub by_category: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxTypeSummary {
    pub tax_configuration_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub tax_type: TaxType,
    pub rate: Decimal,
    /// Nominal tax, before exemptions.
    pub amount_collected: Decimal,
    pub exempted_amount: Decimal,
    pub number_of_transactions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTaxSummary {
    pub date: NaiveDate,
    pub total_tax: Decimal,
    pub transactions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemptionSummary {
    pub total: Decimal,
    pub count: u64,
    pub by_type: Vec<ExemptionTypeSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemptionTypeSummary {
    pub tax_configuration_id: i64,
    pub reason: String,
    pub count: u64,
    pub amount: Decimal,
}
