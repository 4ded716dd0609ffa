//! Period reports over persisted calculations.
//!
//! Calculations are selected by their `businessDate` (the establishment's
//! local day) and folded one at a time into a [`ReportAccumulator`], so
//! memory stays bounded by the number of groups rather than the number of
//! calculations.
//!
//! | Section           | Grouping                         | Ordering                     |
//! |-------------------|----------------------------------|------------------------------|
//! | `byTaxType`       | tax configuration                | configuration id             |
//! | `byCategory`      | line-item type                   | category name                |
//! | `dailyBreakdown`  | business date                    | date                         |
//! | `exemptions`      | (configuration, reason)          | configuration id, reason     |
//!
//! Every total is a plain sum, so reports over adjacent periods add up to
//! the report over their union.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::db::repository::TaxRepository;
use crate::error::{NotFoundContext, TaxError, ValidationErrors};
use crate::models::{
    CalculationFilter, CalculationResult, DailyTaxSummary, Establishment, ExemptionSummary,
    ExemptionTypeSummary, ReportPeriod, ReportQuery, ReportSummary, TaxReport, TaxTypeSummary,
};

/// Per-configuration running sums. The label fields follow the most
/// recent calculation, since names and rates can change over a period.
#[derive(Debug)]
struct TaxTypeTotals {
    summary: TaxTypeSummary,
    seen_at: DateTime<Utc>,
}

/// Adds `amount` to a running total, failing instead of overflowing.
fn accumulate(total: &mut Decimal, amount: Decimal) -> Result<(), ValidationErrors> {
    *total = total
        .checked_add(amount)
        .ok_or_else(|| ValidationErrors::single("period", "totals exceed the supported range"))?;
    Ok(())
}

/// Folds calculations into report totals.
#[derive(Debug, Default)]
pub struct ReportAccumulator {
    total_tax: Decimal,
    total_revenue: Decimal,
    calculations: u64,
    by_tax_type: BTreeMap<i64, TaxTypeTotals>,
    by_category: BTreeMap<String, Decimal>,
    daily: BTreeMap<NaiveDate, DailyTaxSummary>,
    exemption_total: Decimal,
    exemption_count: u64,
    exemptions_by_type: BTreeMap<(i64, String), ExemptionTypeSummary>,
}

impl ReportAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one calculation in. After an error the accumulator holds a
    /// partial sum and should be dropped.
    pub fn add(&mut self, calculation: &CalculationResult) -> Result<(), ValidationErrors> {
        self.calculations += 1;
        accumulate(&mut self.total_tax, calculation.total_tax)?;
        accumulate(&mut self.total_revenue, calculation.subtotal)?;

        for item in &calculation.items {
            let category = self
                .by_category
                .entry(item.item_type.clone())
                .or_insert(Decimal::ZERO);
            accumulate(category, item.total_price)?;
        }

        for detail in &calculation.tax_details {
            let totals = self
                .by_tax_type
                .entry(detail.tax_configuration_id)
                .or_insert_with(|| TaxTypeTotals {
                    summary: TaxTypeSummary {
                        tax_configuration_id: detail.tax_configuration_id,
                        name: detail.name.clone(),
                        tax_type: detail.tax_type,
                        rate: detail.rate,
                        amount_collected: Decimal::ZERO,
                        exempted_amount: Decimal::ZERO,
                        number_of_transactions: 0,
                    },
                    seen_at: calculation.computed_at,
                });
            if calculation.computed_at > totals.seen_at {
                totals.summary.name = detail.name.clone();
                totals.summary.tax_type = detail.tax_type;
                totals.summary.rate = detail.rate;
                totals.seen_at = calculation.computed_at;
            }
            accumulate(&mut totals.summary.amount_collected, detail.tax_amount)?;
            totals.summary.number_of_transactions += 1;
        }

        let day = self
            .daily
            .entry(calculation.business_date)
            .or_insert(DailyTaxSummary {
                date: calculation.business_date,
                total_tax: Decimal::ZERO,
                transactions: 0,
            });
        accumulate(&mut day.total_tax, calculation.total_tax)?;
        day.transactions += 1;

        for exemption in &calculation.exemptions_applied {
            accumulate(&mut self.exemption_total, exemption.amount)?;
            self.exemption_count += 1;

            if let Some(totals) = self.by_tax_type.get_mut(&exemption.tax_configuration_id) {
                accumulate(&mut totals.summary.exempted_amount, exemption.amount)?;
            }

            let group = self
                .exemptions_by_type
                .entry((exemption.tax_configuration_id, exemption.reason.clone()))
                .or_insert_with(|| ExemptionTypeSummary {
                    tax_configuration_id: exemption.tax_configuration_id,
                    reason: exemption.reason.clone(),
                    count: 0,
                    amount: Decimal::ZERO,
                });
            group.count += 1;
            accumulate(&mut group.amount, exemption.amount)?;
        }
        Ok(())
    }

    pub fn calculations(&self) -> u64 {
        self.calculations
    }

    pub fn finish(self, period: ReportPeriod, establishment: Option<&Establishment>) -> TaxReport {
        TaxReport {
            establishment_id: establishment.map(|e| e.id),
            establishment_name: establishment.map(|e| e.name.clone()),
            period,
            summary: ReportSummary {
                total_tax_collected: self.total_tax,
                total_revenue: self.total_revenue,
                number_of_calculations: self.calculations,
                by_tax_type: self.by_tax_type.into_values().map(|t| t.summary).collect(),
                by_category: self.by_category,
            },
            daily_breakdown: self.daily.into_values().collect(),
            exemptions: ExemptionSummary {
                total: self.exemption_total,
                count: self.exemption_count,
                by_type: self.exemptions_by_type.into_values().collect(),
            },
        }
    }
}

/// Checks that both dates are present and ordered.
pub fn validate_period(query: &ReportQuery) -> Result<ReportPeriod, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if query.start_date.is_none() {
        errors.add("startDate", "is required");
    }
    if query.end_date.is_none() {
        errors.add("endDate", "is required");
    }
    let (Some(start), Some(end)) = (query.start_date, query.end_date) else {
        return Err(errors);
    };
    if start > end {
        errors.add("startDate", "must not be after endDate");
    }
    errors.into_result()?;
    Ok(ReportPeriod { start, end })
}

pub struct ReportGenerator<'a> {
    repo: &'a dyn TaxRepository,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(repo: &'a dyn TaxRepository) -> Self {
        Self { repo }
    }

    /// # Errors
    /// * `Validation` when a date is missing or `startDate > endDate`.
    /// * `NotFound` when the establishment filter names an unknown id.
    /// * `Validation` keyed `period` when the totals overflow.
    pub async fn generate_report(&self, query: &ReportQuery) -> Result<TaxReport, TaxError> {
        let period = validate_period(query)?;

        let establishment = match query.establishment_id {
            Some(id) => Some(
                self.repo
                    .get_establishment(id)
                    .await
                    .or_not_found(|| format!("Establishment {id}"))?,
            ),
            None => None,
        };

        let filter = CalculationFilter {
            establishment_id: query.establishment_id,
            from: period.start,
            to: period.end,
        };
        let mut accumulator = ReportAccumulator::new();
        let mut failure: Option<ValidationErrors> = None;
        let scanned = self
            .repo
            .scan_calculations(&filter, &mut |calculation: CalculationResult| {
                if failure.is_none()
                    && let Err(errors) = accumulator.add(&calculation)
                {
                    failure = Some(errors);
                }
            })
            .await?;
        if let Some(errors) = failure {
            warn!(
                establishment_id = ?query.establishment_id,
                start = %period.start,
                end = %period.end,
                "Report totals overflowed"
            );
            return Err(TaxError::Validation(errors));
        }

        info!(
            establishment_id = ?query.establishment_id,
            start = %period.start,
            end = %period.end,
            calculations = scanned,
            "Generated tax report"
        );
        Ok(accumulator.finish(period, establishment.as_ref()))
    }
}
