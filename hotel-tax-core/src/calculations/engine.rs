//! Tax computation over an in-memory snapshot.
//!
//! Given priced line items, the establishment's configurations and the
//! client's exemptions, [`compute_breakdown`] produces the itemized result
//! without touching storage.
//!
//! ## Tax types
//!
//! | Type              | Taxable amount                                   | Tax amount              |
//! |-------------------|--------------------------------------------------|-------------------------|
//! | `percentage`      | Sum of matching items' `totalPrice`              | taxable × rate / 100    |
//! | `fixed_per_night` | Sum of `quantity` of matching accommodation items | taxable × rate          |
//! | `fixed_amount`    | Sum of matching items' `totalPrice`              | rate, once              |
//!
//! Each tax amount is rounded to two decimal places before summation.
//!
//! ## Exemptions
//!
//! An exempted configuration still appears in `taxDetails` with its nominal
//! amount. The same amount is recorded in `exemptionsApplied`, so its net
//! contribution to `totalTax` is zero.
//!
//! ## Example
//!
//! ```
//! use chrono::{NaiveDate, Utc};
//! use rust_decimal_macros::dec;
//! use hotel_tax_core::calculations::{compute_breakdown, price_items};
//! use hotel_tax_core::{LineItem, TaxConfiguration, TaxType};
//!
//! let now = Utc::now();
//! let tourism_levy = TaxConfiguration {
//!     id: 1,
//!     establishment_id: 1,
//!     name: "Tourism levy".to_string(),
//!     description: None,
//!     rate: dec!(20),
//!     tax_type: TaxType::Percentage,
//!     applicable_to: vec!["accommodation".to_string()],
//!     country_code: Some("CD".to_string()),
//!     active: true,
//!     created_at: now,
//!     updated_at: now,
//! };
//! let items = price_items(&[LineItem {
//!     item_type: "accommodation".to_string(),
//!     description: "Deluxe room".to_string(),
//!     quantity: 3,
//!     unit_price: dec!(100),
//! }])
//! .unwrap();
//!
//! let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let breakdown = compute_breakdown(items, &[tourism_levy], None, date).unwrap();
//!
//! assert_eq!(breakdown.subtotal, dec!(300));
//! assert_eq!(breakdown.total_tax, dec!(60));
//! assert_eq!(breakdown.total_amount, dec!(360));
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::common::{floor_at_zero, round_half_up};
use crate::error::ValidationErrors;
use crate::exemptions::ExemptionSnapshot;
use crate::models::{
    AppliedExemption, LineItem, PricedLineItem, TaxBreakdown, TaxConfiguration, TaxDetail,
    TaxType,
};

/// Item categories whose quantity counts as nights for `fixed_per_night`.
pub const ACCOMMODATION_CATEGORIES: [&str; 2] = ["accommodation", "stays"];

fn is_accommodation(category: &str) -> bool {
    ACCOMMODATION_CATEGORIES.contains(&category)
}

fn overflow(field: &str) -> ValidationErrors {
    ValidationErrors::single(field, "amount exceeds the supported range")
}

/// Validates line items and recomputes each `totalPrice` from
/// `quantity × unitPrice`.
///
/// Item types are trimmed and lowercased so they compare equal to the
/// catalog's tags.
///
/// # Errors
///
/// Field errors keyed `items`, `items[i].type`, `items[i].quantity` and
/// `items[i].unitPrice`, all collected before returning.
pub fn price_items(items: &[LineItem]) -> Result<Vec<PricedLineItem>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if items.is_empty() {
        errors.add("items", "at least one item is required");
    }

    let mut priced = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let item_type = item.item_type.trim().to_lowercase();
        if item_type.is_empty() {
            errors.add(format!("items[{i}].type"), "must not be empty");
        }
        if item.quantity < 1 {
            errors.add(format!("items[{i}].quantity"), "must be at least 1");
        }
        if item.unit_price < Decimal::ZERO {
            errors.add(format!("items[{i}].unitPrice"), "must be non-negative");
        }

        match item.unit_price.checked_mul(Decimal::from(item.quantity)) {
            Some(total_price) => priced.push(PricedLineItem {
                item_type,
                description: item.description.trim().to_string(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price,
            }),
            None => errors.add(
                format!("items[{i}].unitPrice"),
                "amount exceeds the supported range",
            ),
        }
    }

    errors.into_result()?;
    Ok(priced)
}

/// Computes the full breakdown for already priced items.
///
/// Only active configurations are considered, in id order. `exemptions`
/// is `None` when exemption checking is off or there is no client.
///
/// # Errors
///
/// Returns a validation error only when an amount overflows the decimal
/// range.
pub fn compute_breakdown(
    items: Vec<PricedLineItem>,
    configurations: &[TaxConfiguration],
    exemptions: Option<&ExemptionSnapshot>,
    effective_date: NaiveDate,
) -> Result<TaxBreakdown, ValidationErrors> {
    let subtotal = items
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.total_price))
        .ok_or_else(|| overflow("items"))?;

    let mut active: Vec<&TaxConfiguration> = configurations.iter().filter(|c| c.active).collect();
    active.sort_by_key(|c| c.id);

    let mut tax_details = Vec::new();
    let mut exemptions_applied = Vec::new();

    for configuration in active {
        let Some(detail) = tax_line(configuration, &items)? else {
            continue;
        };

        if let Some(exemption) =
            exemptions.and_then(|snapshot| snapshot.find(configuration.id, effective_date))
        {
            exemptions_applied.push(AppliedExemption {
                exemption_id: exemption.id,
                tax_configuration_id: configuration.id,
                reason: exemption.reason.clone(),
                document_number: exemption.document_number.clone(),
                amount: detail.tax_amount,
            });
        }

        tax_details.push(detail);
    }

    let gross = tax_details
        .iter()
        .try_fold(Decimal::ZERO, |acc, d| acc.checked_add(d.tax_amount))
        .ok_or_else(|| overflow("items"))?;
    let exempted = exemptions_applied
        .iter()
        .try_fold(Decimal::ZERO, |acc, e| acc.checked_add(e.amount))
        .ok_or_else(|| overflow("items"))?;
    let total_tax = floor_at_zero(
        gross
            .checked_sub(exempted)
            .ok_or_else(|| overflow("items"))?,
    );
    let total_amount = subtotal
        .checked_add(total_tax)
        .ok_or_else(|| overflow("items"))?;

    Ok(TaxBreakdown {
        items,
        subtotal,
        tax_details,
        exemptions_applied,
        total_tax,
        total_amount,
    })
}

/// The tax line for one configuration, or `None` when no item matches.
fn tax_line(
    configuration: &TaxConfiguration,
    items: &[PricedLineItem],
) -> Result<Option<TaxDetail>, ValidationErrors> {
    let matching: Vec<&PricedLineItem> = items
        .iter()
        .filter(|item| configuration.applies_to(&item.item_type))
        .collect();
    if matching.is_empty() {
        return Ok(None);
    }

    let mut applied_to: Vec<String> = Vec::new();
    for item in &matching {
        if !applied_to.contains(&item.item_type) {
            applied_to.push(item.item_type.clone());
        }
    }

    let taxable_amount = match configuration.tax_type {
        TaxType::Percentage | TaxType::FixedAmount => matching
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.total_price)),
        TaxType::FixedPerNight => matching
            .iter()
            .filter(|item| is_accommodation(&item.item_type))
            .try_fold(Decimal::ZERO, |acc, item| {
                acc.checked_add(Decimal::from(item.quantity))
            }),
    }
    .ok_or_else(|| overflow("items"))?;

    let tax_amount = match configuration.tax_type {
        TaxType::Percentage => taxable_amount
            .checked_mul(configuration.rate)
            .map(|v| v / Decimal::ONE_HUNDRED),
        TaxType::FixedPerNight => taxable_amount.checked_mul(configuration.rate),
        TaxType::FixedAmount => Some(configuration.rate),
    }
    .map(round_half_up)
    .ok_or_else(|| overflow("items"))?;

    Ok(Some(TaxDetail {
        tax_configuration_id: configuration.id,
        name: configuration.name.clone(),
        tax_type: configuration.tax_type,
        rate: configuration.rate,
        taxable_amount,
        tax_amount,
        applied_to,
    }))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::TaxExemption;

    // =========================================================================
    // Fixtures
    // =========================================================================

    fn config(id: i64, tax_type: TaxType, rate: Decimal, applicable_to: &[&str]) -> TaxConfiguration {
        let now = Utc::now();
        TaxConfiguration {
            id,
            establishment_id: 1,
            name: format!("Tax {id}"),
            description: None,
            rate,
            tax_type,
            applicable_to: applicable_to.iter().map(|s| s.to_string()).collect(),
            country_code: Some("CD".to_string()),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(item_type: &str, quantity: i64, unit_price: Decimal) -> LineItem {
        LineItem {
            item_type: item_type.to_string(),
            description: String::new(),
            quantity,
            unit_price,
        }
    }

    fn exemption(id: i64, tax_configuration_id: i64) -> TaxExemption {
        let now = Utc::now();
        TaxExemption {
            id,
            establishment_id: 1,
            client_id: 7,
            tax_configuration_id,
            reason: "Diplomatic mission".to_string(),
            document_number: Some(format!("DIP-{id}")),
            valid_from: date(2024, 1, 1),
            valid_until: date(2024, 12, 31),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// The two-tax accommodation catalog used by most scenarios.
    fn room_catalog() -> Vec<TaxConfiguration> {
        vec![
            config(1, TaxType::Percentage, dec!(20), &["accommodation"]),
            config(2, TaxType::FixedPerNight, dec!(2.5), &["accommodation"]),
        ]
    }

    fn compute(
        items: &[LineItem],
        configurations: &[TaxConfiguration],
        exemptions: Option<&ExemptionSnapshot>,
    ) -> TaxBreakdown {
        let priced = price_items(items).unwrap();
        compute_breakdown(priced, configurations, exemptions, date(2024, 3, 1)).unwrap()
    }

    // =========================================================================
    // price_items tests
    // =========================================================================

    #[test]
    fn price_items_recomputes_total_price() {
        let priced = price_items(&[item("accommodation", 3, dec!(100))]).unwrap();

        assert_eq!(priced[0].total_price, dec!(300));
    }

    #[test]
    fn price_items_normalizes_item_type() {
        let priced = price_items(&[item("  Restaurant ", 1, dec!(12.50))]).unwrap();

        assert_eq!(priced[0].item_type, "restaurant");
    }

    #[test]
    fn price_items_requires_at_least_one_item() {
        let errors = price_items(&[]).unwrap_err();

        assert_eq!(errors.get("items").unwrap(), ["at least one item is required"]);
    }

    #[test]
    fn price_items_collects_every_field_error() {
        let errors = price_items(&[
            item("accommodation", 0, dec!(100)),
            item("", 1, dec!(-5)),
        ])
        .unwrap_err();

        assert_eq!(errors.len(), 3);
        assert!(errors.get("items[0].quantity").is_some());
        assert!(errors.get("items[1].type").is_some());
        assert!(errors.get("items[1].unitPrice").is_some());
    }

    #[test]
    fn price_items_accepts_zero_unit_price() {
        let priced = price_items(&[item("services", 2, dec!(0))]).unwrap();

        assert_eq!(priced[0].total_price, dec!(0));
    }

    // =========================================================================
    // compute_breakdown tests
    // =========================================================================

    #[test]
    fn room_scenario_matches_expected_totals() {
        let breakdown = compute(&[item("accommodation", 3, dec!(100))], &room_catalog(), None);

        assert_eq!(breakdown.subtotal, dec!(300));
        assert_eq!(breakdown.tax_details.len(), 2);
        assert_eq!(breakdown.tax_details[0].tax_amount, dec!(60));
        assert_eq!(breakdown.tax_details[1].taxable_amount, dec!(3));
        assert_eq!(breakdown.tax_details[1].tax_amount, dec!(7.5));
        assert_eq!(breakdown.total_tax, dec!(67.5));
        assert_eq!(breakdown.total_amount, dec!(367.5));
    }

    #[test]
    fn exemption_offsets_the_percentage_tax() {
        let snapshot = ExemptionSnapshot::new(7, vec![exemption(11, 1)]);

        let breakdown = compute(
            &[item("accommodation", 3, dec!(100))],
            &room_catalog(),
            Some(&snapshot),
        );

        assert_eq!(
            breakdown.exemptions_applied,
            vec![AppliedExemption {
                exemption_id: 11,
                tax_configuration_id: 1,
                reason: "Diplomatic mission".to_string(),
                document_number: Some("DIP-11".to_string()),
                amount: dec!(60),
            }]
        );
        // Exempted line is still shown at its nominal amount.
        assert_eq!(breakdown.tax_details[0].tax_amount, dec!(60));
        assert_eq!(breakdown.total_tax, dec!(7.5));
        assert_eq!(breakdown.total_amount, dec!(307.5));
    }

    #[test]
    fn exemption_outside_window_is_ignored() {
        let mut expired = exemption(11, 1);
        expired.valid_until = date(2024, 2, 29);
        let snapshot = ExemptionSnapshot::new(7, vec![expired]);

        let breakdown = compute(
            &[item("accommodation", 3, dec!(100))],
            &room_catalog(),
            Some(&snapshot),
        );

        assert!(breakdown.exemptions_applied.is_empty());
        assert_eq!(breakdown.total_tax, dec!(67.5));
    }

    #[test]
    fn overlapping_exemptions_apply_lowest_id_once() {
        let snapshot = ExemptionSnapshot::new(7, vec![exemption(20, 1), exemption(12, 1)]);

        let breakdown = compute(
            &[item("accommodation", 3, dec!(100))],
            &room_catalog(),
            Some(&snapshot),
        );

        assert_eq!(breakdown.exemptions_applied.len(), 1);
        assert_eq!(breakdown.exemptions_applied[0].exemption_id, 12);
    }

    #[test]
    fn no_matching_configuration_yields_no_tax() {
        let breakdown = compute(&[item("minibar", 2, dec!(15))], &room_catalog(), None);

        assert_eq!(breakdown.subtotal, dec!(30));
        assert!(breakdown.tax_details.is_empty());
        assert_eq!(breakdown.total_tax, dec!(0));
        assert_eq!(breakdown.total_amount, dec!(30));
    }

    #[test]
    fn empty_catalog_is_not_an_error() {
        let breakdown = compute(&[item("accommodation", 1, dec!(80))], &[], None);

        assert!(breakdown.tax_details.is_empty());
        assert_eq!(breakdown.total_amount, dec!(80));
    }

    #[test]
    fn inactive_configurations_are_skipped() {
        let mut catalog = room_catalog();
        catalog[0].active = false;

        let breakdown = compute(&[item("accommodation", 3, dec!(100))], &catalog, None);

        assert_eq!(breakdown.tax_details.len(), 1);
        assert_eq!(breakdown.tax_details[0].tax_configuration_id, 2);
    }

    #[test]
    fn tax_details_follow_configuration_id_order() {
        let catalog = vec![
            config(9, TaxType::FixedAmount, dec!(1000), &["services"]),
            config(3, TaxType::Percentage, dec!(16), &["restaurant", "services"]),
        ];

        let breakdown = compute(
            &[item("restaurant", 1, dec!(40)), item("services", 1, dec!(60))],
            &catalog,
            None,
        );

        let ids: Vec<i64> = breakdown.tax_details.iter().map(|d| d.tax_configuration_id).collect();
        assert_eq!(ids, vec![3, 9]);
    }

    #[test]
    fn fixed_amount_applies_once_per_calculation() {
        let catalog = vec![config(1, TaxType::FixedAmount, dec!(500), &["stays"])];

        let breakdown = compute(
            &[item("stays", 4, dec!(100)), item("stays", 2, dec!(80))],
            &catalog,
            None,
        );

        assert_eq!(breakdown.tax_details[0].taxable_amount, dec!(560));
        assert_eq!(breakdown.tax_details[0].tax_amount, dec!(500));
    }

    #[test]
    fn per_night_tax_counts_only_accommodation_quantity() {
        let catalog = vec![config(1, TaxType::FixedPerNight, dec!(2), &["stays", "restaurant"])];

        let breakdown = compute(
            &[item("stays", 4, dec!(100)), item("restaurant", 3, dec!(20))],
            &catalog,
            None,
        );

        assert_eq!(breakdown.tax_details[0].taxable_amount, dec!(4));
        assert_eq!(breakdown.tax_details[0].tax_amount, dec!(8));
        assert_eq!(breakdown.tax_details[0].applied_to, vec!["stays", "restaurant"]);
    }

    #[test]
    fn applied_to_lists_types_in_first_seen_order() {
        let catalog = vec![config(1, TaxType::Percentage, dec!(10), &["services", "restaurant"])];

        let breakdown = compute(
            &[
                item("restaurant", 1, dec!(10)),
                item("services", 1, dec!(10)),
                item("restaurant", 1, dec!(10)),
            ],
            &catalog,
            None,
        );

        assert_eq!(breakdown.tax_details[0].applied_to, vec!["restaurant", "services"]);
    }

    #[test]
    fn percentage_tax_rounds_half_away_from_zero() {
        let catalog = vec![config(1, TaxType::Percentage, dec!(16), &["restaurant"])];

        // 16% of 10.03 = 1.6048
        let breakdown = compute(&[item("restaurant", 1, dec!(10.03))], &catalog, None);

        assert_eq!(breakdown.tax_details[0].tax_amount, dec!(1.60));
        assert_eq!(breakdown.total_amount, dec!(11.63));
    }

    #[test]
    fn total_amount_is_subtotal_plus_total_tax() {
        let catalog = vec![
            config(1, TaxType::Percentage, dec!(16), &["restaurant", "services"]),
            config(2, TaxType::FixedPerNight, dec!(1.25), &["accommodation"]),
            config(3, TaxType::FixedAmount, dec!(3.33), &["services"]),
        ];

        let breakdown = compute(
            &[
                item("accommodation", 2, dec!(89.99)),
                item("restaurant", 3, dec!(12.35)),
                item("services", 1, dec!(7.77)),
            ],
            &catalog,
            None,
        );

        assert_eq!(breakdown.total_amount, breakdown.subtotal + breakdown.total_tax);
    }

    #[test]
    fn tax_lines_that_overflow_together_are_rejected() {
        let huge = Decimal::MAX / dec!(2) + dec!(1);
        let catalog = vec![
            config(1, TaxType::FixedAmount, huge, &["accommodation"]),
            config(2, TaxType::FixedAmount, huge, &["accommodation"]),
        ];
        let priced = price_items(&[item("accommodation", 1, dec!(100))]).unwrap();

        let errors = compute_breakdown(priced, &catalog, None, date(2024, 3, 1)).unwrap_err();

        assert!(errors.get("items").is_some());
    }

    #[test]
    fn identical_inputs_give_identical_details() {
        let items = [item("accommodation", 3, dec!(100)), item("restaurant", 1, dec!(25))];

        let first = compute(&items, &room_catalog(), None);
        let second = compute(&items, &room_catalog(), None);

        assert_eq!(first.tax_details, second.tax_details);
    }
}
