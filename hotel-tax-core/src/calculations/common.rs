//! Money helpers shared by the calculation engine and the report aggregator.

use rust_decimal::Decimal;

/// Rounds a value to currency precision (two decimal places), with
/// midpoints rounded away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use hotel_tax_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(7.125)), dec!(7.13));
/// assert_eq!(round_half_up(dec!(7.124)), dec!(7.12));
/// assert_eq!(round_half_up(dec!(-7.125)), dec!(-7.13));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Clamps a value at zero.
///
/// ```
/// use rust_decimal_macros::dec;
/// use hotel_tax_core::calculations::common::floor_at_zero;
///
/// assert_eq!(floor_at_zero(dec!(-0.01)), dec!(0));
/// assert_eq!(floor_at_zero(dec!(67.50)), dec!(67.50));
/// ```
pub fn floor_at_zero(value: Decimal) -> Decimal {
    if value < Decimal::ZERO { Decimal::ZERO } else { value }
}
