use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One billable component submitted for calculation.
///
/// Any client-side `totalPrice` is ignored on deserialization; the engine
/// recomputes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// A line item after server-side pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLineItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}
