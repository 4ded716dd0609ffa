use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a configuration's `rate` turns a taxable base into a tax amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    /// `rate` percent of the matching items' total price.
    Percentage,
    /// `rate` per night across matching accommodation items.
    FixedPerNight,
    /// `rate` once per calculation.
    FixedAmount,
}

impl TaxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::FixedPerNight => "fixed_per_night",
            Self::FixedAmount => "fixed_amount",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(Self::Percentage),
            "fixed_per_night" => Some(Self::FixedPerNight),
            "fixed_amount" => Some(Self::FixedAmount),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxConfiguration {
    pub id: i64,
    pub establishment_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub rate: Decimal,
    #[serde(rename = "type")]
    pub tax_type: TaxType,
    pub applicable_to: Vec<String>,
    pub country_code: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaxConfiguration {
    pub fn applies_to(&self, category: &str) -> bool {
        self.applicable_to.iter().any(|tag| tag == category)
    }
}

/// Raw create/update payload as submitted by an administrator.
///
/// `tax_type` stays a string so an unknown type is reported as a field
/// error rather than a malformed body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxConfigurationInput {
    pub establishment_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rate: Decimal,
    #[serde(rename = "type")]
    pub tax_type: String,
    #[serde(default)]
    pub applicable_to: Vec<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

pub(crate) fn default_active() -> bool {
    true
}

/// A validated configuration ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaxConfiguration {
    pub establishment_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub rate: Decimal,
    pub tax_type: TaxType,
    pub applicable_to: Vec<String>,
    pub country_code: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationFilter {
    pub establishment_id: Option<i64>,
    pub active: Option<bool>,
}

impl ConfigurationFilter {
    /// Active configurations of one establishment, the engine's snapshot query.
    pub fn active_for(establishment_id: i64) -> Self {
        Self {
            establishment_id: Some(establishment_id),
            active: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tax_type_round_trips_through_str() {
        for tax_type in [TaxType::Percentage, TaxType::FixedPerNight, TaxType::FixedAmount] {
            assert_eq!(TaxType::parse(tax_type.as_str()), Some(tax_type));
        }
    }

    #[test]
    fn tax_type_rejects_unknown_names() {
        assert_eq!(TaxType::parse("per_person"), None);
        assert_eq!(TaxType::parse("Percentage"), None);
    }

    #[test]
    fn tax_type_serializes_snake_case() {
        let json = serde_json::to_string(&TaxType::FixedPerNight).unwrap();

        assert_eq!(json, "\"fixed_per_night\"");
    }

    #[test]
    fn input_defaults_to_active() {
        let input: TaxConfigurationInput = serde_json::from_str(
            r#"{"establishmentId": 1, "name": "TVA", "rate": "16", "type": "percentage",
                "applicableTo": ["stays"]}"#,
        )
        .unwrap();

        assert!(input.active);
        assert_eq!(input.tax_type, "percentage");
    }
}
