use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::tax_configuration::default_active;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxExemption {
    pub id: i64,
    pub establishment_id: i64,
    pub client_id: i64,
    pub tax_configuration_id: i64,
    pub reason: String,
    pub document_number: Option<String>,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaxExemption {
    /// True when the exemption is active and `date` lies inside its window.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.active && self.valid_from <= date && date <= self.valid_until
    }
}

/// Raw create/update payload for an exemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxExemptionInput {
    pub establishment_id: i64,
    pub client_id: i64,
    pub tax_configuration_id: i64,
    pub reason: String,
    #[serde(default)]
    pub document_number: Option<String>,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// A validated exemption ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaxExemption {
    pub establishment_id: i64,
    pub client_id: i64,
    pub tax_configuration_id: i64,
    pub reason: String,
    pub document_number: Option<String>,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemptionFilter {
    pub establishment_id: Option<i64>,
    pub client_id: Option<i64>,
    pub tax_configuration_id: Option<i64>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exemption(active: bool) -> TaxExemption {
        let now = Utc::now();
        TaxExemption {
            id: 1,
            establishment_id: 1,
            client_id: 7,
            tax_configuration_id: 3,
            reason: "Diplomatic mission".to_string(),
            document_number: Some("DIP-2024-001".to_string()),
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn covers_both_window_bounds() {
        let ex = exemption(true);

        assert!(ex.covers(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(ex.covers(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    }

    #[test]
    fn does_not_cover_outside_window() {
        let ex = exemption(true);

        assert!(!ex.covers(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()));
        assert!(!ex.covers(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    }

    #[test]
    fn inactive_exemption_covers_nothing() {
        let ex = exemption(false);

        assert!(!ex.covers(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()));
    }
}
