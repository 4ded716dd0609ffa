use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Currency assigned to establishments created without one.
pub const DEFAULT_CURRENCY: &str = "CDF";

/// Largest offset from UTC in use anywhere (UTC+14).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

pub fn is_valid_utc_offset(minutes: i32) -> bool {
    (-MAX_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&minutes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Establishment {
    pub id: i64,
    pub name: String,
    pub currency: String,
    pub country_code: Option<String>,
    /// Fixed offset from UTC used to derive the local business day.
    pub utc_offset_minutes: i32,
    pub created_at: DateTime<Utc>,
}

impl Establishment {
    /// Falls back to UTC, with a warning, when the stored offset is out of
    /// range. Records written through [`crate::Directory`] never are.
    pub fn offset(&self) -> FixedOffset {
        let offset = is_valid_utc_offset(self.utc_offset_minutes)
            .then(|| FixedOffset::east_opt(self.utc_offset_minutes * 60))
            .flatten();
        match offset {
            Some(offset) => offset,
            None => {
                warn!(
                    establishment_id = self.id,
                    utc_offset_minutes = self.utc_offset_minutes,
                    "UTC offset out of range; using UTC"
                );
                Utc.fix()
            }
        }
    }

    /// Calendar day at `instant` in the establishment's local time.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }
}

/// For creating new establishments (no id or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEstablishment {
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
