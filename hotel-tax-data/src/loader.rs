use std::io::Read;

use hotel_tax_core::catalog::validate_configuration;
use hotel_tax_core::{
    ConfigurationFilter, RateCatalog, TaxConfigurationInput, TaxError, TaxRepository,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when loading tax configuration data.
#[derive(Debug, Error)]
pub enum ConfigurationLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    /// A record that parsed but cannot become a configuration.
    #[error("line {line}: {message}")]
    Invalid { line: u64, message: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<csv::Error> for ConfigurationLoaderError {
    fn from(err: csv::Error) -> Self {
        ConfigurationLoaderError::CsvParse(err.to_string())
    }
}

impl ConfigurationLoaderError {
    fn at_line(line: u64, err: TaxError) -> Self {
        match err {
            TaxError::Transient(message) => Self::Storage(message),
            TaxError::Validation(errors) => Self::Invalid {
                line,
                message: errors.to_string(),
            },
            other => Self::Invalid {
                line,
                message: other.to_string(),
            },
        }
    }
}

/// A single record from the tax configuration CSV file.
///
/// Columns:
/// - `establishment_id`: owning establishment, which must already exist
/// - `name`: unique per establishment; used to match existing records
/// - `description`: optional
/// - `rate`: percent for `percentage`, currency amount otherwise
/// - `type`: `percentage`, `fixed_per_night` or `fixed_amount`
/// - `applicable_to`: category tags separated by `|`
/// - `country_code`: optional ISO 3166-1 alpha-2 code
/// - `active`: `true`/`false` (empty means `true`)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConfigurationRecord {
    pub establishment_id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub description: Option<String>,
    pub rate: Decimal,
    #[serde(rename = "type")]
    pub tax_type: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub applicable_to: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub country_code: Option<String>,
    #[serde(default = "default_active", deserialize_with = "deserialize_active")]
    pub active: bool,
    /// 1-based line in the source file.
    #[serde(skip)]
    pub line: u64,
}

impl ConfigurationRecord {
    pub fn to_input(&self) -> TaxConfigurationInput {
        TaxConfigurationInput {
            establishment_id: self.establishment_id,
            name: self.name.clone(),
            description: self.description.clone(),
            rate: self.rate,
            tax_type: self.tax_type.clone(),
            applicable_to: self.applicable_to.clone(),
            country_code: self.country_code.clone(),
            active: self.active,
        }
    }
}

fn default_active() -> bool {
    true
}

fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.unwrap_or_default()
        .split('|')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect())
}

fn deserialize_active<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(true),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(serde::de::Error::custom(format!(
                "invalid active flag '{}'",
                value
            ))),
        },
    }
}

/// How many configurations a load created and how many it replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub created: usize,
    pub updated: usize,
}

impl LoadSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

/// Loader for tax configurations from CSV files.
///
/// Records are written through [`RateCatalog`], so they get exactly the
/// validation the HTTP API applies. A record whose `(establishment_id, name)`
/// matches an existing configuration replaces it; anything else is created.
/// Loading the same file twice therefore leaves the catalog unchanged.
pub struct ConfigurationLoader;

impl ConfigurationLoader {
    /// Parse configuration records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<ConfigurationRecord>, ConfigurationLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut records = Vec::new();

        for result in csv_reader.records() {
            let row = result?;
            let line = row.position().map_or(0, |pos| pos.line());
            let mut record: ConfigurationRecord =
                row.deserialize(Some(&headers))
                    .map_err(|e| ConfigurationLoaderError::Invalid {
                        line,
                        message: e.to_string(),
                    })?;
            record.line = line;
            records.push(record);
        }

        Ok(records)
    }

    /// Load configuration records into the database.
    ///
    /// Every record is validated before the first write, so a malformed
    /// file changes nothing. Failures that depend on stored state (an
    /// unknown establishment, for instance) stop the load at that record.
    pub async fn load(
        repo: &dyn TaxRepository,
        records: &[ConfigurationRecord],
    ) -> Result<LoadSummary, ConfigurationLoaderError> {
        let inputs = records
            .iter()
            .map(|record| {
                let input = record.to_input();
                validate_configuration(&input).map_err(|errors| {
                    ConfigurationLoaderError::Invalid {
                        line: record.line,
                        message: errors.to_string(),
                    }
                })?;
                Ok((record.line, input))
            })
            .collect::<Result<Vec<_>, ConfigurationLoaderError>>()?;

        let catalog = RateCatalog::new(repo);
        let mut summary = LoadSummary::default();

        for (line, input) in inputs {
            let filter = ConfigurationFilter {
                establishment_id: Some(input.establishment_id),
                active: None,
            };
            let existing = catalog
                .list_configurations(&filter)
                .await
                .map_err(|e| ConfigurationLoaderError::at_line(line, e))?;
            let id = existing
                .iter()
                .find(|configuration| configuration.name == input.name.trim())
                .map(|configuration| configuration.id);

            let stored = catalog
                .upsert_configuration(id, &input)
                .await
                .map_err(|e| ConfigurationLoaderError::at_line(line, e))?;
            debug!(line, id = stored.id, name = %stored.name, "Loaded configuration");

            if id.is_some() {
                summary.updated += 1;
            } else {
                summary.created += 1;
            }
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            "Loaded tax configurations"
        );
        Ok(summary)
    }
}
