//! Establishment and client records that calculations and exemptions refer to.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::catalog::is_country_code;
use crate::db::repository::TaxRepository;
use crate::error::{NotFoundContext, TaxError, ValidationErrors};
use crate::models::{Client, Establishment, NewClient, NewEstablishment, is_valid_utc_offset};

static CURRENCY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").expect("currency pattern compiles"));

pub fn validate_establishment(
    input: &NewEstablishment,
) -> Result<NewEstablishment, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = input.name.trim().to_string();
    if name.is_empty() {
        errors.add("name", "must not be empty");
    }
    let currency = input.currency.trim().to_string();
    if !CURRENCY_PATTERN.is_match(&currency) {
        errors.add("currency", "must be a three-letter uppercase ISO code");
    }
    let country_code = input
        .country_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if let Some(code) = country_code
        && !is_country_code(code)
    {
        errors.add("countryCode", "must be two uppercase letters");
    }
    if !is_valid_utc_offset(input.utc_offset_minutes) {
        errors.add("utcOffsetMinutes", "must be within ±840 minutes");
    }

    errors.into_result()?;
    Ok(NewEstablishment {
        name,
        currency,
        country_code: country_code.map(str::to_string),
        utc_offset_minutes: input.utc_offset_minutes,
    })
}

pub fn validate_client(input: &NewClient) -> Result<NewClient, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let first_name = input.first_name.trim().to_string();
    if first_name.is_empty() {
        errors.add("firstName", "must not be empty");
    }
    let last_name = input.last_name.trim().to_string();
    if last_name.is_empty() {
        errors.add("lastName", "must not be empty");
    }
    let email = input
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = email
        && !email.contains('@')
    {
        errors.add("email", "must be an email address");
    }

    errors.into_result()?;
    Ok(NewClient {
        first_name,
        last_name,
        email: email.map(str::to_string),
    })
}

pub struct Directory<'a> {
    repo: &'a dyn TaxRepository,
}

impl<'a> Directory<'a> {
    pub fn new(repo: &'a dyn TaxRepository) -> Self {
        Self { repo }
    }

    pub async fn list_establishments(&self) -> Result<Vec<Establishment>, TaxError> {
        Ok(self.repo.list_establishments().await?)
    }

    pub async fn get_establishment(&self, id: i64) -> Result<Establishment, TaxError> {
        self.repo
            .get_establishment(id)
            .await
            .or_not_found(|| format!("Establishment {id}"))
    }

    pub async fn create_establishment(
        &self,
        input: &NewEstablishment,
    ) -> Result<Establishment, TaxError> {
        let establishment = validate_establishment(input)?;
        let created = self.repo.insert_establishment(&establishment).await?;
        info!(id = created.id, name = %created.name, "Created establishment");
        Ok(created)
    }

    pub async fn list_clients(&self) -> Result<Vec<Client>, TaxError> {
        Ok(self.repo.list_clients().await?)
    }

    pub async fn get_client(&self, id: i64) -> Result<Client, TaxError> {
        self.repo
            .get_client(id)
            .await
            .or_not_found(|| format!("Client {id}"))
    }

    pub async fn create_client(&self, input: &NewClient) -> Result<Client, TaxError> {
        let client = validate_client(input)?;
        let created = self.repo.insert_client(&client).await?;
        info!(id = created.id, "Created client");
        Ok(created)
    }
}
