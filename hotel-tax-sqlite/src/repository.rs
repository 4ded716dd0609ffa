use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use hotel_tax_core::db::repository::CalculationVisitor;
use hotel_tax_core::{
    AppliedExemption, CalculationFilter, CalculationResult, CalculationSnapshot, Client,
    ConfigurationFilter, Establishment, ExemptionFilter, NewCalculation, NewClient,
    NewEstablishment, NewTaxConfiguration, NewTaxExemption, PricedLineItem, RepositoryError,
    TaxConfiguration, TaxDetail, TaxExemption, TaxRepository, TaxType, is_valid_utc_offset,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

use crate::decimal::get_decimal;

/// Calculations fetched per round trip while scanning.
const SCAN_BATCH_SIZE: i64 = 500;

const ESTABLISHMENT_COLUMNS: &str =
    "id, name, currency, country_code, utc_offset_minutes, created_at";

const CLIENT_COLUMNS: &str = "id, first_name, last_name, email, created_at";

const CONFIGURATION_COLUMNS: &str = "id, establishment_id, name, description, rate, tax_type,
     applicable_to, country_code, active, created_at, updated_at";

const EXEMPTION_COLUMNS: &str = "id, establishment_id, client_id, tax_configuration_id, reason,
     document_number, valid_from, valid_until, active, created_at, updated_at";

const CALCULATION_COLUMNS: &str = "id, establishment_id, client_id, stay_id, currency, subtotal,
     total_tax, total_amount, effective_date, business_date, computed_at";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open `database_url` (a file path, `sqlite:` URL or `:memory:`),
    /// creating the file when missing.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database location: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives exactly as long as its one connection.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            SqlitePoolOptions::new()
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await
        }
        .with_context(|| format!("Failed to connect to database: {}", database_url))?;

        Ok(Self { pool })
    }

    pub fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(&self, seeds_dir: &Path) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            info!(file = %path.display(), "Applied seed file");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn db_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection(err.to_string())
        }
        other => RepositoryError::Database(other.to_string()),
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Database(format!("Failed to get {}: {}", name, e)))
}

fn tags_column(row: &SqliteRow, name: &str) -> Result<Vec<String>, RepositoryError> {
    let raw: String = column(row, name)?;
    serde_json::from_str(&raw)
        .map_err(|e| RepositoryError::Database(format!("Invalid JSON in {}: {}", name, e)))
}

fn tags_json(tags: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(tags).map_err(|e| RepositoryError::Database(e.to_string()))
}

fn tax_type_column(row: &SqliteRow, name: &str) -> Result<TaxType, RepositoryError> {
    let raw: String = column(row, name)?;
    TaxType::parse(&raw)
        .ok_or_else(|| RepositoryError::Database(format!("Unknown tax type '{}'", raw)))
}

fn row_to_establishment(row: &SqliteRow) -> Result<Establishment, RepositoryError> {
    let id: i64 = column(row, "id")?;
    let utc_offset_minutes: i32 = column(row, "utc_offset_minutes")?;
    if !is_valid_utc_offset(utc_offset_minutes) {
        return Err(RepositoryError::Database(format!(
            "Establishment {} has out-of-range utc_offset_minutes {}",
            id, utc_offset_minutes
        )));
    }
    Ok(Establishment {
        id,
        name: column(row, "name")?,
        currency: column(row, "currency")?,
        country_code: column(row, "country_code")?,
        utc_offset_minutes,
        created_at: column(row, "created_at")?,
    })
}

fn row_to_client(row: &SqliteRow) -> Result<Client, RepositoryError> {
    Ok(Client {
        id: column(row, "id")?,
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        email: column(row, "email")?,
        created_at: column(row, "created_at")?,
    })
}

fn row_to_configuration(row: &SqliteRow) -> Result<TaxConfiguration, RepositoryError> {
    Ok(TaxConfiguration {
        id: column(row, "id")?,
        establishment_id: column(row, "establishment_id")?,
        name: column(row, "name")?,
        description: column(row, "description")?,
        rate: get_decimal(row, "rate")?,
        tax_type: tax_type_column(row, "tax_type")?,
        applicable_to: tags_column(row, "applicable_to")?,
        country_code: column(row, "country_code")?,
        active: column(row, "active")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn row_to_exemption(row: &SqliteRow) -> Result<TaxExemption, RepositoryError> {
    Ok(TaxExemption {
        id: column(row, "id")?,
        establishment_id: column(row, "establishment_id")?,
        client_id: column(row, "client_id")?,
        tax_configuration_id: column(row, "tax_configuration_id")?,
        reason: column(row, "reason")?,
        document_number: column(row, "document_number")?,
        valid_from: column(row, "valid_from")?,
        valid_until: column(row, "valid_until")?,
        active: column(row, "active")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

/// Child rows (`items`, tax lines, exemption lines) for a set of
/// calculations, ordered by calculation then position.
async fn fetch_children(
    conn: &mut SqliteConnection,
    select: &str,
    ids: &[i64],
) -> Result<Vec<SqliteRow>, RepositoryError> {
    let mut query = QueryBuilder::<Sqlite>::new(select);
    query.push(" WHERE calculation_id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY calculation_id, position");

    query.build().fetch_all(&mut *conn).await.map_err(db_error)
}

/// Assembles full results for calculation header rows, three queries per
/// batch regardless of its size.
async fn load_calculations(
    conn: &mut SqliteConnection,
    rows: &[SqliteRow],
) -> Result<Vec<CalculationResult>, RepositoryError> {
    let ids = rows
        .iter()
        .map(|row| column::<i64>(row, "id"))
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut items: HashMap<i64, Vec<PricedLineItem>> = HashMap::new();
    let item_rows = fetch_children(
        conn,
        "SELECT calculation_id, item_type, description, quantity, unit_price, total_price
         FROM calculation_items",
        &ids,
    )
    .await?;
    for row in &item_rows {
        items
            .entry(column(row, "calculation_id")?)
            .or_default()
            .push(PricedLineItem {
                item_type: column(row, "item_type")?,
                description: column(row, "description")?,
                quantity: column(row, "quantity")?,
                unit_price: get_decimal(row, "unit_price")?,
                total_price: get_decimal(row, "total_price")?,
            });
    }

    let mut tax_details: HashMap<i64, Vec<TaxDetail>> = HashMap::new();
    let line_rows = fetch_children(
        conn,
        "SELECT calculation_id, tax_configuration_id, name, tax_type, rate, taxable_amount,
                tax_amount, applied_to
         FROM calculation_tax_lines",
        &ids,
    )
    .await?;
    for row in &line_rows {
        tax_details
            .entry(column(row, "calculation_id")?)
            .or_default()
            .push(TaxDetail {
                tax_configuration_id: column(row, "tax_configuration_id")?,
                name: column(row, "name")?,
                tax_type: tax_type_column(row, "tax_type")?,
                rate: get_decimal(row, "rate")?,
                taxable_amount: get_decimal(row, "taxable_amount")?,
                tax_amount: get_decimal(row, "tax_amount")?,
                applied_to: tags_column(row, "applied_to")?,
            });
    }

    let mut exemptions: HashMap<i64, Vec<AppliedExemption>> = HashMap::new();
    let exemption_rows = fetch_children(
        conn,
        "SELECT calculation_id, exemption_id, tax_configuration_id, reason, document_number, amount
         FROM calculation_exemptions",
        &ids,
    )
    .await?;
    for row in &exemption_rows {
        exemptions
            .entry(column(row, "calculation_id")?)
            .or_default()
            .push(AppliedExemption {
                exemption_id: column(row, "exemption_id")?,
                tax_configuration_id: column(row, "tax_configuration_id")?,
                reason: column(row, "reason")?,
                document_number: column(row, "document_number")?,
                amount: get_decimal(row, "amount")?,
            });
    }

    rows.iter()
        .map(|row| {
            let id: i64 = column(row, "id")?;
            Ok(CalculationResult {
                id,
                establishment_id: column(row, "establishment_id")?,
                client_id: column(row, "client_id")?,
                stay_id: column(row, "stay_id")?,
                items: items.remove(&id).unwrap_or_default(),
                subtotal: get_decimal(row, "subtotal")?,
                tax_details: tax_details.remove(&id).unwrap_or_default(),
                exemptions_applied: exemptions.remove(&id).unwrap_or_default(),
                total_tax: get_decimal(row, "total_tax")?,
                total_amount: get_decimal(row, "total_amount")?,
                currency: column(row, "currency")?,
                effective_date: column(row, "effective_date")?,
                business_date: column(row, "business_date")?,
                computed_at: column(row, "computed_at")?,
            })
        })
        .collect()
}

#[async_trait]
impl TaxRepository for SqliteRepository {
    // ── establishments ──────────────────────────────────────────────────

    async fn get_establishment(&self, id: i64) -> Result<Establishment, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM establishments WHERE id = ?",
            ESTABLISHMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_establishment(&row)
    }

    async fn list_establishments(&self) -> Result<Vec<Establishment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM establishments ORDER BY id",
            ESTABLISHMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_establishment).collect()
    }

    async fn insert_establishment(
        &self,
        establishment: &NewEstablishment,
    ) -> Result<Establishment, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO establishments (name, currency, country_code, utc_offset_minutes, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&establishment.name)
        .bind(&establishment.currency)
        .bind(&establishment.country_code)
        .bind(establishment.utc_offset_minutes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_establishment(result.last_insert_rowid()).await
    }

    // ── clients ─────────────────────────────────────────────────────────

    async fn get_client(&self, id: i64) -> Result<Client, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM clients WHERE id = ?", CLIENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_client(&row)
    }

    async fn list_clients(&self) -> Result<Vec<Client>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {} FROM clients ORDER BY id", CLIENT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter().map(row_to_client).collect()
    }

    async fn insert_client(&self, client: &NewClient) -> Result<Client, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO clients (first_name, last_name, email, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_client(result.last_insert_rowid()).await
    }

    // ── tax configurations ──────────────────────────────────────────────

    async fn list_configurations(
        &self,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<TaxConfiguration>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tax_configurations
             WHERE (? IS NULL OR establishment_id = ?)
               AND (? IS NULL OR active = ?)
             ORDER BY id",
            CONFIGURATION_COLUMNS
        ))
        .bind(filter.establishment_id)
        .bind(filter.establishment_id)
        .bind(filter.active)
        .bind(filter.active)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_configuration).collect()
    }

    async fn get_configuration(&self, id: i64) -> Result<TaxConfiguration, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tax_configurations WHERE id = ?",
            CONFIGURATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_configuration(&row)
    }

    async fn insert_configuration(
        &self,
        configuration: &NewTaxConfiguration,
    ) -> Result<TaxConfiguration, RepositoryError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO tax_configurations (
                establishment_id, name, description, rate, tax_type, applicable_to,
                country_code, active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(configuration.establishment_id)
        .bind(&configuration.name)
        .bind(&configuration.description)
        .bind(configuration.rate.to_string())
        .bind(configuration.tax_type.as_str())
        .bind(tags_json(&configuration.applicable_to)?)
        .bind(&configuration.country_code)
        .bind(configuration.active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_configuration(result.last_insert_rowid()).await
    }

    async fn update_configuration(
        &self,
        id: i64,
        configuration: &NewTaxConfiguration,
    ) -> Result<TaxConfiguration, RepositoryError> {
        let result = sqlx::query(
            "UPDATE tax_configurations SET
                establishment_id = ?, name = ?, description = ?, rate = ?, tax_type = ?,
                applicable_to = ?, country_code = ?, active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(configuration.establishment_id)
        .bind(&configuration.name)
        .bind(&configuration.description)
        .bind(configuration.rate.to_string())
        .bind(configuration.tax_type.as_str())
        .bind(tags_json(&configuration.applicable_to)?)
        .bind(&configuration.country_code)
        .bind(configuration.active)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_configuration(id).await
    }

    async fn set_configuration_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<TaxConfiguration, RepositoryError> {
        let result = sqlx::query(
            "UPDATE tax_configurations
             SET updated_at = CASE WHEN active = ? THEN updated_at ELSE ? END, active = ?
             WHERE id = ?",
        )
        .bind(active)
        .bind(Utc::now())
        .bind(active)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_configuration(id).await
    }

    // ── tax exemptions ──────────────────────────────────────────────────

    async fn list_exemptions(
        &self,
        filter: &ExemptionFilter,
    ) -> Result<Vec<TaxExemption>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tax_exemptions
             WHERE (? IS NULL OR establishment_id = ?)
               AND (? IS NULL OR client_id = ?)
               AND (? IS NULL OR tax_configuration_id = ?)
               AND (? IS NULL OR active = ?)
             ORDER BY id",
            EXEMPTION_COLUMNS
        ))
        .bind(filter.establishment_id)
        .bind(filter.establishment_id)
        .bind(filter.client_id)
        .bind(filter.client_id)
        .bind(filter.tax_configuration_id)
        .bind(filter.tax_configuration_id)
        .bind(filter.active)
        .bind(filter.active)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_exemption).collect()
    }

    async fn get_exemption(&self, id: i64) -> Result<TaxExemption, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tax_exemptions WHERE id = ?",
            EXEMPTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_exemption(&row)
    }

    async fn insert_exemption(
        &self,
        exemption: &NewTaxExemption,
    ) -> Result<TaxExemption, RepositoryError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO tax_exemptions (
                establishment_id, client_id, tax_configuration_id, reason, document_number,
                valid_from, valid_until, active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(exemption.establishment_id)
        .bind(exemption.client_id)
        .bind(exemption.tax_configuration_id)
        .bind(&exemption.reason)
        .bind(&exemption.document_number)
        .bind(exemption.valid_from)
        .bind(exemption.valid_until)
        .bind(exemption.active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_exemption(result.last_insert_rowid()).await
    }

    async fn update_exemption(
        &self,
        id: i64,
        exemption: &NewTaxExemption,
    ) -> Result<TaxExemption, RepositoryError> {
        let result = sqlx::query(
            "UPDATE tax_exemptions SET
                establishment_id = ?, client_id = ?, tax_configuration_id = ?, reason = ?,
                document_number = ?, valid_from = ?, valid_until = ?, active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(exemption.establishment_id)
        .bind(exemption.client_id)
        .bind(exemption.tax_configuration_id)
        .bind(&exemption.reason)
        .bind(&exemption.document_number)
        .bind(exemption.valid_from)
        .bind(exemption.valid_until)
        .bind(exemption.active)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_exemption(id).await
    }

    async fn set_exemption_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<TaxExemption, RepositoryError> {
        let result = sqlx::query(
            "UPDATE tax_exemptions
             SET updated_at = CASE WHEN active = ? THEN updated_at ELSE ? END, active = ?
             WHERE id = ?",
        )
        .bind(active)
        .bind(Utc::now())
        .bind(active)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_exemption(id).await
    }

    async fn find_exemption(
        &self,
        client_id: i64,
        tax_configuration_id: i64,
        on: NaiveDate,
    ) -> Result<Option<TaxExemption>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tax_exemptions
             WHERE client_id = ? AND tax_configuration_id = ? AND active = 1
               AND valid_from <= ? AND valid_until >= ?
             ORDER BY id
             LIMIT 1",
            EXEMPTION_COLUMNS
        ))
        .bind(client_id)
        .bind(tax_configuration_id)
        .bind(on)
        .bind(on)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_exemption).transpose()
    }

    // ── calculation snapshot ────────────────────────────────────────────

    async fn load_calculation_snapshot(
        &self,
        establishment_id: i64,
        client_id: Option<i64>,
    ) -> Result<CalculationSnapshot, RepositoryError> {
        // Both reads share one transaction so a concurrent write lands in
        // neither or both.
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let configuration_rows = sqlx::query(&format!(
            "SELECT {} FROM tax_configurations
             WHERE establishment_id = ? AND active = 1
             ORDER BY id",
            CONFIGURATION_COLUMNS
        ))
        .bind(establishment_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;

        let exemption_rows = match client_id {
            Some(client_id) => sqlx::query(&format!(
                "SELECT {} FROM tax_exemptions
                 WHERE client_id = ? AND active = 1
                 ORDER BY id",
                EXEMPTION_COLUMNS
            ))
            .bind(client_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error)?,
            None => Vec::new(),
        };

        tx.commit().await.map_err(db_error)?;

        let snapshot = CalculationSnapshot {
            configurations: configuration_rows
                .iter()
                .map(row_to_configuration)
                .collect::<Result<_, _>>()?,
            exemptions: exemption_rows
                .iter()
                .map(row_to_exemption)
                .collect::<Result<_, _>>()?,
        };
        debug!(
            establishment_id,
            ?client_id,
            configurations = snapshot.configurations.len(),
            exemptions = snapshot.exemptions.len(),
            "Read calculation snapshot"
        );
        Ok(snapshot)
    }

    // ── calculations ────────────────────────────────────────────────────

    async fn insert_calculation(
        &self,
        calculation: &NewCalculation,
    ) -> Result<CalculationResult, RepositoryError> {
        let breakdown = &calculation.breakdown;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let id = sqlx::query(
            "INSERT INTO calculations (
                establishment_id, client_id, stay_id, currency, subtotal, total_tax,
                total_amount, effective_date, business_date, computed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(calculation.establishment_id)
        .bind(calculation.client_id)
        .bind(calculation.stay_id)
        .bind(&calculation.currency)
        .bind(breakdown.subtotal.to_string())
        .bind(breakdown.total_tax.to_string())
        .bind(breakdown.total_amount.to_string())
        .bind(calculation.effective_date)
        .bind(calculation.business_date)
        .bind(calculation.computed_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .last_insert_rowid();

        for (position, item) in breakdown.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO calculation_items (
                    calculation_id, position, item_type, description, quantity, unit_price,
                    total_price
                ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(&item.item_type)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price.to_string())
            .bind(item.total_price.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        for (position, detail) in breakdown.tax_details.iter().enumerate() {
            sqlx::query(
                "INSERT INTO calculation_tax_lines (
                    calculation_id, position, tax_configuration_id, name, tax_type, rate,
                    taxable_amount, tax_amount, applied_to
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(detail.tax_configuration_id)
            .bind(&detail.name)
            .bind(detail.tax_type.as_str())
            .bind(detail.rate.to_string())
            .bind(detail.taxable_amount.to_string())
            .bind(detail.tax_amount.to_string())
            .bind(tags_json(&detail.applied_to)?)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        for (position, exemption) in breakdown.exemptions_applied.iter().enumerate() {
            sqlx::query(
                "INSERT INTO calculation_exemptions (
                    calculation_id, position, exemption_id, tax_configuration_id, reason,
                    document_number, amount
                ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(exemption.exemption_id)
            .bind(exemption.tax_configuration_id)
            .bind(&exemption.reason)
            .bind(&exemption.document_number)
            .bind(exemption.amount.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        debug!(id, lines = breakdown.tax_details.len(), "Inserted calculation");

        Ok(calculation.clone().into_result(id))
    }

    async fn get_calculation(&self, id: i64) -> Result<CalculationResult, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM calculations WHERE id = ?",
            CALCULATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        load_calculations(&mut conn, &[row])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)
    }

    async fn scan_calculations(
        &self,
        filter: &CalculationFilter,
        visit: &mut CalculationVisitor<'_>,
    ) -> Result<u64, RepositoryError> {
        // One read transaction so every batch sees the same committed rows.
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut after_id = 0_i64;
        let mut visited = 0_u64;

        loop {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM calculations
                 WHERE id > ?
                   AND business_date >= ? AND business_date <= ?
                   AND (? IS NULL OR establishment_id = ?)
                 ORDER BY id
                 LIMIT ?",
                CALCULATION_COLUMNS
            ))
            .bind(after_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.establishment_id)
            .bind(filter.establishment_id)
            .bind(SCAN_BATCH_SIZE)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error)?;

            let Some(last) = rows.last() else {
                break;
            };
            after_id = column(last, "id")?;

            for calculation in load_calculations(&mut tx, &rows).await? {
                visit(calculation);
                visited += 1;
            }

            if (rows.len() as i64) < SCAN_BATCH_SIZE {
                break;
            }
        }

        tx.commit().await.map_err(db_error)?;
        debug!(visited, from = %filter.from, to = %filter.to, "Scanned calculations");
        Ok(visited)
    }
}
