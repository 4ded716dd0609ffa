//! Exemption Registry endpoints under `/taxes/exemptions`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use hotel_tax_core::{ExemptionFilter, ExemptionRegistry, TaxExemption, TaxExemptionInput};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::{empty_as_none, extract_id, extract_json, extract_query};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemptionQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub establishment_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub client_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub tax_configuration_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub active: Option<bool>,
}

impl From<ExemptionQuery> for ExemptionFilter {
    fn from(query: ExemptionQuery) -> Self {
        ExemptionFilter {
            establishment_id: query.establishment_id,
            client_id: query.client_id,
            tax_configuration_id: query.tax_configuration_id,
            active: query.active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemptionCheckQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub client_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub tax_configuration_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemptionCheck {
    pub exempt: bool,
    pub exemption: Option<TaxExemption>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/taxes/exemptions",
            get(list_exemptions).post(create_exemption),
        )
        .route("/taxes/exemptions/check", get(check_exemption))
        .route(
            "/taxes/exemptions/{id}",
            get(get_exemption)
                .put(update_exemption)
                .delete(deactivate_exemption),
        )
}

async fn list_exemptions(
    State(state): State<AppState>,
    query: Result<Query<ExemptionQuery>, QueryRejection>,
) -> Result<Json<Vec<TaxExemption>>, AppError> {
    let filter = ExemptionFilter::from(extract_query(query)?);
    Ok(Json(
        ExemptionRegistry::new(state.repo())
            .list_exemptions(&filter)
            .await?,
    ))
}

/// `isExempt` over HTTP; `date` defaults to today (UTC).
async fn check_exemption(
    State(state): State<AppState>,
    query: Result<Query<ExemptionCheckQuery>, QueryRejection>,
) -> Result<Json<ExemptionCheck>, AppError> {
    let query = extract_query(query)?;
    let (Some(client_id), Some(tax_configuration_id)) =
        (query.client_id, query.tax_configuration_id)
    else {
        let mut errors = hotel_tax_core::ValidationErrors::new();
        if query.client_id.is_none() {
            errors.add("clientId", "is required");
        }
        if query.tax_configuration_id.is_none() {
            errors.add("taxConfigurationId", "is required");
        }
        return Err(AppError::Validation(errors));
    };
    let on = query
        .date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    let exemption = ExemptionRegistry::new(state.repo())
        .find_exemption(client_id, tax_configuration_id, on)
        .await?;
    Ok(Json(ExemptionCheck {
        exempt: exemption.is_some(),
        exemption,
    }))
}

async fn get_exemption(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<TaxExemption>, AppError> {
    let id = extract_id(path)?;
    Ok(Json(ExemptionRegistry::new(state.repo()).get_exemption(id).await?))
}

async fn create_exemption(
    State(state): State<AppState>,
    body: Result<Json<TaxExemptionInput>, JsonRejection>,
) -> Result<(StatusCode, Json<TaxExemption>), AppError> {
    let input = extract_json(body)?;
    let created = ExemptionRegistry::new(state.repo())
        .create_exemption(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_exemption(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<TaxExemptionInput>, JsonRejection>,
) -> Result<Json<TaxExemption>, AppError> {
    let id = extract_id(path)?;
    let input = extract_json(body)?;
    Ok(Json(
        ExemptionRegistry::new(state.repo())
            .update_exemption(id, &input)
            .await?,
    ))
}

async fn deactivate_exemption(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<TaxExemption>, AppError> {
    let id = extract_id(path)?;
    Ok(Json(
        ExemptionRegistry::new(state.repo())
            .deactivate_exemption(id)
            .await?,
    ))
}
