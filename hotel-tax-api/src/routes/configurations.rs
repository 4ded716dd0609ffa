//! Rate Catalog endpoints under `/taxes/configurations`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use hotel_tax_core::{ConfigurationFilter, RateCatalog, TaxConfiguration, TaxConfigurationInput};
use serde::Deserialize;

use crate::error::AppError;
use crate::extractors::{empty_as_none, extract_id, extract_json, extract_query};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub establishment_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub active: Option<bool>,
}

impl From<ConfigurationQuery> for ConfigurationFilter {
    fn from(query: ConfigurationQuery) -> Self {
        ConfigurationFilter {
            establishment_id: query.establishment_id,
            active: query.active,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/taxes/configurations",
            get(list_configurations).post(create_configuration),
        )
        .route(
            "/taxes/configurations/{id}",
            get(get_configuration)
                .put(update_configuration)
                .delete(deactivate_configuration),
        )
}

async fn list_configurations(
    State(state): State<AppState>,
    query: Result<Query<ConfigurationQuery>, QueryRejection>,
) -> Result<Json<Vec<TaxConfiguration>>, AppError> {
    let filter = ConfigurationFilter::from(extract_query(query)?);
    Ok(Json(
        RateCatalog::new(state.repo())
            .list_configurations(&filter)
            .await?,
    ))
}

async fn get_configuration(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<TaxConfiguration>, AppError> {
    let id = extract_id(path)?;
    Ok(Json(RateCatalog::new(state.repo()).get_configuration(id).await?))
}

async fn create_configuration(
    State(state): State<AppState>,
    body: Result<Json<TaxConfigurationInput>, JsonRejection>,
) -> Result<(StatusCode, Json<TaxConfiguration>), AppError> {
    let input = extract_json(body)?;
    let created = RateCatalog::new(state.repo())
        .upsert_configuration(None, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_configuration(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<TaxConfigurationInput>, JsonRejection>,
) -> Result<Json<TaxConfiguration>, AppError> {
    let id = extract_id(path)?;
    let input = extract_json(body)?;
    Ok(Json(
        RateCatalog::new(state.repo())
            .upsert_configuration(Some(id), &input)
            .await?,
    ))
}

async fn deactivate_configuration(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<TaxConfiguration>, AppError> {
    let id = extract_id(path)?;
    Ok(Json(
        RateCatalog::new(state.repo())
            .deactivate_configuration(id)
            .await?,
    ))
}
