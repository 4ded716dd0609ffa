use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use hotel_tax_core::{ReportGenerator, ReportQuery, TaxReport};
use serde::Deserialize;

use crate::error::AppError;
use crate::extractors::{empty_as_none, extract_query};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub establishment_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub end_date: Option<NaiveDate>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/taxes/report", get(report))
}

async fn report(
    State(state): State<AppState>,
    query: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<TaxReport>, AppError> {
    let params = extract_query(query)?;
    let query = ReportQuery {
        establishment_id: params.establishment_id,
        start_date: params.start_date,
        end_date: params.end_date,
    };
    Ok(Json(
        ReportGenerator::new(state.repo())
            .generate_report(&query)
            .await?,
    ))
}
