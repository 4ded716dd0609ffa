//! Calculation Engine endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use hotel_tax_core::{CalculationRequest, CalculationResult, TaxCalculator};

use crate::error::AppError;
use crate::extractors::{extract_id, extract_json};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/taxes/calculate", post(calculate))
        .route("/taxes/calculations/{id}", get(get_calculation))
}

/// Computes, records and returns the result; 201 because every call
/// persists a new calculation.
async fn calculate(
    State(state): State<AppState>,
    body: Result<Json<CalculationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CalculationResult>), AppError> {
    let request = extract_json(body)?;
    let result = TaxCalculator::new(state.repo()).calculate(&request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn get_calculation(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<CalculationResult>, AppError> {
    let id = extract_id(path)?;
    Ok(Json(TaxCalculator::new(state.repo()).get_calculation(id).await?))
}
