//! Establishment and client directory.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use hotel_tax_core::{Client, Directory, Establishment, NewClient, NewEstablishment};

use crate::error::AppError;
use crate::extractors::{extract_id, extract_json};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/establishments",
            get(list_establishments).post(create_establishment),
        )
        .route("/establishments/{id}", get(get_establishment))
        .route("/clients", get(list_clients).post(create_client))
        .route("/clients/{id}", get(get_client))
}

async fn list_establishments(
    State(state): State<AppState>,
) -> Result<Json<Vec<Establishment>>, AppError> {
    Ok(Json(Directory::new(state.repo()).list_establishments().await?))
}

async fn get_establishment(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Establishment>, AppError> {
    let id = extract_id(path)?;
    Ok(Json(Directory::new(state.repo()).get_establishment(id).await?))
}

async fn create_establishment(
    State(state): State<AppState>,
    body: Result<Json<NewEstablishment>, JsonRejection>,
) -> Result<(StatusCode, Json<Establishment>), AppError> {
    let input = extract_json(body)?;
    let created = Directory::new(state.repo())
        .create_establishment(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<Client>>, AppError> {
    Ok(Json(Directory::new(state.repo()).list_clients().await?))
}

async fn get_client(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Client>, AppError> {
    let id = extract_id(path)?;
    Ok(Json(Directory::new(state.repo()).get_client(id).await?))
}

async fn create_client(
    State(state): State<AppState>,
    body: Result<Json<NewClient>, JsonRejection>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let input = extract_json(body)?;
    let created = Directory::new(state.repo()).create_client(&input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
