//! Router-level tests: requests go through the full middleware stack into an
//! in-memory SQLite database.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;

use hotel_tax_api::{AppState, app};
use hotel_tax_core::{CalculationResult, TaxConfiguration, TaxReport};
use hotel_tax_sqlite::SqliteRepository;

const TOKEN: &str = "test-token";

async fn test_state() -> AppState {
    let repo = SqliteRepository::new(":memory:")
        .await
        .expect("Failed to create in-memory database");
    repo.run_migrations()
        .await
        .expect("Failed to run migrations");
    AppState::new(Arc::new(repo))
}

async fn test_app() -> Router {
    app(test_state().await.with_auth_token(TOKEN))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_token(app, method, uri, body, Some(TOKEN)).await
}

async fn send_with_token(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Establishment with a 20% VAT and a 2.5 per-night levy on accommodation,
/// plus one client. Returns (establishment, client, vat, levy) ids.
async fn seed(app: &Router) -> (i64, i64, i64, i64) {
    let (status, establishment) = send(
        app,
        Method::POST,
        "/establishments",
        Some(json!({"name": "Hotel Memling", "countryCode": "CD"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let establishment_id = establishment["id"].as_i64().unwrap();

    let (status, client) = send(
        app,
        Method::POST,
        "/clients",
        Some(json!({"firstName": "Amina", "lastName": "Kabila"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let client_id = client["id"].as_i64().unwrap();

    let vat_id = create_configuration(app, establishment_id, "TVA", "20", "percentage").await;
    let levy_id =
        create_configuration(app, establishment_id, "Taxe de séjour", "2.5", "fixed_per_night")
            .await;

    (establishment_id, client_id, vat_id, levy_id)
}

async fn create_configuration(
    app: &Router,
    establishment_id: i64,
    name: &str,
    rate: &str,
    tax_type: &str,
) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/taxes/configurations",
        Some(json!({
            "establishmentId": establishment_id,
            "name": name,
            "rate": rate,
            "type": tax_type,
            "applicableTo": ["accommodation"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

fn stay_request(establishment_id: i64, client_id: Option<i64>) -> Value {
    json!({
        "establishmentId": establishment_id,
        "clientId": client_id,
        "items": [
            {"type": "accommodation", "description": "Chambre double", "quantity": 3, "unitPrice": "100"}
        ],
        "effectiveDate": "2024-06-15",
    })
}

// ── health and auth ─────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_open_without_token() {
    let app = test_app().await;

    let (status, body) = send_with_token(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = test_app().await;

    let (status, body) =
        send_with_token(&app, Method::GET, "/taxes/configurations", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn wrong_token_is_unauthorized() {
    let app = test_app().await;

    let (status, _) =
        send_with_token(&app, Method::GET, "/establishments", None, Some("nope")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_configured_token_leaves_api_open() {
    let app = app(test_state().await);

    let (status, body) = send_with_token(&app, Method::GET, "/establishments", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

// ── error mapping ───────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_configuration_lists_every_field() {
    let app = test_app().await;
    let (establishment_id, ..) = seed(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/taxes/configurations",
        Some(json!({
            "establishmentId": establishment_id,
            "name": "",
            "rate": "-1",
            "type": "per_person",
            "applicableTo": [],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let details = body["error"]["details"].as_object().unwrap();
    for field in ["name", "rate", "type", "applicableTo"] {
        assert!(details.contains_key(field), "missing detail for {field}: {body}");
    }
}

#[tokio::test]
async fn malformed_json_is_a_body_validation_error() {
    let app = test_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/taxes/calculate")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"]["details"]["body"].is_array(), "{body}");
}

#[tokio::test]
async fn non_numeric_id_is_a_validation_error() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/taxes/configurations/abc", None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["details"]["id"].is_array(), "{body}");
}

#[tokio::test]
async fn unknown_configuration_is_not_found() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/taxes/configurations/4242", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"].get("details").is_none());
}

#[tokio::test]
async fn moving_configuration_between_establishments_conflicts() {
    let app = test_app().await;
    let (_, _, vat_id, _) = seed(&app).await;
    let (_, other) = send(
        &app,
        Method::POST,
        "/establishments",
        Some(json!({"name": "Pullman Grand Hotel"})),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/taxes/configurations/{vat_id}"),
        Some(json!({
            "establishmentId": other["id"],
            "name": "TVA",
            "rate": "20",
            "type": "percentage",
            "applicableTo": ["accommodation"],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"]["code"], "CONFLICT");
}

// ── rate catalog ────────────────────────────────────────────────────────────

#[tokio::test]
async fn configuration_update_list_and_deactivate() {
    let app = test_app().await;
    let (establishment_id, _, vat_id, levy_id) = seed(&app).await;

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/taxes/configurations/{vat_id}"),
        Some(json!({
            "establishmentId": establishment_id,
            "name": "TVA",
            "rate": "16",
            "type": "percentage",
            "applicableTo": ["accommodation", "restaurant"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: TaxConfiguration = serde_json::from_value(updated).unwrap();
    assert_eq!(updated.rate, dec!(16));
    assert_eq!(updated.applicable_to, vec!["accommodation", "restaurant"]);

    let (status, deactivated) = send(
        &app,
        Method::DELETE,
        &format!("/taxes/configurations/{levy_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deactivated["active"], false);

    let (_, active) = send(
        &app,
        Method::GET,
        &format!("/taxes/configurations?establishmentId={establishment_id}&active=true"),
        None,
    )
    .await;
    let active: Vec<TaxConfiguration> = serde_json::from_value(active).unwrap();
    assert_eq!(active.iter().map(|c| c.id).collect::<Vec<_>>(), vec![vat_id]);

    let (_, all) = send(&app, Method::GET, "/taxes/configurations?active=", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

// ── calculations ────────────────────────────────────────────────────────────

#[tokio::test]
async fn calculate_persists_and_returns_created() {
    let app = test_app().await;
    let (establishment_id, client_id, vat_id, levy_id) = seed(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/taxes/calculate",
        Some(stay_request(establishment_id, Some(client_id))),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    let result: CalculationResult = serde_json::from_value(body).unwrap();
    assert_eq!(result.subtotal, dec!(300));
    assert_eq!(result.total_tax, dec!(67.5));
    assert_eq!(result.total_amount, dec!(367.5));
    assert_eq!(
        result
            .tax_details
            .iter()
            .map(|d| (d.tax_configuration_id, d.tax_amount))
            .collect::<Vec<_>>(),
        vec![(vat_id, dec!(60)), (levy_id, dec!(7.5))]
    );

    let (status, fetched) = send(
        &app,
        Method::GET,
        &format!("/taxes/calculations/{}", result.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_value::<CalculationResult>(fetched).unwrap(), result);
}

#[tokio::test]
async fn calculate_without_items_is_rejected() {
    let app = test_app().await;
    let (establishment_id, ..) = seed(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/taxes/calculate",
        Some(json!({"establishmentId": establishment_id, "items": []})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["details"]["items"].is_array(), "{body}");
}

#[tokio::test]
async fn calculate_for_unknown_establishment_is_not_found() {
    let app = test_app().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/taxes/calculate",
        Some(stay_request(999, None)),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── exemptions ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn exemption_lifecycle_and_check() {
    let app = test_app().await;
    let (establishment_id, client_id, vat_id, _) = seed(&app).await;

    let (status, exemption) = send(
        &app,
        Method::POST,
        "/taxes/exemptions",
        Some(json!({
            "establishmentId": establishment_id,
            "clientId": client_id,
            "taxConfigurationId": vat_id,
            "reason": "Diplomatic mission",
            "documentNumber": "DIP-2024-001",
            "validFrom": "2024-01-01",
            "validUntil": "2024-12-31",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{exemption}");
    let exemption_id = exemption["id"].as_i64().unwrap();

    let check = |date: &'static str| {
        format!(
            "/taxes/exemptions/check?clientId={client_id}&taxConfigurationId={vat_id}&date={date}"
        )
    };
    let (status, inside) = send(&app, Method::GET, &check("2024-06-15"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inside["exempt"], true);
    assert_eq!(inside["exemption"]["id"], exemption_id);

    let (_, outside) = send(&app, Method::GET, &check("2025-01-01"), None).await;
    assert_eq!(outside["exempt"], false);
    assert_eq!(outside["exemption"], Value::Null);

    let (_, calculated) = send(
        &app,
        Method::POST,
        "/taxes/calculate",
        Some(stay_request(establishment_id, Some(client_id))),
    )
    .await;
    let calculated: CalculationResult = serde_json::from_value(calculated).unwrap();
    assert_eq!(calculated.total_tax, dec!(7.5));
    assert_eq!(calculated.exemptions_applied.len(), 1);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/taxes/exemptions/{exemption_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = send(&app, Method::GET, &check("2024-06-15"), None).await;
    assert_eq!(after["exempt"], false);

    let (_, listed) = send(
        &app,
        Method::GET,
        &format!("/taxes/exemptions?clientId={client_id}&active=false"),
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn exemption_check_requires_both_ids() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/taxes/exemptions/check?clientId=1", None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["details"]["taxConfigurationId"].is_array(), "{body}");
    assert!(body["error"]["details"].get("clientId").is_none());
}

#[tokio::test]
async fn exemption_with_inverted_window_is_rejected() {
    let app = test_app().await;
    let (establishment_id, client_id, vat_id, _) = seed(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/taxes/exemptions",
        Some(json!({
            "establishmentId": establishment_id,
            "clientId": client_id,
            "taxConfigurationId": vat_id,
            "reason": "Diplomatic mission",
            "validFrom": "2024-12-31",
            "validUntil": "2024-01-01",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["details"]["validUntil"].is_array(), "{body}");
}

// ── reports ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn report_requires_a_period() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/taxes/report?startDate=", None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let details = body["error"]["details"].as_object().unwrap();
    assert!(details.contains_key("startDate"));
    assert!(details.contains_key("endDate"));
}

#[tokio::test]
async fn report_sums_recorded_calculations() {
    let app = test_app().await;
    let (establishment_id, _, vat_id, levy_id) = seed(&app).await;
    for _ in 0..2 {
        let (status, _) = send(
            &app,
            Method::POST,
            "/taxes/calculate",
            Some(stay_request(establishment_id, None)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        Method::GET,
        &format!(
            "/taxes/report?establishmentId={establishment_id}&startDate=2000-01-01&endDate=2100-12-31"
        ),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let report: TaxReport = serde_json::from_value(body).unwrap();
    assert_eq!(report.establishment_name.as_deref(), Some("Hotel Memling"));
    assert_eq!(report.summary.number_of_calculations, 2);
    assert_eq!(report.summary.total_tax_collected, dec!(135));
    assert_eq!(report.summary.total_revenue, dec!(600));
    assert_eq!(
        report
            .summary
            .by_tax_type
            .iter()
            .map(|t| (t.tax_configuration_id, t.amount_collected))
            .collect::<Vec<_>>(),
        vec![(vat_id, dec!(120)), (levy_id, dec!(15))]
    );
    assert_eq!(report.exemptions.count, 0);
}
