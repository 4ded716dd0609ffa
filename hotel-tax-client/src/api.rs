//! One method per API endpoint. Responses are decoded straight into the
//! core model types.

use chrono::NaiveDate;
use hotel_tax_core::{
    CalculationRequest, CalculationResult, Client as HotelClient, ConfigurationFilter,
    Establishment, ExemptionFilter, NewClient, NewEstablishment, ReportQuery, TaxConfiguration,
    TaxConfigurationInput, TaxExemption, TaxExemptionInput, TaxReport,
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, from_response};
use crate::session::Session;

/// Result of an exemption lookup for one (client, configuration, date).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExemptionStatus {
    pub exempt: bool,
    pub exemption: Option<TaxExemption>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExemptionCheckParams {
    client_id: i64,
    tax_configuration_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
}

pub struct TaxApiClient {
    http: Client,
    base_url: String,
}

impl TaxApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Attaches the session token, sends, and decodes the body as `T`.
    /// A `401` invalidates `session`.
    async fn send<T: DeserializeOwned>(
        &self,
        session: &Session,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let token = session
            .token()
            .await
            .ok_or_else(|| ClientError::Unauthorized("session is not authenticated".to_string()))?;

        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.bytes().await?;
        debug!(%status, path = %url, bytes = body.len(), "API response");

        if status.is_success() {
            return serde_json::from_slice(&body)
                .map_err(|e| ClientError::Decode(format!("{url}: {e}")));
        }
        if status == StatusCode::UNAUTHORIZED {
            session.invalidate().await;
        }
        Err(from_response(status, &body))
    }

    // ── directory ───────────────────────────────────────────────────────

    pub async fn list_establishments(
        &self,
        session: &Session,
    ) -> Result<Vec<Establishment>, ClientError> {
        self.send(session, self.request(Method::GET, "/establishments"))
            .await
    }

    pub async fn get_establishment(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<Establishment, ClientError> {
        self.send(
            session,
            self.request(Method::GET, &format!("/establishments/{id}")),
        )
        .await
    }

    pub async fn create_establishment(
        &self,
        session: &Session,
        establishment: &NewEstablishment,
    ) -> Result<Establishment, ClientError> {
        self.send(
            session,
            self.request(Method::POST, "/establishments")
                .json(establishment),
        )
        .await
    }

    pub async fn list_clients(&self, session: &Session) -> Result<Vec<HotelClient>, ClientError> {
        self.send(session, self.request(Method::GET, "/clients"))
            .await
    }

    pub async fn get_client(&self, session: &Session, id: i64) -> Result<HotelClient, ClientError> {
        self.send(session, self.request(Method::GET, &format!("/clients/{id}")))
            .await
    }

    pub async fn create_client(
        &self,
        session: &Session,
        client: &NewClient,
    ) -> Result<HotelClient, ClientError> {
        self.send(session, self.request(Method::POST, "/clients").json(client))
            .await
    }

    // ── rate catalog ────────────────────────────────────────────────────

    pub async fn list_configurations(
        &self,
        session: &Session,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<TaxConfiguration>, ClientError> {
        self.send(
            session,
            self.request(Method::GET, "/taxes/configurations")
                .query(filter),
        )
        .await
    }

    pub async fn get_configuration(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<TaxConfiguration, ClientError> {
        self.send(
            session,
            self.request(Method::GET, &format!("/taxes/configurations/{id}")),
        )
        .await
    }

    pub async fn create_configuration(
        &self,
        session: &Session,
        input: &TaxConfigurationInput,
    ) -> Result<TaxConfiguration, ClientError> {
        self.send(
            session,
            self.request(Method::POST, "/taxes/configurations")
                .json(input),
        )
        .await
    }

    pub async fn update_configuration(
        &self,
        session: &Session,
        id: i64,
        input: &TaxConfigurationInput,
    ) -> Result<TaxConfiguration, ClientError> {
        self.send(
            session,
            self.request(Method::PUT, &format!("/taxes/configurations/{id}"))
                .json(input),
        )
        .await
    }

    pub async fn deactivate_configuration(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<TaxConfiguration, ClientError> {
        self.send(
            session,
            self.request(Method::DELETE, &format!("/taxes/configurations/{id}")),
        )
        .await
    }

    // ── exemptions ──────────────────────────────────────────────────────

    pub async fn list_exemptions(
        &self,
        session: &Session,
        filter: &ExemptionFilter,
    ) -> Result<Vec<TaxExemption>, ClientError> {
        self.send(
            session,
            self.request(Method::GET, "/taxes/exemptions").query(filter),
        )
        .await
    }

    pub async fn get_exemption(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<TaxExemption, ClientError> {
        self.send(
            session,
            self.request(Method::GET, &format!("/taxes/exemptions/{id}")),
        )
        .await
    }

    pub async fn create_exemption(
        &self,
        session: &Session,
        input: &TaxExemptionInput,
    ) -> Result<TaxExemption, ClientError> {
        self.send(
            session,
            self.request(Method::POST, "/taxes/exemptions").json(input),
        )
        .await
    }

    pub async fn update_exemption(
        &self,
        session: &Session,
        id: i64,
        input: &TaxExemptionInput,
    ) -> Result<TaxExemption, ClientError> {
        self.send(
            session,
            self.request(Method::PUT, &format!("/taxes/exemptions/{id}"))
                .json(input),
        )
        .await
    }

    pub async fn deactivate_exemption(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<TaxExemption, ClientError> {
        self.send(
            session,
            self.request(Method::DELETE, &format!("/taxes/exemptions/{id}")),
        )
        .await
    }

    /// `date` defaults to the server's current day.
    pub async fn check_exemption(
        &self,
        session: &Session,
        client_id: i64,
        tax_configuration_id: i64,
        date: Option<NaiveDate>,
    ) -> Result<ExemptionStatus, ClientError> {
        let params = ExemptionCheckParams {
            client_id,
            tax_configuration_id,
            date,
        };
        self.send(
            session,
            self.request(Method::GET, "/taxes/exemptions/check")
                .query(&params),
        )
        .await
    }

    // ── calculations and reports ────────────────────────────────────────

    pub async fn calculate(
        &self,
        session: &Session,
        request: &CalculationRequest,
    ) -> Result<CalculationResult, ClientError> {
        self.send(
            session,
            self.request(Method::POST, "/taxes/calculate").json(request),
        )
        .await
    }

    pub async fn get_calculation(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<CalculationResult, ClientError> {
        self.send(
            session,
            self.request(Method::GET, &format!("/taxes/calculations/{id}")),
        )
        .await
    }

    pub async fn report(
        &self,
        session: &Session,
        query: &ReportQuery,
    ) -> Result<TaxReport, ClientError> {
        self.send(
            session,
            self.request(Method::GET, "/taxes/report").query(query),
        )
        .await
    }
}
