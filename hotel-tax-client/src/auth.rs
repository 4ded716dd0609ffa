//! Session lifecycle against the authentication service.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ClientError, from_response};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

pub struct AuthClient {
    http: Client,
    auth_url: String,
}

impl AuthClient {
    /// `auth_url` is the service root; `/login` and `/logout` are appended.
    pub fn new(auth_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), auth_url)
    }

    pub fn with_client(http: Client, auth_url: impl Into<String>) -> Self {
        Self {
            http,
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Exchanges credentials for a fresh [`Session`].
    pub async fn login(&self, username: &str, password: &str) -> Result<(Session, User), ClientError> {
        let url = format!("{}/login", self.auth_url);
        let response = self
            .http
            .post(&url)
            .json(&Credentials { username, password })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            warn!(%status, username, "Login rejected");
            return Err(from_response(status, &body));
        }

        let LoginResponse { token, user } = serde_json::from_slice(&body)
            .map_err(|e| ClientError::Decode(format!("login response: {e}")))?;
        info!(username = %user.username, "Logged in");
        Ok((Session::with_token(token), user))
    }

    /// Ends the session locally, then tells the service. The local session
    /// is invalid even when the remote call fails.
    pub async fn logout(&self, session: &Session) -> Result<(), ClientError> {
        let Some(token) = session.token().await else {
            return Ok(());
        };
        session.invalidate().await;

        let url = format!("{}/logout", self.auth_url);
        let response = self.http.post(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let body = response.bytes().await?;
        Err(from_response(status, &body))
    }
}
