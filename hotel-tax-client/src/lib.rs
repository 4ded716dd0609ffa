//! Typed HTTP client for the hotel tax API.
//!
//! Every call takes an explicit [`Session`]. A session is obtained from
//! [`AuthClient::login`] or [`Session::with_token`] and stops working after
//! [`AuthClient::logout`] or the first `401` from the server.

pub mod api;
pub mod auth;
pub mod error;
pub mod session;

pub use api::{ExemptionStatus, TaxApiClient};
pub use auth::{AuthClient, LoginResponse, User};
pub use error::ClientError;
pub use session::Session;
