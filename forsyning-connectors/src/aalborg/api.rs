//! Aalborg Forsyning API connector.
//!
//! Token-based API for remotely read district-heating meters. The provider
//! allows at most three polls per day and does not publish next-day data.

use async_trait::async_trait;
use forsyning_core::{MeterId, MeterReading};
use forsyning_fetch::host::ResponseExt;
use forsyning_fetch::{AccessToken, Connector, FetchContext, FetchError, HttpError};
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use super::parser::{parse_meters, parse_reading, parse_token};
use crate::descriptor::Credentials;

// ============================================================================
// Constants
// ============================================================================

/// API base URL, including the trailing slash.
pub const BASE_URL: &str = "https://services.aalborgforsyning.dk/";

const TOKEN_ENDPOINT: &str = "Token";
const METERS_ENDPOINT: &str = "api/data/Meters";
const DATA_ENDPOINT: &str = "api/data";

// ============================================================================
// Connector
// ============================================================================

/// Connector for the Aalborg Forsyning meter data API.
#[derive(Debug, Clone)]
pub struct AalborgConnector {
    base_url: String,
    credentials: Credentials,
}

impl AalborgConnector {
    /// Creates a connector against the production API.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(BASE_URL, credentials)
    }

    /// Creates a connector against another base URL (tests, proxies).
    pub fn with_base_url(base_url: impl Into<String>, credentials: Credentials) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            credentials,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }
}

async fn body(response: reqwest::Response) -> Result<String, FetchError> {
    response
        .text()
        .await
        .map_err(|e| FetchError::from(HttpError::from(e)))
}

#[async_trait]
impl Connector for AalborgConnector {
    fn id(&self) -> &str {
        super::CONNECTOR_ID
    }

    #[instrument(skip(self, ctx))]
    async fn authenticate(&self, ctx: &FetchContext) -> Result<AccessToken, FetchError> {
        let form = [
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
            ("grant_type", "password"),
        ];

        let response = ctx.http.post_form(&self.url(TOKEN_ENDPOINT), &form).await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(response.status_error());
        }
        if status != StatusCode::OK {
            return Err(FetchError::AuthenticationFailed(format!(
                "Token endpoint returned {status} for {} (password ***)",
                self.credentials.username
            )));
        }

        parse_token(&body(response).await?)
    }

    #[instrument(skip(self, ctx, token))]
    async fn discover_meters(
        &self,
        ctx: &FetchContext,
        token: &AccessToken,
    ) -> Result<Vec<MeterId>, FetchError> {
        let response = ctx
            .http
            .get_with_bearer(&self.url(METERS_ENDPOINT), token.secret())
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(response.status_error());
        }
        if status != StatusCode::OK {
            warn!(status = %status, "Meter list request rejected");
            return Ok(Vec::new());
        }

        parse_meters(&body(response).await?)
    }

    #[instrument(skip(self, ctx, meter, token), fields(meter = %meter))]
    async fn fetch(
        &self,
        ctx: &FetchContext,
        meter: &MeterId,
        token: &AccessToken,
    ) -> Result<MeterReading, FetchError> {
        let response = ctx
            .http
            .get_with_bearer_query(
                &self.url(DATA_ENDPOINT),
                token.secret(),
                &[("meterid", meter.as_str())],
            )
            .await?
            .require_ok()?;

        let reading = parse_reading(&body(response).await?)?;
        debug!(fields = reading.fields().count(), "Meter reading received");
        Ok(reading)
    }
}
