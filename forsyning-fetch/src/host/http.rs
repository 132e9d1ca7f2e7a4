//! HTTP client with tracing and domain allowlist.
//!
//! This module provides a wrapped HTTP client that adds:
//! - Request/response tracing
//! - Domain allowlist so a connector cannot talk to unexpected hosts
//! - Bearer-token and form-post helpers used by token-based provider APIs
//!
//! The client is shared by every connector of an installation and is never
//! closed by the code that borrows it.

use reqwest::{Client, Response, StatusCode, header};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{FetchError, HttpError};

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for Forsyning.
const USER_AGENT: &str = concat!("Forsyning/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and domain allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            inner: client,
            allowed_domains: None,
        })
    }

    /// Restricts requests to the given domains (and their subdomains).
    #[must_use]
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &str) -> Result<(), HttpError> {
        let Some(ref allowed) = self.allowed_domains else {
            return Ok(());
        };

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs a GET request.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("GET request");

        let response = self.inner.get(url).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a GET request with a bearer token.
    #[instrument(skip(self, token), fields(url = %url))]
    pub async fn get_with_bearer(&self, url: &str, token: &str) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("GET request with bearer token");

        let response = self.inner.get(url).bearer_auth(token).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a GET request with a bearer token and query parameters.
    #[instrument(skip(self, token, query), fields(url = %url))]
    pub async fn get_with_bearer_query<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        token: &str,
        query: &T,
    ) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("GET request with bearer token and query");

        let response = self
            .inner
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a POST request with form data.
    ///
    /// The body is sent as `application/x-www-form-urlencoded`.
    #[instrument(skip(self, form), fields(url = %url))]
    pub async fn post_form<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
    ) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("POST request with form data");

        let response = self
            .inner
            .post(url)
            .header(header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

// ============================================================================
// Response Extensions
// ============================================================================

/// Extension trait for Response handling.
pub trait ResponseExt: Sized {
    /// Fails with [`FetchError::HttpStatus`] unless the status is 200.
    fn require_ok(self) -> Result<Self, FetchError>;

    /// Builds the [`FetchError::HttpStatus`] describing this response.
    fn status_error(&self) -> FetchError;
}

impl ResponseExt for Response {
    fn require_ok(self) -> Result<Self, FetchError> {
        if self.status() == StatusCode::OK {
            Ok(self)
        } else {
            Err(self.status_error())
        }
    }

    fn status_error(&self) -> FetchError {
        FetchError::HttpStatus {
            status: self.status().as_u16(),
            url: self.url().to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_allowlist() {
        let client = HttpClient::new()
            .unwrap()
            .with_allowed_domains(vec!["aalborgforsyning.dk".to_string()]);

        assert!(
            client
                .is_domain_allowed("https://services.aalborgforsyning.dk/Token")
                .is_ok()
        );
        assert!(client.is_domain_allowed("https://aalborgforsyning.dk").is_ok());
        assert!(client.is_domain_allowed("https://evil.com/steal").is_err());
        assert!(client.is_domain_allowed("not-a-valid-url").is_err());
    }

    #[test]
    fn test_no_domain_restrictions() {
        let client = HttpClient::new().unwrap();
        assert!(client.is_domain_allowed("https://any.domain.com").is_ok());
    }

    #[tokio::test]
    async fn test_require_ok_rejects_non_200() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let response = client.get(&format!("{}/missing", server.url())).await.unwrap();
        let err = response.require_ok().unwrap_err();

        assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_form_encodes_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/Token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body("username=a%40b.dk&grant_type=password")
            .with_status(200)
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let form = [("username", "a@b.dk"), ("grant_type", "password")];
        let response = client
            .post_form(&format!("{}/Token", server.url()), &form)
            .await
            .unwrap();

        assert!(response.require_ok().is_ok());
        mock.assert_async().await;
    }
}
