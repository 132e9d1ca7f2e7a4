//! Connector trait and types.
//!
//! A connector implements one provider's API: it authenticates, lists the
//! account's meters and fetches a reading per meter. The provided
//! [`Connector::update`] method composes those steps into one payload.

use async_trait::async_trait;
use forsyning_core::{ConnectorPayload, MeterId, MeterReading, MeterReadings};
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

use crate::context::FetchContext;
use crate::error::FetchError;

// ============================================================================
// Access Token
// ============================================================================

/// Bearer token returned by a provider's authentication endpoint.
///
/// The `Debug` impl never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for use in an `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

// ============================================================================
// Connector Trait
// ============================================================================

/// A provider-specific meter data connector.
///
/// ## Implementing a Connector
///
/// ```ignore
/// struct ExampleConnector { username: String, password: String }
///
/// #[async_trait]
/// impl Connector for ExampleConnector {
///     fn id(&self) -> &str {
///         "example"
///     }
///
///     async fn authenticate(&self, ctx: &FetchContext) -> Result<AccessToken, FetchError> {
///         // POST credentials, parse the token
///     }
///
///     async fn discover_meters(&self, ctx: &FetchContext, token: &AccessToken)
///         -> Result<Vec<MeterId>, FetchError> { /* ... */ }
///
///     async fn fetch(&self, ctx: &FetchContext, meter: &MeterId, token: &AccessToken)
///         -> Result<MeterReading, FetchError> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable identifier matching the connector's descriptor.
    fn id(&self) -> &str;

    /// Obtains an access token.
    async fn authenticate(&self, ctx: &FetchContext) -> Result<AccessToken, FetchError>;

    /// Lists the meters available to the authenticated account.
    ///
    /// An empty list is not an error at this level.
    async fn discover_meters(
        &self,
        ctx: &FetchContext,
        token: &AccessToken,
    ) -> Result<Vec<MeterId>, FetchError>;

    /// Fetches today's reading for one meter.
    async fn fetch(
        &self,
        ctx: &FetchContext,
        meter: &MeterId,
        token: &AccessToken,
    ) -> Result<MeterReading, FetchError>;

    /// Fetches the next day's reading for one meter, if the provider publishes one.
    async fn fetch_next_day(
        &self,
        _ctx: &FetchContext,
        _meter: &MeterId,
        _token: &AccessToken,
    ) -> Result<Option<MeterReading>, FetchError> {
        Ok(None)
    }

    /// Runs a full update: authenticate, discover meters, fetch each meter.
    ///
    /// Failures are logged here with their classification and returned as
    /// errors; no partial payload is ever returned. A meter whose request
    /// fails with a non-transient error is skipped, while a transient error
    /// aborts the whole update.
    #[instrument(skip(self, ctx), fields(connector = %self.id()))]
    async fn update(&self, ctx: &FetchContext) -> Result<ConnectorPayload, FetchError> {
        let token = match self.authenticate(ctx).await {
            Ok(token) => token,
            Err(e) => {
                let e = match e {
                    FetchError::AuthenticationFailed(_) => e,
                    other if other.is_transient() => other,
                    other => FetchError::AuthenticationFailed(other.to_string()),
                };
                error!(
                    connector = %self.id(),
                    classification = e.classification(),
                    error = %e,
                    "Couldn't authorise against provider API"
                );
                return Err(e);
            }
        };

        let meters = self.discover_meters(ctx, &token).await?;
        if meters.is_empty() {
            error!(
                connector = %self.id(),
                classification = "no_meters",
                "Error fetching meters list"
            );
            return Err(FetchError::NoMeters);
        }
        debug!(count = meters.len(), "Discovered meters");

        let mut today = MeterReadings::new();
        let mut tomorrow = MeterReadings::new();

        for meter in &meters {
            match self.fetch(ctx, meter, &token).await {
                Ok(reading) => today.insert(meter.clone(), reading),
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    warn!(meter = %meter, error = %e, "Skipping meter");
                    continue;
                }
            }

            match self.fetch_next_day(ctx, meter, &token).await {
                Ok(Some(reading)) => tomorrow.insert(meter.clone(), reading),
                Ok(None) => {}
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => warn!(meter = %meter, error = %e, "No next-day reading"),
            }
        }

        if today.is_empty() {
            error!(
                connector = %self.id(),
                classification = "empty_payload",
                "No meter returned data"
            );
            return Err(FetchError::EmptyPayload);
        }

        info!(meters = today.len(), next_day = tomorrow.len(), "Connector update complete");

        let payload = ConnectorPayload::today_only(self.id(), today);
        Ok(if tomorrow.is_empty() {
            payload
        } else {
            payload.with_tomorrow(tomorrow)
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Scripted connector for exercising the provided `update`.
    struct Scripted {
        auth: Result<(), fn() -> FetchError>,
        meters: Vec<&'static str>,
        readings: HashMap<&'static str, Result<(), fn() -> FetchError>>,
        next_day: bool,
    }

    impl Scripted {
        fn ok(meters: Vec<&'static str>) -> Self {
            let readings = meters.iter().map(|m| (*m, Ok(()))).collect();
            Self {
                auth: Ok(()),
                meters,
                readings,
                next_day: false,
            }
        }
    }

    #[async_trait]
    impl Connector for Scripted {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn authenticate(&self, _ctx: &FetchContext) -> Result<AccessToken, FetchError> {
            self.auth.map(|()| AccessToken::new("t")).map_err(|f| f())
        }

        async fn discover_meters(
            &self,
            _ctx: &FetchContext,
            _token: &AccessToken,
        ) -> Result<Vec<MeterId>, FetchError> {
            Ok(self.meters.iter().map(|m| MeterId::from(*m)).collect())
        }

        async fn fetch(
            &self,
            _ctx: &FetchContext,
            meter: &MeterId,
            _token: &AccessToken,
        ) -> Result<MeterReading, FetchError> {
            match self.readings.get(meter.as_str()) {
                Some(Ok(())) => {
                    let mut r = MeterReading::new();
                    r.insert("meter", serde_json::json!(meter.as_str()));
                    Ok(r)
                }
                Some(Err(f)) => Err(f()),
                None => Err(FetchError::InvalidResponse("unknown".into())),
            }
        }

        async fn fetch_next_day(
            &self,
            _ctx: &FetchContext,
            _meter: &MeterId,
            _token: &AccessToken,
        ) -> Result<Option<MeterReading>, FetchError> {
            Ok(self.next_day.then(MeterReading::new))
        }
    }

    fn ctx() -> FetchContext {
        FetchContext::new().unwrap()
    }

    #[tokio::test]
    async fn test_update_collects_all_meters() {
        let payload = Scripted::ok(vec!["1", "2"]).update(&ctx()).await.unwrap();
        assert_eq!(payload.today.len(), 2);
        assert!(payload.tomorrow.is_none());
        assert_eq!(payload.connector_id, "scripted");
    }

    #[tokio::test]
    async fn test_update_with_next_day() {
        let mut c = Scripted::ok(vec!["1"]);
        c.next_day = true;
        let payload = c.update(&ctx()).await.unwrap();
        assert!(payload.valid_tomorrow().is_some());
    }

    #[tokio::test]
    async fn test_auth_failure_is_classified() {
        let mut c = Scripted::ok(vec!["1"]);
        c.auth = Err(|| FetchError::HttpStatus {
            status: 400,
            url: "token".into(),
        });
        let err = c.update(&ctx()).await.unwrap_err();
        assert!(matches!(err, FetchError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_auth_disconnect_stays_transient() {
        let mut c = Scripted::ok(vec!["1"]);
        c.auth = Err(|| FetchError::TransientServer("disconnected".into()));
        let err = c.update(&ctx()).await.unwrap_err();
        assert!(err.is_transient());
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogSink(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogSink {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    async fn auth_failure_log(auth: fn() -> FetchError) -> (FetchError, String) {
        let sink = LogSink::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut c = Scripted::ok(vec!["1"]);
        c.auth = Err(auth);
        let err = c.update(&ctx()).await.unwrap_err();
        (err, sink.contents())
    }

    #[tokio::test]
    async fn test_auth_failure_log_uses_returned_classification() {
        let (err, logs) =
            auth_failure_log(|| FetchError::TransientServer("disconnected".into())).await;
        assert_eq!(err.classification(), "transient_server_error");
        assert!(logs.contains("Couldn't authorise against provider API"));
        assert!(logs.contains("transient_server_error"));
        assert!(!logs.contains("authentication_failure"));

        let (err, logs) = auth_failure_log(|| FetchError::HttpStatus {
            status: 401,
            url: "token".into(),
        })
        .await;
        assert_eq!(err.classification(), "authentication_failure");
        assert!(logs.contains("authentication_failure"));
    }

    #[tokio::test]
    async fn test_no_meters() {
        let err = Scripted::ok(vec![]).update(&ctx()).await.unwrap_err();
        assert!(matches!(err, FetchError::NoMeters));
    }

    #[tokio::test]
    async fn test_failed_meter_is_skipped() {
        let mut c = Scripted::ok(vec!["1", "2"]);
        c.readings.insert("2", Err(|| FetchError::HttpStatus {
            status: 404,
            url: "data".into(),
        }));
        let payload = c.update(&ctx()).await.unwrap();
        assert_eq!(payload.today.len(), 1);
    }

    #[tokio::test]
    async fn test_all_meters_failing_is_empty_payload() {
        let mut c = Scripted::ok(vec!["1"]);
        c.readings.insert("1", Err(|| FetchError::InvalidResponse("bad".into())));
        let err = c.update(&ctx()).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyPayload));
    }

    #[tokio::test]
    async fn test_transient_meter_error_aborts() {
        let mut c = Scripted::ok(vec!["1", "2"]);
        c.readings.insert("1", Err(|| FetchError::TransientServer("reset".into())));
        let err = c.update(&ctx()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken::new("super-secret");
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
        assert_eq!(token.secret(), "super-secret");
    }
}
