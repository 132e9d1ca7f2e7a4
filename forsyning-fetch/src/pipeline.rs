//! Pipeline that tries the connectors for a provider selector in order.
//!
//! The first connector that returns today's data wins. A transient server
//! error stops the pipeline immediately so the caller can schedule a retry;
//! any other failure falls through to the next connector.

use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use forsyning_core::ConnectorPayload;

use crate::connector::Connector;
use crate::context::FetchContext;
use crate::error::FetchError;

// ============================================================================
// Connector Attempt
// ============================================================================

/// Record of a single connector attempt.
#[derive(Debug, Clone)]
pub struct ConnectorAttempt {
    /// The connector that was attempted.
    pub connector_id: String,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Error classification if the attempt failed.
    pub classification: Option<&'static str>,
    /// Error message if the attempt failed.
    pub error: Option<String>,
    /// How long the attempt took.
    pub duration: Duration,
}

impl ConnectorAttempt {
    fn success(connector_id: &str, duration: Duration) -> Self {
        Self {
            connector_id: connector_id.to_string(),
            success: true,
            classification: None,
            error: None,
            duration,
        }
    }

    fn failure(connector_id: &str, error: &FetchError, duration: Duration) -> Self {
        Self {
            connector_id: connector_id.to_string(),
            success: false,
            classification: Some(error.classification()),
            error: Some(error.to_string()),
            duration,
        }
    }
}

// ============================================================================
// Pipeline Outcome
// ============================================================================

/// The outcome of a pipeline execution.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// The payload, or the error that ended the run.
    pub result: Result<ConnectorPayload, FetchError>,
    /// All attempts made.
    pub attempts: Vec<ConnectorAttempt>,
    /// Total duration of all attempts.
    pub duration: Duration,
}

impl PipelineOutcome {
    /// Returns true if a connector produced today's data.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the number of connectors that were tried.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns the id of the connector that succeeded, if any.
    pub fn successful_connector(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|p| p.connector_id.as_str())
    }

    /// Returns all error messages that occurred.
    pub fn errors(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_deref())
            .collect()
    }
}

// ============================================================================
// Connector Pipeline
// ============================================================================

/// Ordered list of connectors serving one provider selector.
pub struct ConnectorPipeline {
    selector: String,
    connectors: Vec<Box<dyn Connector>>,
}

impl ConnectorPipeline {
    /// Creates a pipeline for `selector` with connectors in the given order.
    pub fn new(selector: impl Into<String>, connectors: Vec<Box<dyn Connector>>) -> Self {
        Self {
            selector: selector.into(),
            connectors,
        }
    }

    /// Creates an unnamed pipeline, mostly for tests and one-off fetches.
    pub fn with_connectors(connectors: Vec<Box<dyn Connector>>) -> Self {
        Self::new("", connectors)
    }

    /// Returns the selector this pipeline serves.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Returns the number of connectors.
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Returns true if no connector serves the selector.
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Returns the connector ids in order.
    pub fn connector_ids(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.id()).collect()
    }

    /// Runs connectors in order until one returns today's data.
    #[instrument(skip(self, ctx), fields(selector = %self.selector, connectors = self.connectors.len()))]
    pub async fn execute(&self, ctx: &FetchContext) -> PipelineOutcome {
        let start = Instant::now();
        let mut attempts = Vec::new();

        if self.connectors.is_empty() {
            warn!("No connectors configured");
            return PipelineOutcome {
                result: Err(FetchError::NoConnectors(self.selector.clone())),
                attempts,
                duration: start.elapsed(),
            };
        }

        let mut last_error = None;

        for connector in &self.connectors {
            let id = connector.id();
            let attempt_start = Instant::now();
            debug!(connector = %id, "Executing connector");

            match connector.update(ctx).await {
                Ok(payload) if payload.has_today() => {
                    let duration = attempt_start.elapsed();
                    info!(connector = %id, duration = ?duration, "Connector succeeded");
                    attempts.push(ConnectorAttempt::success(id, duration));
                    return PipelineOutcome {
                        result: Ok(payload),
                        attempts,
                        duration: start.elapsed(),
                    };
                }
                Ok(_) => {
                    let error = FetchError::EmptyPayload;
                    debug!(connector = %id, "Connector returned no data for today");
                    attempts.push(ConnectorAttempt::failure(id, &error, attempt_start.elapsed()));
                    last_error = Some(error);
                }
                Err(error) => {
                    let duration = attempt_start.elapsed();
                    warn!(
                        connector = %id,
                        classification = error.classification(),
                        error = %error,
                        duration = ?duration,
                        "Connector failed"
                    );
                    attempts.push(ConnectorAttempt::failure(id, &error, duration));

                    if error.is_transient() {
                        debug!(connector = %id, "Transient failure, not falling through");
                        return PipelineOutcome {
                            result: Err(error),
                            attempts,
                            duration: start.elapsed(),
                        };
                    }
                    last_error = Some(error);
                }
            }
        }

        warn!("All connectors failed");
        PipelineOutcome {
            result: Err(last_error.unwrap_or(FetchError::EmptyPayload)),
            attempts,
            duration: start.elapsed(),
        }
    }
}

impl std::fmt::Debug for ConnectorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorPipeline")
            .field("selector", &self.selector)
            .field("connectors", &self.connector_ids())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::AccessToken;
    use async_trait::async_trait;
    use forsyning_core::{MeterId, MeterReading, MeterReadings};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Succeed,
        Empty,
        Fail(fn() -> FetchError),
    }

    struct MockConnector {
        id: &'static str,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl MockConnector {
        fn boxed(id: &'static str, behaviour: Behaviour) -> (Box<dyn Connector>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let connector = Self {
                id,
                behaviour,
                calls: Arc::clone(&calls),
            };
            (Box::new(connector), calls)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        fn id(&self) -> &str {
            self.id
        }

        async fn authenticate(&self, _ctx: &FetchContext) -> Result<AccessToken, FetchError> {
            Ok(AccessToken::new("t"))
        }

        async fn discover_meters(
            &self,
            _ctx: &FetchContext,
            _token: &AccessToken,
        ) -> Result<Vec<MeterId>, FetchError> {
            Ok(vec![MeterId::from("m")])
        }

        async fn fetch(
            &self,
            _ctx: &FetchContext,
            _meter: &MeterId,
            _token: &AccessToken,
        ) -> Result<MeterReading, FetchError> {
            Ok(MeterReading::new())
        }

        async fn update(&self, _ctx: &FetchContext) -> Result<ConnectorPayload, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Succeed => {
                    let today: MeterReadings =
                        std::iter::once((MeterId::from("m"), MeterReading::new())).collect();
                    Ok(ConnectorPayload::today_only(self.id, today))
                }
                Behaviour::Empty => Ok(ConnectorPayload::today_only(self.id, MeterReadings::new())),
                Behaviour::Fail(f) => Err(f()),
            }
        }
    }

    fn ctx() -> FetchContext {
        FetchContext::new().unwrap()
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let pipeline = ConnectorPipeline::new("Nowhere", Vec::new());
        let outcome = pipeline.execute(&ctx()).await;

        assert!(!outcome.is_success());
        assert!(matches!(outcome.result, Err(FetchError::NoConnectors(ref s)) if s == "Nowhere"));
        assert_eq!(outcome.attempts_count(), 0);
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let (first, _) = MockConnector::boxed("first", Behaviour::Succeed);
        let (second, second_calls) = MockConnector::boxed("second", Behaviour::Succeed);
        let pipeline = ConnectorPipeline::with_connectors(vec![first, second]);

        let outcome = pipeline.execute(&ctx()).await;

        assert_eq!(outcome.successful_connector(), Some("first"));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallthrough_on_auth_failure() {
        let (first, _) = MockConnector::boxed(
            "first",
            Behaviour::Fail(|| FetchError::AuthenticationFailed("nope".into())),
        );
        let (second, _) = MockConnector::boxed("second", Behaviour::Succeed);
        let pipeline = ConnectorPipeline::with_connectors(vec![first, second]);

        let outcome = pipeline.execute(&ctx()).await;

        assert_eq!(outcome.successful_connector(), Some("second"));
        assert_eq!(outcome.attempts_count(), 2);
        assert_eq!(outcome.attempts[0].classification, Some("authentication_failure"));
    }

    #[tokio::test]
    async fn test_empty_payload_falls_through() {
        let (first, _) = MockConnector::boxed("first", Behaviour::Empty);
        let (second, _) = MockConnector::boxed("second", Behaviour::Succeed);
        let pipeline = ConnectorPipeline::with_connectors(vec![first, second]);

        let outcome = pipeline.execute(&ctx()).await;
        assert_eq!(outcome.successful_connector(), Some("second"));
    }

    #[tokio::test]
    async fn test_transient_error_stops_pipeline() {
        let (first, _) = MockConnector::boxed(
            "first",
            Behaviour::Fail(|| FetchError::TransientServer("disconnected".into())),
        );
        let (second, second_calls) = MockConnector::boxed("second", Behaviour::Succeed);
        let pipeline = ConnectorPipeline::with_connectors(vec![first, second]);

        let outcome = pipeline.execute(&ctx()).await;

        assert!(matches!(outcome.result, Err(FetchError::TransientServer(_))));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_fail_returns_last_error() {
        let (first, _) = MockConnector::boxed(
            "first",
            Behaviour::Fail(|| FetchError::AuthenticationFailed("a".into())),
        );
        let (second, _) = MockConnector::boxed("second", Behaviour::Fail(|| FetchError::NoMeters));
        let pipeline = ConnectorPipeline::with_connectors(vec![first, second]);

        let outcome = pipeline.execute(&ctx()).await;

        assert!(matches!(outcome.result, Err(FetchError::NoMeters)));
        assert_eq!(outcome.errors().len(), 2);
    }
}
