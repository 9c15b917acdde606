//! Event envelope ingestion.
//!
//! Every store request is acknowledged with a fresh event id before anything
//! is validated, the way a real ingest endpoint accepts first and processes
//! later. Protocol violations are recorded as test failures instead of being
//! returned to the client. Only transport-level breakage (undecodable bodies)
//! and unparseable envelopes are rejected.

use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::*;
use mini_sentry_core::{
    transport::{decode_body, is_envelope_content_type},
    Envelope,
};
use uuid::Uuid;

use crate::{
    config::MockConfig, error::MockError, failures::TestFailures, project_configs::ProjectId,
    protocol::StoreResponse,
};

/// Route pattern for store requests to projects the mock does not serve.
pub const UNKNOWN_PROJECT_ROUTE: &str = "/api/<project>/store/";

/// An envelope delivered to the store project.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedEnvelope {
    pub project_id: ProjectId,
    pub envelope: Envelope,
    pub received_at: DateTime<Utc>,
}

/// Where a store request for a given project selector ends up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestRoute {
    /// The project whose events are captured.
    Store(ProjectId),
    /// Events here mean the system under test reported an error about itself.
    InternalError(ProjectId),
    Unknown(String),
}

impl IngestRoute {
    /// Route pattern used for hit counting and failure context.
    pub fn pattern(&self) -> String {
        match self {
            IngestRoute::Store(id) | IngestRoute::InternalError(id) => {
                format!("/api/{id}/store/")
            }
            IngestRoute::Unknown(_) => UNKNOWN_PROJECT_ROUTE.to_owned(),
        }
    }
}

/// Headers of a store request relevant to ingestion.
#[derive(Clone, Copy, Debug)]
pub struct StoreHeaders<'a> {
    pub content_encoding: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

#[derive(Clone)]
pub struct IngestService {
    store_project_id: ProjectId,
    internal_error_project_id: ProjectId,
    captured_sender: Sender<CapturedEnvelope>,
    failures: TestFailures,
}

impl IngestService {
    pub fn new(
        config: &MockConfig,
        captured_sender: Sender<CapturedEnvelope>,
        failures: TestFailures,
    ) -> Self {
        Self {
            store_project_id: config.store_project_id,
            internal_error_project_id: config.internal_error_project_id,
            captured_sender,
            failures,
        }
    }

    /// Resolves the project selector from the request path.
    ///
    /// The served projects only match their canonical decimal form, so
    /// `042` or `+42` end up as unknown projects.
    pub fn route(&self, project: &str) -> IngestRoute {
        if project == self.store_project_id.to_string() {
            IngestRoute::Store(self.store_project_id)
        } else if project == self.internal_error_project_id.to_string() {
            IngestRoute::InternalError(self.internal_error_project_id)
        } else {
            IngestRoute::Unknown(project.to_owned())
        }
    }

    /// Accepts an event submission and returns a fresh event id.
    pub fn store_event(
        &self,
        route: &IngestRoute,
        headers: StoreHeaders<'_>,
        body: &[u8],
    ) -> Result<StoreResponse, MockError> {
        match route {
            IngestRoute::Store(project_id) => self.capture(*project_id, route, headers, body)?,
            IngestRoute::InternalError(_) => self.failures.record(
                route.pattern(),
                MockError::InternalErrorEvent(String::from_utf8_lossy(body).into_owned()),
            ),
            IngestRoute::Unknown(project) => self
                .failures
                .record(route.pattern(), MockError::UnknownProject(project.clone())),
        }

        Ok(StoreResponse {
            event_id: Uuid::new_v4().simple().to_string(),
        })
    }

    fn capture(
        &self,
        project_id: ProjectId,
        route: &IngestRoute,
        headers: StoreHeaders<'_>,
        body: &[u8],
    ) -> Result<(), MockError> {
        let data = decode_body(headers.content_encoding, body)
            .map_err(|e| MockError::BadTransport(e.to_string()))?;

        if !is_envelope_content_type(headers.content_type) {
            self.failures.record(
                route.pattern(),
                MockError::UnexpectedContentType(headers.content_type.map(str::to_owned)),
            );
            return Ok(());
        }

        let envelope = Envelope::parse(&data).map_err(|e| {
            let error = MockError::InvalidEnvelope(e.to_string());
            self.failures.record(route.pattern(), error.clone());
            error
        })?;

        debug!(
            "captured envelope {:?} with {} items for project {}",
            envelope.event_id(),
            envelope.items().len(),
            project_id
        );
        let captured = CapturedEnvelope {
            project_id,
            envelope,
            received_at: Utc::now(),
        };
        if self.captured_sender.send(captured).is_err() {
            warn!("captured events consumer is gone, dropping envelope");
        }
        Ok(())
    }
}

/// Consumer side of the capture queue, owned by the test driver.
pub struct CapturedEvents(Receiver<CapturedEnvelope>);

impl CapturedEvents {
    pub fn new(receiver: Receiver<CapturedEnvelope>) -> Self {
        Self(receiver)
    }

    /// Waits up to `timeout` for the next captured envelope.
    pub fn next(&self, timeout: Duration) -> Option<CapturedEnvelope> {
        match self.0.recv_timeout(timeout) {
            Ok(captured) => Some(captured),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_next(&self) -> Option<CapturedEnvelope> {
        self.0.try_recv().ok()
    }

    /// Takes every envelope that is queued right now.
    pub fn drain(&self) -> Vec<CapturedEnvelope> {
        self.0.try_iter().collect()
    }

    /// Blocks until the queue is closed, yielding envelopes as they arrive.
    pub fn iter(&self) -> impl Iterator<Item = CapturedEnvelope> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use flate2::{write::GzEncoder, Compression};
    use mini_sentry_core::{envelope::ITEM_TYPE_EVENT, Envelope, Item, ENVELOPE_CONTENT_TYPE};

    use crate::{
        config::MockConfig,
        error::MockError,
        failures::TestFailures,
        ingestion::{CapturedEvents, IngestRoute, IngestService, StoreHeaders},
    };

    fn service() -> (IngestService, CapturedEvents, TestFailures) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let failures = TestFailures::default();
        (
            IngestService::new(&MockConfig::default(), sender, failures.clone()),
            CapturedEvents::new(receiver),
            failures,
        )
    }

    fn envelope_bytes() -> Vec<u8> {
        let mut envelope = Envelope::with_event_id("9ec79c33ec9942ab8353589fcb2e04dc");
        envelope.add_item(Item::new(ITEM_TYPE_EVENT, "{\"message\":\"hello\"}"));
        envelope.to_vec().unwrap()
    }

    fn envelope_headers(content_encoding: Option<&str>) -> StoreHeaders<'_> {
        StoreHeaders {
            content_encoding,
            content_type: Some(ENVELOPE_CONTENT_TYPE),
        }
    }

    #[test]
    fn test_routes() {
        let (service, _, _) = service();
        assert_eq!(service.route("42"), IngestRoute::Store(42));
        assert_eq!(service.route("666"), IngestRoute::InternalError(666));
        assert_eq!(service.route("43"), IngestRoute::Unknown("43".to_owned()));
        assert_eq!(service.route("abc"), IngestRoute::Unknown("abc".to_owned()));
        for alias in ["042", "+42", "42 ", "0666"] {
            assert_eq!(service.route(alias), IngestRoute::Unknown(alias.to_owned()));
        }
        assert_eq!(IngestRoute::Store(42).pattern(), "/api/42/store/");
        assert_eq!(
            IngestRoute::Unknown("43".to_owned()).pattern(),
            "/api/<project>/store/"
        );
    }

    #[test]
    fn test_gzip_and_plain_capture_the_same_envelope() {
        let (service, captured, failures) = service();
        let body = envelope_bytes();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body).unwrap();
        let gzipped = encoder.finish().unwrap();

        let route = service.route("42");
        let first = service
            .store_event(&route, envelope_headers(None), &body)
            .unwrap();
        let second = service
            .store_event(&route, envelope_headers(Some("gzip")), &gzipped)
            .unwrap();
        assert_ne!(first.event_id, second.event_id);

        let plain = captured.next(Duration::from_secs(1)).unwrap();
        let decompressed = captured.next(Duration::from_secs(1)).unwrap();
        assert_eq!(plain.envelope, decompressed.envelope);
        assert_eq!(plain.project_id, 42);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_corrupt_gzip_is_rejected() {
        let (service, captured, _) = service();
        let err = service
            .store_event(
                &IngestRoute::Store(42),
                envelope_headers(Some("gzip")),
                b"not gzip",
            )
            .unwrap_err();
        assert!(matches!(err, MockError::BadTransport(_)));
        assert!(captured.is_empty());
    }

    #[test]
    fn test_wrong_content_type_is_deferred() {
        let (service, captured, failures) = service();
        let headers = StoreHeaders {
            content_encoding: None,
            content_type: Some("application/json"),
        };
        let response = service.store_event(&IngestRoute::Store(42), headers, &envelope_bytes());

        assert!(response.is_ok());
        assert!(captured.is_empty());
        let recorded = failures.take();
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].error,
            MockError::UnexpectedContentType(Some("application/json".to_owned()))
        );
    }

    #[test]
    fn test_invalid_envelope_is_rejected_and_recorded() {
        let (service, _, failures) = service();
        let err = service
            .store_event(&IngestRoute::Store(42), envelope_headers(None), b"garbage\n")
            .unwrap_err();
        assert!(matches!(err, MockError::InvalidEnvelope(_)));
        assert_eq!(failures.snapshot().len(), 1);
    }

    #[test]
    fn test_other_projects_are_acknowledged_and_recorded() {
        let (service, captured, failures) = service();

        let route = service.route("666");
        assert!(service
            .store_event(&route, envelope_headers(None), b"oops")
            .is_ok());
        let route = service.route("43");
        assert!(service
            .store_event(&route, envelope_headers(None), &envelope_bytes())
            .is_ok());

        assert!(captured.is_empty());
        let recorded = failures.take();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].context, "/api/666/store/");
        assert_eq!(
            recorded[0].error,
            MockError::InternalErrorEvent("oops".to_owned())
        );
        assert_eq!(recorded[1].error, MockError::UnknownProject("43".to_owned()));
    }
}
