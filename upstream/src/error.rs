//! Errors raised by the mock upstream's request handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mini_sentry_core::ErrorCode;
use serde::Serialize;
use thiserror::Error;

/// Protocol errors observed while handling relay requests.
///
/// Some of these reject the request outright. Others are deferred: the handler
/// records them as a [`TestFailure`](crate::failures::TestFailure) and still
/// acknowledges the request, so the offending client is not blocked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    #[error("unknown relay: {relay_id}")]
    UnknownRelay { relay_id: String },

    #[error("relay id header {header:?} does not match relay id {body:?} in the request body")]
    ProtocolMismatch { header: Option<String>, body: String },

    #[error("relay not registered: {}", relay_id.as_deref().unwrap_or("<missing relay id>"))]
    Unregistered { relay_id: Option<String> },

    #[error("bad transport: {0}")]
    BadTransport(String),

    #[error("relay sent us non-envelope data to store (content type {0:?})")]
    UnexpectedContentType(Option<String>),

    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("relay sent us event: {0}")]
    InternalErrorEvent(String),

    #[error("handler panicked: {0}")]
    Panic(String),

    #[error("unhandled server error with status {status}")]
    ServerError { status: u16 },
}

impl MockError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MockError::UnknownRelay { .. } => ErrorCode::UnknownRelay,
            MockError::ProtocolMismatch { .. } => ErrorCode::ProtocolMismatch,
            MockError::Unregistered { .. } => ErrorCode::Unregistered,
            MockError::BadTransport(_) => ErrorCode::BadTransport,
            MockError::UnexpectedContentType(_) => ErrorCode::UnexpectedContentType,
            MockError::UnknownProject(_) => ErrorCode::UnknownProject,
            MockError::InvalidEnvelope(_) => ErrorCode::InvalidEnvelope,
            MockError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            MockError::InternalErrorEvent(_) => ErrorCode::InternalErrorEvent,
            MockError::Panic(_) => ErrorCode::Panic,
            MockError::ServerError { .. } => ErrorCode::Unknown,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MockError::UnknownRelay { .. } | MockError::Unregistered { .. } => {
                StatusCode::FORBIDDEN
            }
            MockError::ProtocolMismatch { .. }
            | MockError::BadTransport(_)
            | MockError::InvalidEnvelope(_)
            | MockError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MockError::UnexpectedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MockError::UnknownProject(_) => StatusCode::NOT_FOUND,
            MockError::InternalErrorEvent(_) | MockError::Panic(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            MockError::ServerError { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    code: ErrorCode,
}

/// The error is also attached to the response extensions, so that layers
/// further out can tell which error produced a response.
impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
            code: self.code(),
        };
        let mut response = (self.status_code(), Json(body)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use mini_sentry_core::ErrorCode;

    use crate::error::MockError;

    #[test]
    fn test_rejections_are_forbidden() {
        let unknown = MockError::UnknownRelay {
            relay_id: "relayB".to_owned(),
        };
        assert_eq!(unknown.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(unknown.code(), ErrorCode::UnknownRelay);

        let unregistered = MockError::Unregistered { relay_id: None };
        assert_eq!(unregistered.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            unregistered.to_string(),
            "relay not registered: <missing relay id>"
        );
    }

    #[test]
    fn test_mismatch_message() {
        let err = MockError::ProtocolMismatch {
            header: Some("relayA".to_owned()),
            body: "relayB".to_owned(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "relay id header Some(\"relayA\") does not match relay id \"relayB\" in the request body"
        );
    }

    #[test]
    fn test_into_response_status() {
        use axum::response::IntoResponse;

        let response = MockError::BadTransport("corrupt gzip".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.extensions().get::<MockError>(),
            Some(&MockError::BadTransport("corrupt gzip".to_owned()))
        );
    }

    #[test]
    fn test_server_errors() {
        let panic = MockError::Panic("boom".to_owned());
        assert_eq!(panic.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(panic.code(), ErrorCode::Panic);

        let bad_gateway = MockError::ServerError { status: 502 };
        assert_eq!(bad_gateway.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(bad_gateway.code(), ErrorCode::Unknown);
    }
}
