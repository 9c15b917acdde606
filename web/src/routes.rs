//! Relay-facing HTTP routes.
//!
//! Each handler counts its hit before doing anything else, so requests that
//! are later rejected still show up in the counters.
//!
//! Every route runs behind [`record_server_errors`]: a handler that panics or
//! answers with a 5xx status leaves a test failure behind, keyed by the
//! request URI.

use std::any::Any;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{
        header::{CONTENT_ENCODING, CONTENT_TYPE},
        HeaderMap,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use log::*;
use mini_sentry_upstream::{
    ingestion::StoreHeaders,
    protocol::{
        ChallengeRequest, ChallengeResponse, ChallengeResponseRequest, ProjectConfigsRequest,
        ProjectConfigsResponse, ProjectIdsRequest, ProjectIdsResponse, PublicKeysRequest,
        PublicKeysResponse, RegisterResponse, StoreResponse, RELAY_ID_HEADER,
    },
    MockError, ServerState,
};

pub const CHALLENGE_ROUTE: &str = "/api/0/relays/register/challenge/";
pub const RESPONSE_ROUTE: &str = "/api/0/relays/register/response/";
pub const PROJECT_IDS_ROUTE: &str = "/api/0/relays/projectids/";
pub const PROJECT_CONFIGS_ROUTE: &str = "/api/0/relays/projectconfigs/";
pub const PUBLIC_KEYS_ROUTE: &str = "/api/0/relays/publickeys/";
pub const STORE_ROUTE: &str = "/api/:project/store/";

pub fn router(state: ServerState) -> Router {
    router_with(Router::new(), state)
}

/// The relay API plus `extra` routes, all behind the server error layer.
pub fn router_with(extra: Router<ServerState>, state: ServerState) -> Router {
    Router::new()
        .route(CHALLENGE_ROUTE, post(register_challenge))
        .route(RESPONSE_ROUTE, post(register_response))
        .route(PROJECT_IDS_ROUTE, post(project_ids))
        .route(PROJECT_CONFIGS_ROUTE, post(project_configs))
        .route(PUBLIC_KEYS_ROUTE, post(public_keys))
        .route(STORE_ROUTE, post(store_event))
        .merge(extra)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            record_server_errors,
        ))
        .with_state(state)
}

/// Records handler panics and 5xx responses as test failures.
async fn record_server_errors(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Response {
    let uri = request.uri().to_string();

    // the handler runs in its own task so that a panic surfaces as a JoinError
    let response = match tokio::spawn(next.run(request)).await {
        Ok(response) => response,
        Err(e) if e.is_panic() => MockError::Panic(panic_message(e.into_panic())).into_response(),
        Err(e) => MockError::Panic(e.to_string()).into_response(),
    };

    if response.status().is_server_error() {
        let error = response
            .extensions()
            .get::<MockError>()
            .cloned()
            .unwrap_or(MockError::ServerError {
                status: response.status().as_u16(),
            });
        error!("{} failed with status {}: {}", uri, response.status(), error);
        state.failures().record(uri, error);
    }
    response
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

async fn register_challenge(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Result<Json<ChallengeRequest>, JsonRejection>,
) -> Result<Json<ChallengeResponse>, MockError> {
    state.hits().hit(CHALLENGE_ROUTE);
    let request = json_body(&state, CHALLENGE_ROUTE, body)?;
    let response = state
        .registration()
        .get_challenge(request, header_str(&headers, RELAY_ID_HEADER))
        .await
        .map_err(|e| match e {
            // unknown relays are refused; a mismatched header is a broken relay
            MockError::ProtocolMismatch { .. } => record(&state, CHALLENGE_ROUTE, e),
            e => e,
        })?;
    Ok(Json(response))
}

async fn register_response(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Result<Json<ChallengeResponseRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, MockError> {
    state.hits().hit(RESPONSE_ROUTE);
    let request = json_body(&state, RESPONSE_ROUTE, body)?;
    let response = state
        .registration()
        .check_challenge(request, header_str(&headers, RELAY_ID_HEADER))
        .await
        .map_err(|e| record(&state, RESPONSE_ROUTE, e))?;
    Ok(Json(response))
}

async fn project_ids(
    State(state): State<ServerState>,
    body: Result<Json<ProjectIdsRequest>, JsonRejection>,
) -> Result<Json<ProjectIdsResponse>, MockError> {
    state.hits().hit(PROJECT_IDS_ROUTE);
    let request = json_body(&state, PROJECT_IDS_ROUTE, body)?;
    Ok(Json(state.configs().get_project_ids(request)))
}

async fn project_configs(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Result<Json<ProjectConfigsRequest>, JsonRejection>,
) -> Result<Json<ProjectConfigsResponse>, MockError> {
    state.hits().hit(PROJECT_CONFIGS_ROUTE);
    let request = json_body(&state, PROJECT_CONFIGS_ROUTE, body)?;
    let response = state
        .configs()
        .get_project_configs(header_str(&headers, RELAY_ID_HEADER), request)
        .await?;
    Ok(Json(response))
}

async fn public_keys(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Result<Json<PublicKeysRequest>, JsonRejection>,
) -> Result<Json<PublicKeysResponse>, MockError> {
    state.hits().hit(PUBLIC_KEYS_ROUTE);
    let request = json_body(&state, PUBLIC_KEYS_ROUTE, body)?;
    let response = state
        .public_keys()
        .public_keys(header_str(&headers, RELAY_ID_HEADER), request)
        .await?;
    Ok(Json(response))
}

async fn store_event(
    State(state): State<ServerState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StoreResponse>, MockError> {
    let route = state.ingest().route(&project);
    state.hits().hit(&route.pattern());

    let store_headers = StoreHeaders {
        content_encoding: header_str(&headers, CONTENT_ENCODING.as_str()),
        content_type: header_str(&headers, CONTENT_TYPE.as_str()),
    };
    let response = state.ingest().store_event(&route, store_headers, &body)?;
    debug!("stored event {} for project {}", response.event_id, project);
    Ok(Json(response))
}

/// Unwraps a JSON body; a malformed body is a protocol violation by the relay.
fn json_body<T>(
    state: &ServerState,
    route: &str,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, MockError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(record(
            state,
            route,
            MockError::InvalidRequest(rejection.body_text()),
        )),
    }
}

/// Records `error` as a test failure and hands it back for the response.
fn record(state: &ServerState, route: &str, error: MockError) -> MockError {
    state.failures().record(route, error.clone());
    error
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;

    use crate::routes::header_str;

    #[test]
    fn test_header_str() {
        let mut headers = HeaderMap::new();
        headers.insert("x-sentry-relay-id", "relayA".parse().unwrap());
        headers.insert("x-binary", axum::http::HeaderValue::from_bytes(b"\xff").unwrap());

        assert_eq!(header_str(&headers, "x-sentry-relay-id"), Some("relayA"));
        assert_eq!(header_str(&headers, "X-Sentry-Relay-Id"), Some("relayA"));
        assert_eq!(header_str(&headers, "x-binary"), None);
        assert_eq!(header_str(&headers, "x-missing"), None);
    }
}
