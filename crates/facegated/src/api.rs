//! HTTP API.
//!
//! Endpoints:
//! - POST /liveness/create-session - Open a liveness session for the caller
//! - GET /liveness/session-results?sessionId=<id> - Poll a session
//! - POST /compare - Compare a profile image with a liveness image
//! - GET /health - Health check
//!
//! Every request must carry the identity header set by the fronting
//! authenticator, except `/health` and `OPTIONS` preflights.

use crate::cors;
use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Query, Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::{Json, Response};
use axum::routing::{get, post};
use axum::Router;
use facegate_core::{FacegateError, ImageRef, OwnerId, SessionId, SessionStatus};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionResultsQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResultsResponse {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<ImageRef>,
    pub audit_images: Vec<ImageRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    pub profile_image_key: Option<String>,
    pub liveness_image_key: Option<String>,
}

/// Field names match what the browser client reads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    pub similarity: f32,
    pub face_matches: usize,
    pub source_image_has_face: bool,
    /// Number of faces detected in the liveness image.
    pub target_image_has_faces: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/liveness/create-session", post(create_session))
        .route("/liveness/session-results", get(session_results))
        .route("/compare", post(compare))
        .layer(middleware::from_fn_with_state(state.clone(), cors::apply_cors))
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}

/// Run each request inside a span tagged with a fresh request id.
async fn trace_request(request: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        id = %uuid::Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );
    async move {
        let response = next.run(request).await;
        tracing::info!(status = response.status().as_u16(), "request complete");
        response
    }
    .instrument(span)
    .await
}

fn require_identity(state: &AppState, headers: &HeaderMap) -> Result<OwnerId, ApiError> {
    state.identity(headers).ok_or_else(|| {
        tracing::warn!("request without verified identity");
        ApiError::unauthenticated()
    })
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.services().backend.to_string(),
    })
}

async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    const ACTION: &str = "create liveness session";
    let owner = require_identity(&state, &headers)?;
    tracing::info!(owner = %owner, "create session requested");

    let session_id = state
        .services()
        .sessions
        .create_session(&owner)
        .await
        .map_err(|e| ApiError::from_core(ACTION, e))?;

    Ok(Json(CreateSessionResponse {
        session_id: session_id.to_string(),
    }))
}

async fn session_results(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SessionResultsQuery>,
) -> Result<Json<SessionResultsResponse>, ApiError> {
    const ACTION: &str = "get liveness session results";
    let owner = require_identity(&state, &headers)?;

    let session_id = SessionId::new(query.session_id.unwrap_or_default())
        .map_err(|e| ApiError::from_core(ACTION, e))?;

    let session = state
        .services()
        .poller
        .get_owned_results(&owner, &session_id)
        .await
        .map_err(|e| ApiError::from_core(ACTION, e))?;

    Ok(Json(SessionResultsResponse {
        status: session.status,
        confidence: session.confidence,
        reference_image: session.reference_image,
        audit_images: session.audit_images,
    }))
}

/// Parse the compare body, naming every missing key.
fn parse_compare_request(body: &[u8]) -> Result<(String, String), FacegateError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(FacegateError::Validation("Request body is required".into()));
    }
    let request: CompareRequest = serde_json::from_slice(body).map_err(|e| {
        FacegateError::Validation(format!("Request body must be a JSON object: {e}"))
    })?;

    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let profile = present(request.profile_image_key);
    let liveness = present(request.liveness_image_key);

    match (profile, liveness) {
        (Some(profile), Some(liveness)) => Ok((profile, liveness)),
        (profile, liveness) => {
            let mut missing = Vec::new();
            if profile.is_none() {
                missing.push("profileImageKey");
            }
            if liveness.is_none() {
                missing.push("livenessImageKey");
            }
            Err(FacegateError::missing_fields(&missing))
        }
    }
}

async fn compare(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CompareResponse>, ApiError> {
    const ACTION: &str = "compare faces";
    let owner = require_identity(&state, &headers)?;
    let (profile_key, liveness_key) =
        parse_compare_request(&body).map_err(|e| ApiError::from_core(ACTION, e))?;

    let result = state
        .services()
        .comparator
        .compare(&owner, &profile_key, &liveness_key)
        .await
        .map_err(|e| ApiError::from_core(ACTION, e))?;

    Ok(Json(CompareResponse {
        similarity: result.similarity,
        face_matches: result.face_match_count,
        source_image_has_face: result.source_has_face,
        target_image_has_faces: result.target_face_count,
    }))
}

/// Run the API server until `shutdown` resolves.
pub async fn run_server(
    addr: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "facegated listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compare_both_missing() {
        let err = parse_compare_request(b"{}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "profileImageKey and livenessImageKey are required"
        );
    }

    #[test]
    fn test_parse_compare_one_missing() {
        let err = parse_compare_request(br#"{"profileImageKey": "profileImages/u/x.jpg"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "livenessImageKey is required");
    }

    #[test]
    fn test_parse_compare_blank_counts_as_missing() {
        let err = parse_compare_request(
            br#"{"profileImageKey": "  ", "livenessImageKey": "livenessImages/u/x.jpg"}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "profileImageKey is required");
    }

    #[test]
    fn test_parse_compare_empty_body() {
        let err = parse_compare_request(b"").unwrap_err();
        assert_eq!(err.to_string(), "Request body is required");
    }

    #[test]
    fn test_parse_compare_not_json() {
        assert!(matches!(
            parse_compare_request(b"profile=x"),
            Err(FacegateError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_compare_ok() {
        let (profile, liveness) = parse_compare_request(
            br#"{"profileImageKey": "profileImages/u/p.jpg", "livenessImageKey": "livenessImages/u/l.jpg"}"#,
        )
        .unwrap();
        assert_eq!(profile, "profileImages/u/p.jpg");
        assert_eq!(liveness, "livenessImages/u/l.jpg");
    }
}
