use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::errors::{AppError, Fault};
use crate::models::{RequestContext, Verdict, VerificationRequest};
use crate::orchestrator::Orchestrator;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Verification pipeline shared by all requests.
    pub orchestrator: Orchestrator,
}

/// Health check endpoint.
///
/// Returns the service status and version.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/blacklist/verify
///
/// Verifies an identification against the defraudadores, restringido and
/// externas lists and returns the consolidated verdict.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `body` - JSON `VerificationRequest`.
///
/// # Returns
///
/// * `Result<Json<Verdict>, Fault>` - The verdict, or a fault carrying its own HTTP status.
pub async fn verify_blacklist(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Verdict>, Fault> {
    let context = RequestContext::generate();
    tracing::info!(
        "POST /blacklist/verify - transaction_id: {}",
        context.transaction_id
    );

    let request = parse_request(&body)?;
    let verdict = state.orchestrator.handle(&request, &context).await?;

    Ok(Json(verdict))
}

/// Decodes the request body, distinguishing an empty body from malformed JSON.
fn parse_request(body: &[u8]) -> Result<VerificationRequest, Fault> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::EmptyRequest.to_fault());
    }

    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("Malformed verification request: {}", e);
        AppError::Validation(format!("Request inválido o ausente: {}", e)).to_fault()
    })
}

/// Verification API routes, without middleware.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/blacklist/verify", post(verify_blacklist))
}

/// Full route table: health check plus the verification API.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes())
}
