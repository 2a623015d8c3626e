//! HTTP surfaces for gate outcomes.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::decision::{GateOutcome, Site};
use crate::gate::AdmissionGate;

/// Screen every request through the gate's request policy.
pub async fn admission_middleware(
    State(gate): State<Arc<AdmissionGate>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let facts = gate.facts(&parts);
    match gate.check(&facts, Site::Request).await {
        GateOutcome::Allow => next.run(Request::from_parts(parts, body)).await,
        outcome => request_rejection(&outcome),
    }
}

/// Mount the request gate in front of every route of `router`.
pub fn admission_layer<S>(router: Router<S>, gate: Arc<AdmissionGate>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(gate, admission_middleware))
}

/// JSON refusal for an ordinary route.
pub fn request_rejection(outcome: &GateOutcome) -> Response {
    let status = outcome
        .status(Site::Request)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match outcome {
        GateOutcome::RateLimited { .. } => "Too many requests.",
        GateOutcome::Forbidden => "Forbidden.",
        GateOutcome::Unavailable | GateOutcome::Allow => "Service Unavailable",
    };
    let mut response = (status, Json(json!({ "error": message }))).into_response();
    if let GateOutcome::RateLimited { retry_after } = outcome {
        let secs = retry_after.as_secs_f64().ceil().max(1.0);
        if let Ok(value) = HeaderValue::from_str(&format!("{secs:.0}")) {
            let _ = response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}

/// Bare refusal for a socket upgrade. The connection is not kept alive.
pub fn upgrade_rejection(outcome: &GateOutcome) -> Response {
    let status = outcome
        .status(Site::Upgrade)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let reason = status.canonical_reason().unwrap_or("Rejected");
    let mut response = (status, reason).into_response();
    let _ = response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
