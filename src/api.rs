//! HTTP API for upgrade-risk predictions

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::debug;
use uuid::Uuid;

use crate::inference::InferenceClient;
use crate::models::UpgradeRiskResponse;
use crate::telemetry::TelemetryClient;
use crate::{Error, metrics, urls};

/// Shared state injected into every handler
#[derive(Clone)]
pub struct AppState {
    /// Query orchestrator for the telemetry backend
    pub telemetry: Arc<TelemetryClient>,
    /// Scoring service client
    pub inference: Arc<InferenceClient>,
    /// Prometheus render handle for `/metrics`
    pub metrics_handle: Option<PrometheusHandle>,
}

/// Batch prediction request body
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    /// Clusters to predict for
    pub clusters: Vec<Uuid>,
}

/// Batch prediction response; clusters the telemetry backend had no rows
/// for are omitted.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    /// Per-cluster verdicts
    pub predictions: HashMap<Uuid, UpgradeRiskResponse>,
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/cluster/{cluster_id}/upgrade-risks-prediction",
            get(predict_one),
        )
        .route("/clusters/upgrade-risks-prediction", post(predict_many))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Predict the upgrade risk for a single cluster
async fn predict_one(
    State(state): State<AppState>,
    Path(cluster_id): Path<Uuid>,
) -> Result<Json<UpgradeRiskResponse>, Error> {
    debug!(%cluster_id, "Prediction requested");
    let risk = state.telemetry.lookup_one(cluster_id).await?;
    let mut verdict = state.inference.predict(&risk.signals).await?;
    urls::fill_urls(&mut verdict, &risk.console_url);
    metrics::record_prediction(&verdict);
    metrics::record_risk_counts(&verdict);
    Ok(Json(verdict))
}

/// Predict the upgrade risk for several clusters; partial results are
/// preferred over failure, so clusters without telemetry data are left out.
async fn predict_many(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, Error> {
    debug!(clusters = request.clusters.len(), "Batch prediction requested");
    let risks = state.telemetry.lookup_many(&request.clusters).await?;

    let mut predictions = HashMap::with_capacity(risks.len());
    for (cluster_id, risk) in risks {
        let mut verdict = state.inference.predict(&risk.signals).await?;
        urls::fill_urls(&mut verdict, &risk.console_url);
        metrics::record_prediction(&verdict);
        metrics::record_risk_counts(&verdict);
        predictions.insert(cluster_id, verdict);
    }

    Ok(Json(BatchResponse { predictions }))
}

/// Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Render Prometheus metrics
async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::ClusterNotFound(_) => StatusCode::NOT_FOUND,
            Error::TokenRefresh(_) | Error::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::UpstreamStatus { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({"detail": self.to_string()}));
        (status, body).into_response()
    }
}
