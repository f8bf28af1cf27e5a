//! HTTP surface of the analytics service.

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::assistant;
use crate::error::AnalyticsError;
use crate::metrics::PulseEngine;
use crate::models::Pulse;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PulseResponse {
    pub status: &'static str,
    pub data: Pulse,
}

impl IntoResponse for AnalyticsError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "analytics request failed");
        let body = Json(json!({ "detail": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Routes:
/// - GET  /health
/// - GET  /api/v1/analytics/pulse
/// - POST /api/v1/analytics/query
pub fn router(engine: PulseEngine) -> Router {
    let analytics = Router::new()
        .route("/pulse", get(pulse_handler))
        .route("/query", post(query_handler))
        .with_state(engine);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1/analytics", analytics)
        .layer(cors)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "analytics" }))
}

async fn pulse_handler(
    State(engine): State<PulseEngine>,
) -> Result<Json<PulseResponse>, AnalyticsError> {
    let data = engine.pulse().await?;
    Ok(Json(PulseResponse {
        status: "success",
        data,
    }))
}

// The body is parsed whatever its content type; an empty or unparsable body is the empty query.
async fn query_handler(
    State(engine): State<PulseEngine>,
    body: Bytes,
) -> Result<Json<QueryResponse>, AnalyticsError> {
    let request: QueryRequest = serde_json::from_slice(&body).unwrap_or_default();
    let answer = assistant::route(&engine, &request.query).await?;
    Ok(Json(QueryResponse { answer }))
}
