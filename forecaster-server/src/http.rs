//! Forecaster HTTP REST API
//!
//! Axum-based HTTP server exposing the prediction pipeline and the stored
//! prediction history.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /                             — service index
//! - GET  /health                       — health check with DB status
//! - GET  /api/models                   — available predictors
//! - GET  /api/predictions?limit=N      — recent predictions, newest first
//! - POST /api/predictions/bayesian     — bayesian resistance prediction
//! - POST /api/predictions/evolutionary — evolutionary emergence prediction
//! - GET  /api/graphs/:id               — stored chart with rendered SVG

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use forecaster_core::models::{NewPrediction, PredictionKind, PredictionRequest, PredictionResult};
use forecaster_core::{store, validate, Forecaster, ForecasterConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub const DEFAULT_LIST_LIMIT: i64 = 10;
pub const MAX_LIST_LIMIT: i64 = 100;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: SqlitePool,
    pub config: ForecasterConfig,
    pub forecaster: Forecaster,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/models", get(models_handler))
        .route("/api/predictions", get(list_handler))
        .route("/api/predictions/bayesian", post(bayesian_handler))
        .route("/api/predictions/evolutionary", post(evolutionary_handler))
        .route("/api/graphs/:id", get(graph_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    pool: SqlitePool,
    config: ForecasterConfig,
    forecaster: Forecaster,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState {
        pool,
        config,
        forecaster,
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Forecaster HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    pub fn body(msg: impl Into<String>) -> Value {
        json!(Self::new(msg))
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner index — endpoint listing (pure, no IO).
pub fn index_inner() -> Value {
    json!({
        "message": "Resistance Forecaster API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "models": "GET /api/models",
            "predictions": {
                "list": "GET /api/predictions?limit=N",
                "bayesian": "POST /api/predictions/bayesian",
                "evolutionary": "POST /api/predictions/evolutionary",
            },
            "graphs": "GET /api/graphs/{graph_id}",
        },
    })
}

/// Inner models — the two predictors and their inputs (pure, no IO).
pub fn models_inner() -> Value {
    json!({
        "models": [
            {
                "id": PredictionKind::Bayesian.as_str(),
                "name": "Bayesian resistance model",
                "description": "Vancomycin and ceftaroline resistance probabilities from mecA and PBP2a mutation lists, with LLM reasoning and a deterministic fallback.",
                "inputs": [
                    "mecAMutations",
                    "pbp2aMutations",
                    "vancomycinResistanceProfile",
                    "ceftarolineResistanceProfile",
                ],
            },
            {
                "id": PredictionKind::Evolutionary.as_str(),
                "name": "Evolutionary resistance predictor",
                "description": "Resistance emergence estimate from free-text mutation patterns and evolutionary trajectories, with contribution and co-occurrence charts.",
                "inputs": [
                    "mutationPatterns",
                    "evolutionaryTrajectories",
                    "existingKnowledge",
                ],
            },
        ],
    })
}

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(pool: &SqlitePool) -> (StatusCode, Value) {
    match forecaster_core::db::health_check(pool).await {
        Ok(version) => (
            StatusCode::OK,
            json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "database": format!("sqlite {}", version),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                }),
            )
        }
    }
}

/// Inner predict — validate, predict (never fails), persist, respond.
pub async fn predict_inner(
    pool: &SqlitePool,
    forecaster: &Forecaster,
    kind: PredictionKind,
    payload: Value,
) -> (StatusCode, Value) {
    let request = match kind {
        PredictionKind::Bayesian => {
            validate::validate_bayesian(&payload).map(PredictionRequest::Bayesian)
        }
        PredictionKind::Evolutionary => {
            validate::validate_evolutionary(&payload).map(PredictionRequest::Evolutionary)
        }
    };

    let request = match request {
        Ok(r) => r,
        Err(e) => {
            tracing::info!(kind = %kind, field = %e.field, "Rejected prediction request: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": e.message,
                    "field": e.field,
                    "status": "error",
                }),
            );
        }
    };

    let mut result = forecaster.predict(&request).await;

    let saved = store::save(
        pool,
        &NewPrediction {
            input: &request,
            output: &result,
        },
    )
    .await;

    match saved {
        Ok(id) => {
            match store::chart_ids(pool, id).await {
                Ok(ids) => attach_chart_ids(&mut result, &ids),
                Err(e) => tracing::warn!(prediction_id = id, error = %e, "Could not load chart ids"),
            }
            (StatusCode::OK, prediction_body(Some(id), &result))
        }
        Err(e) => {
            tracing::error!(kind = %kind, error = %e, "Failed to persist prediction");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": format!("Failed to persist prediction: {}", e),
                    "status": "error",
                    "prediction": prediction_body(None, &result),
                }),
            )
        }
    }
}

/// Inner list — recent predictions, newest first.
pub async fn list_inner(pool: &SqlitePool, query: ListQuery) -> (StatusCode, Value) {
    let limit = effective_limit(query.limit);
    match store::list_recent(pool, limit).await {
        Ok(predictions) => (StatusCode::OK, json!({ "predictions": predictions })),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load predictions");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::body(format!("Failed to load predictions: {}", e)),
            )
        }
    }
}

/// Inner graph — stored chart by id, 404 when absent.
pub async fn graph_inner(pool: &SqlitePool, id: i64) -> (StatusCode, Value) {
    match store::get_chart(pool, id).await {
        Ok(Some(graph)) => (StatusCode::OK, json!({ "graph": graph })),
        Ok(None) => (StatusCode::NOT_FOUND, ErrorResponse::body("Graph not found")),
        Err(e) => {
            tracing::error!(graph_id = id, error = %e, "Failed to load graph");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::body(format!("Failed to load graph: {}", e)),
            )
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn index_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(index_inner()))
}

pub async fn models_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(models_inner()))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn bayesian_handler(
    State(state): State<Arc<HttpState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let (status, body) =
        predict_inner(&state.pool, &state.forecaster, PredictionKind::Bayesian, payload).await;
    (status, Json(body))
}

pub async fn evolutionary_handler(
    State(state): State<Arc<HttpState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let (status, body) =
        predict_inner(&state.pool, &state.forecaster, PredictionKind::Evolutionary, payload).await;
    (status, Json(body))
}

pub async fn list_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let (status, body) = list_inner(&state.pool, query).await;
    (status, Json(body))
}

pub async fn graph_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = graph_inner(&state.pool, id).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Default 10, clamped to 1..=100.
pub fn effective_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

/// Stored chart ids, paired with the result's charts by position.
pub fn attach_chart_ids(result: &mut PredictionResult, ids: &[i64]) {
    for (chart, id) in result.charts_mut().iter_mut().zip(ids) {
        chart.id = Some(*id);
    }
}

/// `{id, kind, ...result}`; `id` is omitted when the prediction was not stored.
pub fn prediction_body(id: Option<i64>, result: &PredictionResult) -> Value {
    let mut body = match serde_json::to_value(result) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => serde_json::Map::new(),
    };
    if let Some(id) = id {
        body.insert("id".to_string(), json!(id));
    }
    Value::Object(body)
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use forecaster_core::models::EvolutionaryRequest;
    use forecaster_core::predict::evolutionary;

    fn sample_result() -> PredictionResult {
        PredictionResult::Evolutionary(evolutionary::fallback(&EvolutionaryRequest {
            mutation_patterns: "mecA(G246E), PBP2a(V311A)".to_string(),
            evolutionary_trajectories: "beta-lactam exposure".to_string(),
            existing_knowledge: None,
        }))
    }

    #[test]
    fn test_index_inner_lists_endpoints() {
        let v = index_inner();
        assert!(v["version"].is_string());
        assert_eq!(
            v["endpoints"]["predictions"]["bayesian"],
            "POST /api/predictions/bayesian"
        );
    }

    #[test]
    fn test_models_inner_has_both_predictors() {
        let v = models_inner();
        let ids: Vec<&str> = v["models"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["bayesian", "evolutionary"]);
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(None), 10);
        assert_eq!(effective_limit(Some(25)), 25);
        assert_eq!(effective_limit(Some(1000)), 100);
        assert_eq!(effective_limit(Some(0)), 1);
        assert_eq!(effective_limit(Some(-5)), 1);
    }

    #[test]
    fn test_prediction_body_flattens_result() {
        let body = prediction_body(Some(42), &sample_result());
        assert_eq!(body["id"], 42);
        assert_eq!(body["kind"], "evolutionary");
        assert!(body["resistancePrediction"].is_string());
        assert_eq!(body["charts"].as_array().unwrap().len(), 2);

        let unsaved = prediction_body(None, &sample_result());
        assert!(unsaved.get("id").is_none());
    }

    #[test]
    fn test_attach_chart_ids_by_position() {
        let mut result = sample_result();
        attach_chart_ids(&mut result, &[7, 8]);
        let ids: Vec<Option<i64>> = result.charts().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![Some(7), Some(8)]);
    }

    #[test]
    fn test_error_response_shape() {
        let v = ErrorResponse::body("Graph not found");
        assert_eq!(v["error"], "Graph not found");
        assert_eq!(v["status"], "error");
    }
}
