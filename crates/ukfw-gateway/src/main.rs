//! UKFW Gateway: HTTP surface for the dynamic reasoning pipeline.
//!
//! One POST runs a full reasoning task and returns its trace; persisted traces
//! stay retrievable by task id for audit.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ukfw_core::{
    OracleBridge, ProvisionCatalog, RandomSampler, ReasonerConfig, ReasoningPipeline, TraceStore,
    UkgPersonaResolver,
};

struct AppState {
    pipeline: ReasoningPipeline<OracleBridge, UkgPersonaResolver, ProvisionCatalog, RandomSampler>,
    store: Arc<TraceStore>,
}

#[derive(Deserialize)]
struct ReasonRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    provision_id: Option<String>,
}

/// Missing, empty, and whitespace-only queries are all rejected the same way.
fn trimmed_query(req: &ReasonRequest) -> Option<&str> {
    let q = req.query.as_deref()?.trim();
    if q.is_empty() {
        None
    } else {
        Some(q)
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ReasonerConfig::from_env();
    let store = Arc::new(TraceStore::open(&config.trace_db_path).unwrap());
    let catalog = ProvisionCatalog::load_json_path(&config.provision_catalog_path);
    tracing::info!(
        bind = %config.bind_addr,
        model = %config.oracle.model,
        provisions = catalog.len(),
        "ukfw gateway starting"
    );

    let pipeline = ReasoningPipeline::new(
        OracleBridge::new(config.oracle.clone()),
        UkgPersonaResolver,
        catalog,
        RandomSampler,
    )
    .with_store(store.clone());

    let state = Arc::new(AppState { pipeline, store });

    let app = Router::new()
        .route("/health", get(health))
        .route("/reason/dynamic", post(reason_handler))
        .route("/traces", get(list_traces_handler))
        .route("/traces/:task_id", get(get_trace_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health() -> &'static str {
    "OK"
}

/// POST /reason/dynamic: run one reasoning task and return its full trace.
/// An empty query is rejected before any stage runs.
async fn reason_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReasonRequest>,
) -> Response {
    let query = match trimmed_query(&req) {
        Some(q) => q,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "query must be a non-empty string" })),
            )
                .into_response();
        }
    };
    let trace = state
        .pipeline
        .run(query, req.provision_id.as_deref())
        .await;
    Json(trace).into_response()
}

/// GET /traces/:task_id: fetch one persisted trace.
async fn get_trace_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Response {
    match state.store.load(&task_id) {
        Ok(Some(trace)) => Json(trace).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no trace for task id '{}'", task_id) })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("trace load failed for {}: {}", task_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "trace store unavailable" })),
            )
                .into_response()
        }
    }
}

/// GET /traces: list persisted task ids.
async fn list_traces_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.task_ids() {
        Ok(ids) => Json(json!({ "task_ids": ids })).into_response(),
        Err(e) => {
            tracing::error!("trace listing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "trace store unavailable" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_query_field_is_rejected_like_empty() {
        let missing: ReasonRequest = serde_json::from_str("{}").unwrap();
        assert!(trimmed_query(&missing).is_none());

        let blank: ReasonRequest = serde_json::from_str(r#"{"query": "   "}"#).unwrap();
        assert!(trimmed_query(&blank).is_none());

        let ok: ReasonRequest =
            serde_json::from_str(r#"{"query": " retention rules ", "provision_id": "PROV-001"}"#)
                .unwrap();
        assert_eq!(trimmed_query(&ok), Some("retention rules"));
    }
}
