//! HTTP surface for Rusty RAG.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /query` – Ingest the listed files into a fresh session and answer the question.
//!   Paths are confined to the configured documents root; anything resolving outside it is
//!   rejected with `400`. Returns the answer, the retrieved chunks, the run's trace id, and every
//!   protocol envelope emitted along the way.
//! - `GET /metrics` – Observe run, document, and chunk counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::coordinator::PipelineError;
use crate::ingestion::{DocumentPathError, DocumentRoot};
use crate::protocol::MessageEnvelope;
use crate::retrieval::RetrievalResult;
use crate::service::RagApi;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Build the HTTP router exposing the question-answering surface.
///
/// `POST /query` only reads files under `documents`.
pub fn create_router<S>(service: Arc<S>, documents: DocumentRoot) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/query", post(query_documents::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(AppState {
            service,
            documents: Arc::new(documents),
        })
}

struct AppState<S> {
    service: Arc<S>,
    documents: Arc<DocumentRoot>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            documents: self.documents.clone(),
        }
    }
}

/// Request body for the `POST /query` endpoint.
#[derive(Deserialize)]
struct QueryRequest {
    /// Files to ingest for this question.
    #[serde(default)]
    file_paths: Vec<PathBuf>,
    /// Natural-language question.
    query: String,
}

/// Success response for the `POST /query` endpoint.
#[derive(Serialize)]
struct QueryResponse {
    trace_id: String,
    answer: String,
    retrieved: Vec<RetrievalResult>,
    messages: Vec<MessageEnvelope>,
}

/// Answer a question over the supplied documents.
async fn query_documents<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError>
where
    S: RagApi,
{
    let QueryRequest { file_paths, query } = request;
    if query.trim().is_empty() {
        return Err(AppError::BadRequest("query must not be empty".into()));
    }

    let file_paths = state.documents.resolve_all(&file_paths).await?;
    let outcome = state.service.run(file_paths, query).await?;
    tracing::info!(
        trace_id = %outcome.trace_id,
        retrieved = outcome.response.retrieved.len(),
        "Query request completed"
    );
    Ok(Json(QueryResponse {
        trace_id: outcome.trace_id,
        answer: outcome.response.answer,
        retrieved: outcome.response.retrieved,
        messages: outcome.messages,
    }))
}

/// Return a metrics snapshot with run, document, and chunk counters.
async fn get_metrics<S>(State(state): State<AppState<S>>) -> impl IntoResponse
where
    S: RagApi,
{
    Json(state.service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "query",
                method: "POST",
                path: "/query",
                description: "Ingest the listed files (relative to the documents root) into a fresh index and answer the question from the top 5 chunks. Response returns { \"answer\", \"retrieved\", \"trace_id\", \"messages\" }.",
                request_example: Some(json!({
                    "file_paths": ["annual-report.pdf", "metrics.csv"],
                    "query": "What was revenue in 2023?"
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Pipeline(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
            }
        }
    }
}

impl From<DocumentPathError> for AppError {
    fn from(inner: DocumentPathError) -> Self {
        tracing::warn!(error = %inner, "Rejected document path");
        Self::BadRequest(inner.to_string())
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self::Pipeline(inner)
    }
}
