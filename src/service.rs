//! Session factory shared by the CLI and HTTP surfaces.

use crate::{
    answer::{AnswerAgent, AnswerError, AnswerGenerator, FinalResponse, build_answer_generator},
    config::Config,
    coordinator::{Coordinator, PipelineError},
    embedding::{EmbeddingClient, EmbeddingClientError, build_embedding_client},
    ingestion::{DocumentParser, FileParser, IngestionAgent},
    metrics::{MetricsSnapshot, PipelineMetrics},
    protocol::{
        DEFAULT_TRACE_PREFIX, FanoutSink, MemorySink, MessageEnvelope, MessageSink, Payload,
        TracingSink, agents, make_trace_id,
    },
    retrieval::RetrievalAgent,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while assembling the service from configuration.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The embedding client could not be constructed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// The answer backend client could not be constructed.
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

/// Outcome of one query handled by the service.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Trace id shared by every envelope of the run.
    pub trace_id: String,
    /// Answer plus retrieved context.
    pub response: FinalResponse,
    /// Envelopes emitted during the run, in order.
    pub messages: Vec<MessageEnvelope>,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Ingest `file_paths` into a fresh session and answer `query` over them.
    async fn run(
        &self,
        file_paths: Vec<PathBuf>,
        query: String,
    ) -> Result<QueryOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Holds the stateless collaborators and builds a new session for every run.
///
/// Each run gets its own [`RetrievalAgent`], so indexes never leak between requests.
pub struct RagService {
    embedding_client: Arc<dyn EmbeddingClient>,
    parser: Arc<dyn DocumentParser>,
    answer_generator: Arc<dyn AnswerGenerator>,
    sink: Arc<dyn MessageSink>,
    metrics: PipelineMetrics,
}

impl RagService {
    /// Build the service from configuration, logging envelopes through tracing.
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        tracing::info!(
            provider = ?config.embedding_provider,
            dimension = config.embedding_dimension,
            "Initializing embedding client"
        );
        let embedding_client = build_embedding_client(config)?;
        let answer_generator = build_answer_generator(config)?;
        Ok(Self::from_parts(
            embedding_client,
            Arc::new(FileParser::new()),
            answer_generator,
            Arc::new(TracingSink),
        ))
    }

    /// Build the service from explicit collaborators.
    pub fn from_parts(
        embedding_client: Arc<dyn EmbeddingClient>,
        parser: Arc<dyn DocumentParser>,
        answer_generator: Arc<dyn AnswerGenerator>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            embedding_client,
            parser,
            answer_generator,
            sink,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Create a coordinator with a fresh, empty index whose envelopes go to `sink`.
    pub fn session(&self, sink: Arc<dyn MessageSink>) -> Coordinator {
        Coordinator::new(
            IngestionAgent::new(self.parser.clone(), sink.clone()),
            RetrievalAgent::new(self.embedding_client.clone(), sink.clone()),
            AnswerAgent::new(self.answer_generator.clone(), sink.clone()),
            sink,
        )
    }

    /// Announce the query, run a fresh session, and collect its envelopes.
    pub async fn run(
        &self,
        file_paths: Vec<PathBuf>,
        query: String,
    ) -> Result<QueryOutcome, PipelineError> {
        let trace_id = make_trace_id(DEFAULT_TRACE_PREFIX);
        let recorder = Arc::new(MemorySink::new());
        let sink: Arc<dyn MessageSink> = Arc::new(FanoutSink::new(vec![
            self.sink.clone(),
            recorder.clone() as Arc<dyn MessageSink>,
        ]));

        sink.emit(&MessageEnvelope::new(
            agents::UI,
            agents::COORDINATOR,
            Payload::UserQuery {
                query: query.clone(),
            },
            Some(trace_id.clone()),
        ));

        tracing::info!(
            trace_id = %trace_id,
            files = file_paths.len(),
            "Starting pipeline run"
        );
        let mut coordinator = self.session(sink);
        match coordinator.run_with_trace(&file_paths, &query, &trace_id).await {
            Ok(report) => {
                self.metrics.record_run(&report);
                Ok(QueryOutcome {
                    trace_id: report.trace_id,
                    response: report.response,
                    messages: recorder.take(),
                })
            }
            Err(error) => {
                self.metrics.record_failure();
                Err(error)
            }
        }
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn run(
        &self,
        file_paths: Vec<PathBuf>,
        query: String,
    ) -> Result<QueryOutcome, PipelineError> {
        RagService::run(self, file_paths, query).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }
}
