//! Pipeline sequencing: ingest → index → retrieve → answer.
//!
//! A [`Coordinator`] owns the agents of one session. `run` borrows it mutably, so a second run
//! cannot start until the first has finished.

use crate::{
    answer::{AnswerAgent, FinalResponse},
    chunking::Chunk,
    ingestion::IngestionAgent,
    protocol::{DEFAULT_TRACE_PREFIX, MessageEnvelope, MessageSink, Payload, agents, make_trace_id},
    retrieval::{DEFAULT_TOP_K, RetrievalAgent, RetrievalError},
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that abort a pipeline run. Recoverable failures never reach this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Indexing or retrieval violated the embedding contract.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
}

/// Stage the coordinator is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Waiting for a run.
    Idle,
    /// Parsing and chunking documents.
    Ingesting,
    /// Embedding chunks into the index.
    Indexing,
    /// Searching the index for the query.
    Retrieving,
    /// Producing the answer.
    Answering,
    /// The last run completed.
    Done,
    /// The last run stopped on a contract violation.
    Failed,
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Trace id attached to every envelope of the run.
    pub trace_id: String,
    /// Answer plus retrieved context.
    pub response: FinalResponse,
    /// Number of documents submitted.
    pub documents: usize,
    /// Number of chunks indexed during the run.
    pub chunks_indexed: usize,
    /// Number of documents whose parsing failed.
    pub parse_failures: usize,
}

/// Drives one session's agents through the pipeline stages.
pub struct Coordinator {
    ingestion: IngestionAgent,
    retrieval: RetrievalAgent,
    answer: AnswerAgent,
    sink: Arc<dyn MessageSink>,
    state: PipelineState,
}

impl Coordinator {
    /// Assemble a coordinator from its agents.
    pub fn new(
        ingestion: IngestionAgent,
        retrieval: RetrievalAgent,
        answer: AnswerAgent,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            ingestion,
            retrieval,
            answer,
            sink,
            state: PipelineState::Idle,
        }
    }

    /// Current stage.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Retrieval agent owned by this session.
    pub fn retrieval(&self) -> &RetrievalAgent {
        &self.retrieval
    }

    /// Run the pipeline under a freshly generated trace id.
    pub async fn run<P: AsRef<Path>>(
        &mut self,
        file_paths: &[P],
        query: &str,
    ) -> Result<FinalResponse, PipelineError> {
        let trace_id = make_trace_id(DEFAULT_TRACE_PREFIX);
        Ok(self.run_with_trace(file_paths, query, &trace_id).await?.response)
    }

    /// Run the pipeline, attaching `trace_id` to every envelope it emits.
    pub async fn run_with_trace<P: AsRef<Path>>(
        &mut self,
        file_paths: &[P],
        query: &str,
        trace_id: &str,
    ) -> Result<RunReport, PipelineError> {
        self.transition(PipelineState::Idle);
        match self.execute(file_paths, query, trace_id).await {
            Ok(report) => {
                self.transition(PipelineState::Done);
                Ok(report)
            }
            Err(error) => {
                tracing::error!(trace_id, error = %error, "Pipeline run failed");
                self.transition(PipelineState::Failed);
                Err(error)
            }
        }
    }

    async fn execute<P: AsRef<Path>>(
        &mut self,
        file_paths: &[P],
        query: &str,
        trace_id: &str,
    ) -> Result<RunReport, PipelineError> {
        self.transition(PipelineState::Ingesting);
        let mut all_chunks: Vec<Chunk> = Vec::new();
        let mut parse_failures = 0;
        for path in file_paths {
            let document = self
                .ingestion
                .process_document(path.as_ref(), None, Some(trace_id))
                .await;
            if document.parse_error.is_some() {
                parse_failures += 1;
            }
            all_chunks.extend(document.chunks);
        }

        self.transition(PipelineState::Indexing);
        let chunks_indexed = all_chunks.len();
        if all_chunks.is_empty() {
            tracing::info!(trace_id, "No chunks ingested; skipping index build");
        } else {
            self.sink.emit(&MessageEnvelope::new(
                agents::COORDINATOR,
                agents::RETRIEVAL,
                Payload::BuildIndex {
                    n_chunks: chunks_indexed,
                },
                Some(trace_id.to_string()),
            ));
            self.retrieval.build_index(all_chunks).await?;
        }

        self.transition(PipelineState::Retrieving);
        let retrieved = self
            .retrieval
            .handle_query(query, DEFAULT_TOP_K, Some(trace_id))
            .await?;

        self.transition(PipelineState::Answering);
        let response = self.answer.answer(query, retrieved, Some(trace_id)).await;

        Ok(RunReport {
            trace_id: trace_id.to_string(),
            response,
            documents: file_paths.len(),
            chunks_indexed,
            parse_failures,
        })
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = ?self.state, to = ?next, "Pipeline transition");
        self.state = next;
    }
}
