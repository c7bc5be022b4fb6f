//! Answer stage: turns a query plus retrieved context into the final response.
//!
//! With an API key configured the prompt goes to the HTTP backend ([`LlmAnswerGenerator`]);
//! otherwise the offline [`StubAnswerGenerator`] extracts well-known metrics from the context.
//! Backend failures never abort a run: [`AnswerAgent`] turns them into a labelled answer.

mod llm;
mod prompt;
mod stub;

pub use llm::LlmAnswerGenerator;
pub use prompt::format_prompt;
pub use stub::{NO_CONTEXT_ANSWER, STUB_PREFIX, StubAnswerGenerator, extract_stub_answer};

use crate::{
    config::Config,
    protocol::{MessageEnvelope, MessageSink, Payload, agents},
    retrieval::RetrievalResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Prefix applied to answers that report a backend failure.
pub const LLM_ERROR_PREFIX: &str = "[LLM error]";

/// Errors surfaced by answer generators.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// The backend could not be reached, timed out, or rejected the request.
    #[error("Answer backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The backend replied with a body that could not be decoded.
    #[error("Malformed backend response: {0}")]
    InvalidResponse(String),
}

/// Output of an answer generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    /// Answer text.
    pub answer: String,
    /// Raw backend response, when one was received.
    pub raw: Option<Value>,
}

/// Produces an answer from a query and its retrieved context.
///
/// Implementations must handle an empty `retrieved` slice.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Answer `query` using `retrieved` as the only context.
    async fn answer(
        &self,
        query: &str,
        retrieved: &[RetrievalResult],
    ) -> Result<GeneratedAnswer, AnswerError>;
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResponse {
    /// Answer text, possibly labelled as a stub or a backend error.
    pub answer: String,
    /// Context the answer was produced from, best first.
    pub retrieved: Vec<RetrievalResult>,
}

/// Select the answer generator for the supplied configuration.
pub fn build_answer_generator(config: &Config) -> Result<Arc<dyn AnswerGenerator>, AnswerError> {
    match config.llm_api_key.as_deref() {
        Some(api_key) => Ok(Arc::new(LlmAnswerGenerator::new(
            config.llm_api_url.clone(),
            api_key,
            config.llm_max_tokens,
            config.llm_timeout(),
        )?)),
        None => {
            tracing::warn!("LLM_API_KEY not set; using local stub answers");
            Ok(Arc::new(StubAnswerGenerator))
        }
    }
}

/// Runs the answer generator and publishes `FINAL_RESPONSE`.
pub struct AnswerAgent {
    generator: Arc<dyn AnswerGenerator>,
    sink: Arc<dyn MessageSink>,
}

impl AnswerAgent {
    /// Build an agent around `generator`.
    pub fn new(generator: Arc<dyn AnswerGenerator>, sink: Arc<dyn MessageSink>) -> Self {
        Self { generator, sink }
    }

    /// Produce the final response; backend failures become a labelled answer string.
    pub async fn answer(
        &self,
        query: &str,
        retrieved: Vec<RetrievalResult>,
        trace_id: Option<&str>,
    ) -> FinalResponse {
        let GeneratedAnswer { answer, raw } =
            match self.generator.answer(query, &retrieved).await {
                Ok(generated) => generated,
                Err(error) => {
                    tracing::warn!(error = %error, "Answer generation failed");
                    GeneratedAnswer {
                        answer: format!("{LLM_ERROR_PREFIX} {error}"),
                        raw: None,
                    }
                }
            };

        self.sink.emit(&MessageEnvelope::new(
            agents::ANSWER,
            agents::UI,
            Payload::FinalResponse {
                query: query.to_string(),
                answer: answer.clone(),
                retrieved: retrieved.clone(),
                llm_raw: raw,
            },
            trace_id.map(str::to_string),
        ));

        FinalResponse { answer, retrieved }
    }
}
