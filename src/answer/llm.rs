//! HTTP answer backend accepting `{prompt, max_tokens}` with bearer authentication.

use super::{AnswerError, AnswerGenerator, GeneratedAnswer, format_prompt};
use crate::retrieval::RetrievalResult;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

/// Answer generator calling a remote completion endpoint.
pub struct LlmAnswerGenerator {
    http: Client,
    api_url: String,
    api_key: String,
    max_tokens: u32,
}

impl LlmAnswerGenerator {
    /// Build a client whose requests are bounded by `timeout`.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, AnswerError> {
        let http = Client::builder()
            .user_agent("rusty-rag/answer")
            .timeout(timeout)
            .build()
            .map_err(|error| {
                AnswerError::BackendUnavailable(format!("failed to construct HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            max_tokens,
        })
    }
}

/// Pull the answer text out of a backend response (`output`, then `answer`).
fn extract_answer(data: &Value) -> String {
    ["output", "answer"]
        .iter()
        .find_map(|key| match data.get(*key) {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .unwrap_or_default()
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn answer(
        &self,
        query: &str,
        retrieved: &[RetrievalResult],
    ) -> Result<GeneratedAnswer, AnswerError> {
        let prompt = format_prompt(query, retrieved);
        tracing::info!(prompt_chars = prompt.chars().count(), "Sending prompt to answer backend");

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "prompt": prompt, "max_tokens": self.max_tokens }))
            .send()
            .await
            .map_err(|error| {
                let reason = if error.is_timeout() {
                    format!("request to {} timed out", self.api_url)
                } else {
                    format!("failed to reach {}: {error}", self.api_url)
                };
                AnswerError::BackendUnavailable(reason)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerError::BackendUnavailable(format!(
                "backend returned {status}: {body}"
            )));
        }

        let data: Value = response.json().await.map_err(|error| {
            AnswerError::InvalidResponse(format!("failed to decode backend response: {error}"))
        })?;

        Ok(GeneratedAnswer {
            answer: extract_answer(&data),
            raw: Some(data),
        })
    }
}
