use crate::retrieval::RetrievalResult;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

/// Prefix used for trace ids generated without an explicit prefix.
pub const DEFAULT_TRACE_PREFIX: &str = "rag";

/// Well-known agent names used as envelope senders and receivers.
pub mod agents {
    /// Caller-facing surface (CLI, HTTP, UI).
    pub const UI: &str = "UI";
    /// Pipeline sequencer.
    pub const COORDINATOR: &str = "CoordinatorAgent";
    /// Document parsing and chunking stage.
    pub const INGESTION: &str = "IngestionAgent";
    /// Vector index owner.
    pub const RETRIEVAL: &str = "RetrievalAgent";
    /// Answer generation stage.
    pub const ANSWER: &str = "AnswerAgent";
}

/// Errors raised when an envelope received from outside the process is malformed.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The JSON document could not be decoded into the envelope shape.
    #[error("Malformed envelope: {0}")]
    Decode(#[from] serde_json::Error),
    /// A required string field was blank.
    #[error("Envelope field '{0}' must not be empty")]
    EmptyField(&'static str),
    /// The payload was not a JSON object.
    #[error("Envelope payload must be a JSON object")]
    PayloadNotObject,
}

/// Message kinds exchanged on the retrieval boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// A question entered by the user.
    UserQuery,
    /// One document was parsed and chunked.
    DocumentParsed,
    /// The coordinator asks the retrieval agent to index the accumulated chunks.
    BuildIndex,
    /// Retrieved context handed to the answer stage.
    RetrievalResult,
    /// The final answer returned to the caller.
    FinalResponse,
}

impl MessageType {
    /// Wire name of the message type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserQuery => "USER_QUERY",
            Self::DocumentParsed => "DOCUMENT_PARSED",
            Self::BuildIndex => "BUILD_INDEX",
            Self::RetrievalResult => "RETRIEVAL_RESULT",
            Self::FinalResponse => "FINAL_RESPONSE",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payloads; each variant fixes the message type it travels under.
#[derive(Debug, Clone)]
pub enum Payload {
    /// `USER_QUERY{query}`
    UserQuery {
        /// Question text.
        query: String,
    },
    /// `DOCUMENT_PARSED{filename, n_chunks}`
    DocumentParsed {
        /// Source identifier of the parsed document.
        filename: String,
        /// Number of chunks the document produced.
        n_chunks: usize,
    },
    /// `BUILD_INDEX{n_chunks}`
    BuildIndex {
        /// Number of chunks about to be indexed.
        n_chunks: usize,
    },
    /// `RETRIEVAL_RESULT{query, retrieved_context}`
    RetrievalResult {
        /// Question text.
        query: String,
        /// Ranked retrieval results.
        retrieved_context: Vec<RetrievalResult>,
    },
    /// `FINAL_RESPONSE{query, answer, retrieved, llm_raw}`
    FinalResponse {
        /// Question text.
        query: String,
        /// Answer text returned to the caller.
        answer: String,
        /// Context the answer was produced from.
        retrieved: Vec<RetrievalResult>,
        /// Raw backend response, `null` for stub and failed calls.
        llm_raw: Option<Value>,
    },
}

impl Payload {
    /// Message type carried by this payload.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::UserQuery { .. } => MessageType::UserQuery,
            Self::DocumentParsed { .. } => MessageType::DocumentParsed,
            Self::BuildIndex { .. } => MessageType::BuildIndex,
            Self::RetrievalResult { .. } => MessageType::RetrievalResult,
            Self::FinalResponse { .. } => MessageType::FinalResponse,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::UserQuery { query } => json!({ "query": query }),
            Self::DocumentParsed { filename, n_chunks } => {
                json!({ "filename": filename, "n_chunks": n_chunks })
            }
            Self::BuildIndex { n_chunks } => json!({ "n_chunks": n_chunks }),
            Self::RetrievalResult {
                query,
                retrieved_context,
            } => json!({ "query": query, "retrieved_context": retrieved_context }),
            Self::FinalResponse {
                query,
                answer,
                retrieved,
                llm_raw,
            } => json!({
                "query": query,
                "answer": answer,
                "retrieved": retrieved,
                "llm_raw": llm_raw,
            }),
        }
    }
}

/// Structured unit of inter-agent communication.
///
/// Field names and order match the wire shape
/// `{sender, receiver, type, trace_id, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    sender: String,
    receiver: String,
    #[serde(rename = "type")]
    message_type: MessageType,
    trace_id: String,
    payload: Value,
}

impl MessageEnvelope {
    /// Build an envelope, generating a fresh trace id when none is supplied.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        payload: Payload,
        trace_id: Option<String>,
    ) -> Self {
        let trace_id = trace_id
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| make_trace_id(DEFAULT_TRACE_PREFIX));
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            message_type: payload.message_type(),
            trace_id,
            payload: payload.into_value(),
        }
    }

    /// Decode and validate an envelope received as JSON.
    pub fn from_json(raw: &str) -> Result<Self, EnvelopeError> {
        let envelope: Self = serde_json::from_str(raw)?;
        envelope.validate()?;
        Ok(envelope)
    }

    fn validate(&self) -> Result<(), EnvelopeError> {
        if self.sender.trim().is_empty() {
            return Err(EnvelopeError::EmptyField("sender"));
        }
        if self.receiver.trim().is_empty() {
            return Err(EnvelopeError::EmptyField("receiver"));
        }
        if self.trace_id.trim().is_empty() {
            return Err(EnvelopeError::EmptyField("trace_id"));
        }
        if !self.payload.is_object() {
            return Err(EnvelopeError::PayloadNotObject);
        }
        Ok(())
    }

    /// Agent that produced the message.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Agent the message is addressed to.
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// Message kind.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Opaque correlation token.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Message body; always a JSON object.
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// Generate a trace id of the form `<prefix>-<8 hex chars>`.
pub fn make_trace_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMeta;

    #[test]
    fn serializes_to_wire_shape() {
        let envelope = MessageEnvelope::new(
            agents::COORDINATOR,
            agents::RETRIEVAL,
            Payload::BuildIndex { n_chunks: 3 },
            Some("trace-1".into()),
        );

        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(
            value,
            json!({
                "sender": "CoordinatorAgent",
                "receiver": "RetrievalAgent",
                "type": "BUILD_INDEX",
                "trace_id": "trace-1",
                "payload": { "n_chunks": 3 }
            })
        );
    }

    #[test]
    fn generates_trace_id_when_missing_or_blank() {
        let first = MessageEnvelope::new(
            agents::UI,
            agents::COORDINATOR,
            Payload::UserQuery {
                query: "q".into(),
            },
            None,
        );
        let second = MessageEnvelope::new(
            agents::UI,
            agents::COORDINATOR,
            Payload::UserQuery {
                query: "q".into(),
            },
            Some("  ".into()),
        );

        for envelope in [&first, &second] {
            let (prefix, hex) = envelope.trace_id().split_once('-').expect("dash");
            assert_eq!(prefix, DEFAULT_TRACE_PREFIX);
            assert_eq!(hex.len(), 8);
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        }
        assert_ne!(first.trace_id(), second.trace_id());
    }

    #[test]
    fn retrieval_payload_embeds_results() {
        let result = RetrievalResult {
            score: 0.5,
            text: "alpha".into(),
            meta: ChunkMeta {
                source_id: "a.txt".into(),
                chunk_index: 2,
            },
        };
        let envelope = MessageEnvelope::new(
            agents::RETRIEVAL,
            agents::ANSWER,
            Payload::RetrievalResult {
                query: "what".into(),
                retrieved_context: vec![result],
            },
            None,
        );

        assert_eq!(envelope.message_type(), MessageType::RetrievalResult);
        let context = &envelope.payload()["retrieved_context"][0];
        assert_eq!(context["text"], "alpha");
        assert_eq!(context["meta"]["source_id"], "a.txt");
        assert_eq!(context["meta"]["chunk_index"], 2);
    }

    #[test]
    fn from_json_rejects_malformed_envelopes() {
        let missing_type = r#"{"sender":"a","receiver":"b","trace_id":"t","payload":{}}"#;
        assert!(matches!(
            MessageEnvelope::from_json(missing_type),
            Err(EnvelopeError::Decode(_))
        ));

        let unknown_type =
            r#"{"sender":"a","receiver":"b","type":"PING","trace_id":"t","payload":{}}"#;
        assert!(matches!(
            MessageEnvelope::from_json(unknown_type),
            Err(EnvelopeError::Decode(_))
        ));

        let blank_sender =
            r#"{"sender":" ","receiver":"b","type":"BUILD_INDEX","trace_id":"t","payload":{}}"#;
        assert!(matches!(
            MessageEnvelope::from_json(blank_sender),
            Err(EnvelopeError::EmptyField("sender"))
        ));

        let array_payload =
            r#"{"sender":"a","receiver":"b","type":"BUILD_INDEX","trace_id":"t","payload":[]}"#;
        assert!(matches!(
            MessageEnvelope::from_json(array_payload),
            Err(EnvelopeError::PayloadNotObject)
        ));
    }

    #[test]
    fn from_json_accepts_emitted_envelopes() {
        let envelope = MessageEnvelope::new(
            agents::INGESTION,
            agents::RETRIEVAL,
            Payload::DocumentParsed {
                filename: "notes.md".into(),
                n_chunks: 4,
            },
            Some("rag-1234abcd".into()),
        );
        let raw = serde_json::to_string(&envelope).expect("serialize");
        let decoded = MessageEnvelope::from_json(&raw).expect("decode");
        assert_eq!(decoded, envelope);
    }
}
