use super::MessageEnvelope;
use std::sync::{Arc, Mutex};

/// Observer receiving every envelope produced during a pipeline run.
///
/// Implementations must not panic and must return promptly; the pipeline never waits on a sink.
pub trait MessageSink: Send + Sync {
    /// Record one envelope.
    fn emit(&self, envelope: &MessageEnvelope);
}

/// Default sink: writes each envelope as pretty JSON on the `protocol` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn emit(&self, envelope: &MessageEnvelope) {
        let rendered = serde_json::to_string_pretty(envelope)
            .unwrap_or_else(|error| format!("<unserializable envelope: {error}>"));
        tracing::info!(
            target: "protocol",
            sender = envelope.sender(),
            receiver = envelope.receiver(),
            message_type = %envelope.message_type(),
            trace_id = envelope.trace_id(),
            "Protocol message\n{rendered}"
        );
    }
}

/// Sink that keeps envelopes in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<MessageEnvelope>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every envelope recorded so far.
    pub fn messages(&self) -> Vec<MessageEnvelope> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drain the recorded envelopes.
    pub fn take(&self) -> Vec<MessageEnvelope> {
        std::mem::take(
            &mut *self
                .messages
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl MessageSink for MemorySink {
    fn emit(&self, envelope: &MessageEnvelope) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(envelope.clone());
    }
}

/// Forwards each envelope to several sinks in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn MessageSink>>,
}

impl FanoutSink {
    /// Build a fan-out over the supplied sinks.
    pub fn new(sinks: Vec<Arc<dyn MessageSink>>) -> Self {
        Self { sinks }
    }

    /// Append another sink.
    pub fn with(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl MessageSink for FanoutSink {
    fn emit(&self, envelope: &MessageEnvelope) {
        for sink in &self.sinks {
            sink.emit(envelope);
        }
    }
}
