//! Inter-agent message protocol: envelopes, payloads, and observer sinks.
//!
//! Every hand-off in a pipeline run produces one [`MessageEnvelope`]. Envelopes are immutable,
//! correlated through an opaque trace id, and delivered to a [`MessageSink`] purely for
//! observability; nothing in the pipeline reads them back.

mod envelope;
mod sink;

pub use envelope::{
    DEFAULT_TRACE_PREFIX, EnvelopeError, MessageEnvelope, MessageType, Payload, agents,
    make_trace_id,
};
pub use sink::{FanoutSink, MemorySink, MessageSink, TracingSink};
