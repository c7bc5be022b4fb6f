#![deny(missing_docs)]

//! Core library for Rusty RAG: a retrieval-augmented question-answering pipeline whose agents
//! talk through traceable protocol envelopes.

/// Answer generation: prompt rendering, heuristic stub, and LLM backend.
pub mod answer;
/// HTTP routing and REST handlers.
pub mod api;
/// Fixed-size character chunking.
pub mod chunking;
/// Environment-driven configuration management.
pub mod config;
/// Pipeline sequencing and run state.
pub mod coordinator;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Flat cosine-similarity vector index.
pub mod index;
/// Document parsing and chunking agent.
pub mod ingestion;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Message envelopes and sinks shared by every agent.
pub mod protocol;
/// Index-owning retrieval agent.
pub mod retrieval;
/// Session factory used by the CLI and HTTP surfaces.
pub mod service;
