//! Retrieval agent: owns the vector index and resolves search hits back to chunk text.

use crate::{
    chunking::{Chunk, ChunkMeta},
    embedding::{EmbeddingClient, EmbeddingClientError},
    index::{FlatIndex, IndexError, ScoredOrdinal, VectorIndex},
    protocol::{MessageEnvelope, MessageSink, Payload, agents},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Number of results requested by the pipeline for every query.
pub const DEFAULT_TOP_K: usize = 5;

/// Errors emitted while indexing or querying chunks.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Embedding provider failed to return vectors.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// The vector index rejected a vector.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Embedding provider returned a different number of vectors than texts submitted.
    #[error("Embedding provider returned {actual} vectors for {expected} texts")]
    EmbeddingCountMismatch {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
    /// An index handed to the agent already held entries it has no text or metadata for.
    #[error("Index already holds {len} entries; the agent needs an empty index")]
    IndexNotEmpty {
        /// Entries found in the supplied index.
        len: usize,
    },
    /// The index returned an ordinal with no stored chunk.
    #[error("Index returned unknown ordinal {ordinal} ({stored} chunks stored)")]
    UnknownOrdinal {
        /// Ordinal reported by the index.
        ordinal: usize,
        /// Number of chunks the agent holds.
        stored: usize,
    },
}

/// Ranked chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Cosine similarity between the query and the chunk.
    pub score: f32,
    /// Chunk text.
    pub text: String,
    /// Source and position of the chunk.
    pub meta: ChunkMeta,
}

struct IndexState {
    index: Box<dyn VectorIndex>,
    texts: Vec<String>,
    metas: Vec<ChunkMeta>,
}

impl IndexState {
    fn resolve(&self, hit: ScoredOrdinal) -> Result<RetrievalResult, RetrievalError> {
        match (self.texts.get(hit.ordinal), self.metas.get(hit.ordinal)) {
            (Some(text), Some(meta)) => Ok(RetrievalResult {
                score: hit.score,
                text: text.clone(),
                meta: meta.clone(),
            }),
            _ => Err(RetrievalError::UnknownOrdinal {
                ordinal: hit.ordinal,
                stored: self.texts.len(),
            }),
        }
    }
}

/// Owns one vector index plus the texts and metadata stored at each ordinal.
///
/// The same embedding client embeds chunks and queries, so both sides of a search always come
/// from one model. Index growth takes the write lock and searches take the read lock, which
/// lets a single agent serve concurrent queries once ingestion has finished.
pub struct RetrievalAgent {
    embedding_client: Arc<dyn EmbeddingClient>,
    state: RwLock<IndexState>,
    sink: Arc<dyn MessageSink>,
}

impl RetrievalAgent {
    /// Build an agent backed by an empty [`FlatIndex`] sized for the embedding client.
    pub fn new(embedding_client: Arc<dyn EmbeddingClient>, sink: Arc<dyn MessageSink>) -> Self {
        let index = FlatIndex::new(embedding_client.dimension());
        Self::from_parts(embedding_client, Box::new(index), sink)
    }

    /// Build an agent around an existing, empty index.
    pub fn with_index(
        embedding_client: Arc<dyn EmbeddingClient>,
        index: Box<dyn VectorIndex>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Self, RetrievalError> {
        if !index.is_empty() {
            return Err(RetrievalError::IndexNotEmpty { len: index.len() });
        }
        if index.dimension() != embedding_client.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedding_client.dimension(),
            }
            .into());
        }
        Ok(Self::from_parts(embedding_client, index, sink))
    }

    fn from_parts(
        embedding_client: Arc<dyn EmbeddingClient>,
        index: Box<dyn VectorIndex>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            embedding_client,
            state: RwLock::new(IndexState {
                index,
                texts: Vec::new(),
                metas: Vec::new(),
            }),
            sink,
        }
    }

    /// Number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.state.read().await.index.len()
    }

    /// Whether nothing has been indexed yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Embed and append chunks in submission order, returning the new index size.
    pub async fn build_index(&self, chunks: Vec<Chunk>) -> Result<usize, RetrievalError> {
        if chunks.is_empty() {
            return Ok(self.len().await);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let expected = texts.len();
        let vectors = self.embedding_client.generate_embeddings(texts).await?;
        if vectors.len() != expected {
            return Err(RetrievalError::EmbeddingCountMismatch {
                expected,
                actual: vectors.len(),
            });
        }

        let mut state = self.state.write().await;
        state.index.add(vectors)?;
        for Chunk { text, meta } in chunks {
            state.texts.push(text);
            state.metas.push(meta);
        }
        debug_assert_eq!(state.index.len(), state.texts.len());

        let size = state.index.len();
        tracing::info!(added = expected, index_size = size, "Index size now {size}");
        Ok(size)
    }

    /// Embed `query` and return the `top_k` most similar chunks, best first.
    ///
    /// An empty index yields an empty list without calling the embedding provider.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if self.is_empty().await {
            tracing::debug!("Query against empty index");
            return Ok(Vec::new());
        }

        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![query.to_string()])
            .await?;
        if vectors.len() != 1 {
            return Err(RetrievalError::EmbeddingCountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        let query_vector = vectors.swap_remove(0);

        let state = self.state.read().await;
        let hits = state.index.search(&query_vector, top_k)?;
        let results = hits
            .into_iter()
            .map(|hit| state.resolve(hit))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            top_k,
            returned = results.len(),
            best_score = results.first().map(|result| result.score),
            "Retrieved context"
        );
        Ok(results)
    }

    /// Retrieve context and announce it to the answer stage.
    pub async fn handle_query(
        &self,
        query: &str,
        top_k: usize,
        trace_id: Option<&str>,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let results = self.retrieve(query, top_k).await?;
        self.sink.emit(&MessageEnvelope::new(
            agents::RETRIEVAL,
            agents::ANSWER,
            Payload::RetrievalResult {
                query: query.to_string(),
                retrieved_context: results.clone(),
            },
            trace_id.map(str::to_string),
        ));
        Ok(results)
    }
}
