//! Dense-vector indexes answering nearest-neighbour queries by cosine similarity.
//!
//! Entries are identified by their ordinal: the append-order position assigned when the vector
//! was added. Ordinals are never reused, so callers may keep parallel arrays keyed by them.

use thiserror::Error;

/// Errors raised by vector index operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// A vector's length differs from the index dimensionality.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality fixed when the index was created.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },
}

/// One search hit: similarity score plus the ordinal of the matching entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredOrdinal {
    /// Cosine similarity between the query and the stored vector.
    pub score: f32,
    /// Append-order position of the stored vector.
    pub ordinal: usize,
}

/// Capability set shared by vector index implementations.
pub trait VectorIndex: Send + Sync {
    /// Dimensionality every stored and query vector must have.
    fn dimension(&self) -> usize;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Whether the index holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors in order. Either all vectors are stored or none are.
    fn add(&mut self, vectors: Vec<Vec<f32>>) -> Result<(), IndexError>;

    /// Return up to `k` hits ordered by descending score, ties broken by lower ordinal.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredOrdinal>, IndexError>;
}

/// In-memory exhaustive index scoring by inner product over L2-normalized vectors.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn add(&mut self, vectors: Vec<Vec<f32>>) -> Result<(), IndexError> {
        for vector in &vectors {
            self.check_dimension(vector)?;
        }

        self.vectors.reserve(vectors.len());
        for mut vector in vectors {
            normalize_l2(&mut vector);
            self.vectors.push(vector);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredOrdinal>, IndexError> {
        self.check_dimension(query)?;
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        normalize_l2(&mut query);

        let mut hits: Vec<ScoredOrdinal> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, stored)| ScoredOrdinal {
                score: inner_product(&query, stored),
                ordinal,
            })
            .collect();

        hits.sort_by(|a, b| {
            rank_key(b.score)
                .total_cmp(&rank_key(a.score))
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

/// NaN scores rank below every real score.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Scale `vector` to unit Euclidean length in place; zero vectors are left untouched.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
