//! # VectorStore
//!
//! In-memory embedding index for retrieval.
//!
//! This module stores chunk vectors keyed by an auto-incrementing identifier
//! and answers nearest-neighbor queries by exact cosine similarity. It owns
//! the [`Embedder`] capability: both `insert` and `search` embed text through
//! it, and its failures propagate to the caller rather than being swallowed
//! here.
//!
//! ## Responsibilities
//! - **Embedding**: converts chunk and query text into vectors via the
//!   injected [`Embedder`].
//! - **Indexing**: keeps vectors in insertion order; the first inserted
//!   vector fixes the index dimensionality.
//! - **Search**: ranks by descending cosine similarity; ties resolve to the
//!   earlier-inserted chunk.
//!
//! Inserted chunks are immutable and owned exclusively by the store. There is
//! no deduplication: re-inserting identical text stores an independent entry.
//!
//! ## Quick example
//! ```no_run
//! use std::sync::Arc;
//! use tome::api::OpenAiEmbedder;
//! use tome::chunker::Chunk;
//! use tome::vector_store::VectorStore;
//! # async fn demo(embedder: Arc<OpenAiEmbedder>) -> Result<(), tome::error::EmbeddingError> {
//! let mut store = VectorStore::new(embedder);
//! store
//!     .insert(vec![Chunk {
//!         text: "Rust is great!".into(),
//!         document: "notes.pdf".into(),
//!         page: 1,
//!         index: 0,
//!     }])
//!     .await?;
//! let hits = store.search("I love Rust!", 1).await?;
//! println!("top match: {:?}", hits.first());
//! # Ok(()) }
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::api::Embedder;
use crate::chunker::Chunk;
use crate::error::EmbeddingError;

struct Entry {
    vector: Vec<f32>,
    chunk: Chunk,
}

/// Exact-similarity vector index over embedded chunks.
pub struct VectorStore {
    /// Embedding capability used for both inserts and queries.
    embedder: Arc<dyn Embedder>,
    /// Dimensionality fixed by the first inserted vector.
    dimension: Option<usize>,
    /// Auto-incrementing ID counter for new vectors.
    current_id: usize,
    /// Entries in insertion order.
    entries: Vec<Entry>,
}

impl VectorStore {
    /// Create an empty store around an embedding capability.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            dimension: None,
            current_id: 0,
            entries: Vec::new(),
        }
    }

    /// Embed each chunk and add it to the index.
    ///
    /// Chunks are embedded one by one in order; the identifier assigned to
    /// each is the insertion counter, so earlier inserts always win ties at
    /// search time. An embedding failure aborts the batch and propagates.
    ///
    /// # Returns
    /// The number of chunks added.
    pub async fn insert(&mut self, chunks: Vec<Chunk>) -> Result<usize, EmbeddingError> {
        let mut added = 0;
        for chunk in chunks {
            let vector = self.embedder.embed(&chunk.text).await?;
            self.add_vector(vector, chunk)?;
            added += 1;
        }
        debug!("inserted {added} chunks, store now holds {}", self.entries.len());
        Ok(added)
    }

    /// Add a pre-embedded vector and its chunk to the index.
    ///
    /// # Errors
    /// [`EmbeddingError::DimensionMismatch`] if the vector's length differs
    /// from the dimensionality fixed by the first insert.
    pub fn add_vector(&mut self, vector: Vec<f32>, chunk: Chunk) -> Result<usize, EmbeddingError> {
        match self.dimension {
            Some(expected) if vector.len() != expected => {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            None => self.dimension = Some(vector.len()),
            _ => {}
        }

        let id = self.current_id;
        self.entries.push(Entry { vector, chunk });
        self.current_id += 1;
        Ok(id)
    }

    /// Query the index for the `k` chunks most similar to `query_text`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores
    /// keep insertion order. An empty store short-circuits to no hits
    /// without invoking the embedding capability.
    pub async fn search(&self, query_text: &str, k: usize) -> Result<Vec<Chunk>, EmbeddingError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(query_text).await?;
        if let Some(expected) = self.dimension {
            if query.len() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query, &entry.vector), entry))
            .collect();
        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, entry)| entry.chunk.clone())
            .collect())
    }

    /// Number of chunks currently stored.
    pub fn chunk_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all stored vectors and chunks. The next insert fixes a fresh
    /// dimensionality and identifiers restart from zero.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.dimension = None;
        self.current_id = 0;
    }
}

/// Cosine similarity between two equal-length vectors. Zero-magnitude
/// vectors compare as entirely dissimilar rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
