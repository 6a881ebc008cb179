//! # Error taxonomy
//!
//! Typed errors for the retrieval-augmented chat engine, split by the layer
//! they originate from:
//!
//! - [`ValidationError`]: structurally invalid input. Rejected up front, never
//!   retried.
//! - [`EmbeddingError`] / [`ModelError`]: failures of the external embedding
//!   or chat capability (network, quota, auth). The conversation pipeline
//!   degrades around these instead of failing a turn; ingestion propagates
//!   them.
//! - [`LoadError`]: one document could not be loaded. Non-fatal for a batch.
//! - [`IngestionError`]: the whole ingestion batch failed.

use async_openai::error::OpenAIError;
use std::path::PathBuf;
use thiserror::Error;

/// Input that is rejected before any external capability is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// `ask` was called with an empty (or whitespace-only) question.
    #[error("question must not be empty")]
    EmptyQuestion,
}

/// Failure of the external embedding capability.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Api(#[from] OpenAIError),

    #[error("embedding response contained no vectors")]
    EmptyResponse,

    /// The embedding capability returned a vector whose dimensionality does
    /// not match what the index was built with.
    #[error("expected a {expected}-dimension vector, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failure of the external chat-completion capability.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("chat completion request failed: {0}")]
    Api(#[from] OpenAIError),

    #[error("chat completion contained no choices")]
    EmptyResponse,
}

/// A single document could not be loaded. Recorded and skipped during batch
/// ingestion; only fatal when every document in the batch fails.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("not a PDF file: {0}")]
    NotPdf(PathBuf),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("no text could be extracted from {0}")]
    Empty(PathBuf),
}

/// Batch-level ingestion failure.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Every supplied document failed to load. The message names each
    /// unusable document and why it was skipped.
    #[error("none of the supplied documents could be ingested: {reasons}")]
    AllDocumentsFailed { reasons: String },

    /// Embedding chunks for the vector index failed partway through.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}
