//! Error taxonomy for the retrieval and generation pipeline.

use thiserror::Error;

/// Errors raised by the core pipeline.
///
/// An empty index is deliberately absent: searching an empty index yields
/// an empty result, not an error.
#[derive(Error, Debug)]
pub enum RagError {
    /// Chunking or retrieval parameters that cannot produce a valid result,
    /// e.g. `overlap >= window`.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The embedding capability failed or returned the wrong number of vectors.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A vector did not match the index dimensionality.
    #[error("index error: {0}")]
    Index(String),

    /// The generation capability failed or produced malformed output.
    #[error("generation failed: {0}")]
    Generation(String),
}
