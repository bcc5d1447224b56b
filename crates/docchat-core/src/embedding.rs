//! Embedding capability trait and vector distance helpers.
//!
//! Concrete embedders (fastembed, OpenAI, Ollama) live in the `docchat`
//! app crate. The core only needs a way to turn text into fixed-length
//! vectors and a way to compare them.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding providers.
///
/// Implementations must return exactly one vector per input text, in
/// input order, each of length [`dims`](Embedder::dims).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"paraphrase-multilingual-mpnet-base-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// Squared Euclidean distance between two vectors.
///
/// This is the ranking metric of the flat L2 index: smaller is closer.
/// The square root is skipped because it does not change the order.
///
/// Callers must pass vectors of equal length; extra components of the
/// longer vector are ignored.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
