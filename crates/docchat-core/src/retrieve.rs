//! Chunk indexing and top-k retrieval.
//!
//! [`build_retriever`] runs once at startup: it embeds every chunk and
//! fills a [`VectorIndex`]. [`Retriever::search`] then answers each query
//! by embedding it and mapping the nearest vectors back to chunk text.
//!
//! Results follow the index order (ascending distance). Overlapping
//! chunks are not deduplicated and nothing is re-ranked.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::embedding::Embedder;
use crate::error::RagError;
use crate::index::VectorIndex;

/// Default number of chunks returned per query.
pub const DEFAULT_TOP_K: usize = 10;

/// One retrieved chunk, as handed to the prompt builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextItem {
    pub content: String,
}

/// Read-only view over the chunks and their vectors.
pub struct Retriever {
    chunks: Vec<Chunk>,
    index: Box<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    /// Wrap an already populated index.
    ///
    /// Index id `i` is expected to refer to `chunks[i]`. Ids outside the
    /// chunk range are skipped at search time.
    pub fn new(
        chunks: Vec<Chunk>,
        index: Box<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            chunks,
            index,
            embedder,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Return up to `top_k` chunk texts closest to `query`.
    ///
    /// An empty index returns an empty result without embedding the query.
    /// `top_k` is clamped to the index size.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ContextItem>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        let k = top_k.min(self.index.len());
        let hits = self.index.search(&query_vec, k)?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.chunks.get(hit.id) {
                Some(chunk) => results.push(ContextItem {
                    content: chunk.text.clone(),
                }),
                None => tracing::warn!(
                    id = hit.id,
                    chunks = self.chunks.len(),
                    "index returned id outside chunk range, skipping"
                ),
            }
        }

        tracing::debug!(
            query,
            top_k = k,
            results = ?results,
            "retrieved context"
        );
        Ok(results)
    }
}

/// Embed all chunks and insert them into `index`.
///
/// Chunk `i` is stored under index id `i`. An empty chunk list leaves the
/// index empty and does not call the embedder.
///
/// # Errors
///
/// - [`RagError::Embedding`] if the embedder fails or returns a different
///   number of vectors than chunks.
/// - [`RagError::Index`] if a vector has the wrong dimension.
pub async fn build_retriever(
    chunks: Vec<Chunk>,
    embedder: Arc<dyn Embedder>,
    mut index: Box<dyn VectorIndex>,
) -> Result<Retriever> {
    if !chunks.is_empty() {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed(&texts)
            .await
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            ))
            .into());
        }

        for vector in &vectors {
            index.add(vector)?;
        }
    }

    tracing::info!(
        chunks = chunks.len(),
        dims = index.dims(),
        model = embedder.model_name(),
        "index built"
    );

    Ok(Retriever::new(chunks, index, embedder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::index::FlatL2Index;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as counts of the letters `a`, `b`, `c`.
    struct LetterEmbedder {
        calls: AtomicUsize,
    }

    impl LetterEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    ['a', 'b', 'c']
                        .iter()
                        .map(|l| t.chars().filter(|c| c == l).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0, 0.0, 0.0]])
        }
    }

    fn chunks() -> Vec<Chunk> {
        chunk_text("aaa aaa bbb bbb ccc ccc", 2, 0).unwrap()
    }

    #[tokio::test]
    async fn test_search_empty_index_skips_embedding() {
        let embedder = LetterEmbedder::new();
        let retriever =
            build_retriever(Vec::new(), embedder.clone(), Box::new(FlatL2Index::new(3)))
                .await
                .unwrap();
        assert!(retriever.is_empty());
        assert!(retriever.search("anything", 10).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_nearest_first() {
        let retriever = build_retriever(
            chunks(),
            LetterEmbedder::new(),
            Box::new(FlatL2Index::new(3)),
        )
        .await
        .unwrap();
        assert!(!retriever.is_empty());
        assert_eq!(retriever.len(), 3);
        let results = retriever.search("bbbbbb", 1).await.unwrap();
        assert_eq!(
            results,
            vec![ContextItem {
                content: "bbb bbb".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_top_k_clamped_and_subset() {
        let chunks = chunks();
        let known: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let retriever =
            build_retriever(chunks, LetterEmbedder::new(), Box::new(FlatL2Index::new(3)))
                .await
                .unwrap();
        for top_k in 1..6 {
            let results = retriever.search("abc", top_k).await.unwrap();
            assert!(results.len() <= top_k.min(retriever.len()));
            assert!(results.iter().all(|r| known.contains(&r.content)));
        }
    }

    #[tokio::test]
    async fn test_out_of_range_ids_skipped() {
        let mut index = FlatL2Index::new(3);
        index.add(&[6.0, 0.0, 0.0]).unwrap();
        index.add(&[0.0, 0.0, 0.0]).unwrap();
        let only_one = chunk_text("aaa aaa", 2, 0).unwrap();
        let retriever = Retriever::new(only_one, Box::new(index), LetterEmbedder::new());
        let results = retriever.search("x", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "aaa aaa");
    }

    #[tokio::test]
    async fn test_vector_count_mismatch() {
        let err = build_retriever(
            chunks(),
            Arc::new(ShortEmbedder),
            Box::new(FlatL2Index::new(3)),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::Embedding(_))
        ));
    }

    #[test]
    fn test_context_item_json_shape() {
        let item = ContextItem {
            content: "hello".to_string(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, serde_json::json!({ "content": "hello" }));
    }
}
