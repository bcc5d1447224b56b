//! Application context.
//!
//! [`AppContext`] bundles everything a request needs: the chunked
//! document, its vector index, the embedding and generation providers,
//! and the settings that drive them. It is built once by
//! [`AppContext::init`] before the server starts and is read-only
//! afterwards, so handlers share it through an `Arc` without locking.
//!
//! Generation is the one serialized step: [`AppContext::answer`] takes
//! an async mutex so only one prompt runs against the model at a time.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use docchat_core::answer::{generate_answer, GenerationParams, Generator};
use docchat_core::chunk::chunk_text;
use docchat_core::embedding::Embedder;
use docchat_core::index::FlatL2Index;
use docchat_core::retrieve::{build_retriever, ContextItem, Retriever};
use docchat_core::RagError;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;

/// Per-request tuning derived from the config.
#[derive(Debug, Clone)]
pub struct Settings {
    pub top_k: usize,
    pub system_prompt: String,
    pub params: GenerationParams,
    pub generation_timeout: Duration,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            system_prompt: config.generation.system_prompt.clone(),
            params: GenerationParams {
                max_new_tokens: config.generation.max_new_tokens,
                greedy: true,
            },
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
        }
    }
}

/// Errors from a full question → answer run.
#[derive(Error, Debug)]
pub enum AskError {
    /// Retrieval or generation failed.
    #[error(transparent)]
    Rag(#[from] RagError),
    /// Generation did not finish within the configured timeout.
    #[error("generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

pub struct AppContext {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    settings: Settings,
    generation_gate: Mutex<()>,
}

impl AppContext {
    /// Build the context from config: read the document, chunk it,
    /// load the providers, and embed every chunk.
    ///
    /// Any failure here is fatal; the server must not start without a
    /// complete index.
    pub async fn init(config: &Config) -> Result<Self> {
        let text = read_document(&config.document.path)?;

        let chunks = chunk_text(&text, config.chunking.window, config.chunking.overlap)
            .context("Failed to chunk document")?;
        tracing::info!(
            path = %config.document.path.display(),
            chunks = chunks.len(),
            window = config.chunking.window,
            overlap = config.chunking.overlap,
            "document chunked"
        );

        let embedder = create_embedder(&config.embedding)
            .await
            .context("Failed to initialize embedding provider")?;
        let generator = create_generator(&config.generation)
            .context("Failed to initialize generation provider")?;

        Self::build(chunks, embedder, generator, Settings::from_config(config)).await
    }

    /// Build the context from already chunked text and explicit providers.
    pub async fn build(
        chunks: Vec<docchat_core::chunk::Chunk>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        settings: Settings,
    ) -> Result<Self> {
        let index = Box::new(FlatL2Index::new(embedder.dims()));
        let retriever = build_retriever(chunks, embedder, index)
            .await
            .context("Failed to build vector index")?;

        Ok(Self {
            retriever,
            generator,
            settings,
            generation_gate: Mutex::new(()),
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.retriever.chunks().len()
    }

    /// Retrieve up to `top_k` chunks (config default when `None`).
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<ContextItem>> {
        self.retriever
            .search(query, top_k.unwrap_or(self.settings.top_k))
            .await
    }

    /// Generate an answer for `query` over `context`.
    ///
    /// Waits for any in-flight generation to finish first. The timeout
    /// covers both the wait and the generation call, so a request never
    /// takes longer than `generation_timeout` however many are queued.
    pub async fn answer(&self, context: &[ContextItem], query: &str) -> Result<String, AskError> {
        let timeout = self.settings.generation_timeout;

        tokio::time::timeout(timeout, async {
            let _guard = self.generation_gate.lock().await;
            generate_answer(
                self.generator.as_ref(),
                &self.settings.system_prompt,
                &self.settings.params,
                context,
                query,
            )
            .await
        })
        .await
        .map_err(|_| AskError::Timeout(timeout))?
        .map_err(AskError::Rag)
    }
}

/// Read the source document, attaching the path to any error.
pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Two-dimensional embedding: word count and character count.
    struct ShapeEmbedder;

    #[async_trait]
    impl Embedder for ShapeEmbedder {
        fn model_name(&self) -> &str {
            "shape"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.split_whitespace().count() as f32, t.len() as f32])
                .collect())
        }
    }

    /// Appends a fixed answer, optionally after a delay, and tracks overlap.
    struct SlowGenerator {
        delay: Duration,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl SlowGenerator {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Generator for SlowGenerator {
        fn model_name(&self) -> &str {
            "slow"
        }
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("{} forty-two", prompt))
        }
    }

    fn settings(timeout: Duration) -> Settings {
        Settings {
            top_k: 2,
            system_prompt: "sys".to_string(),
            params: GenerationParams::default(),
            generation_timeout: timeout,
        }
    }

    async fn context_with(generator: Arc<dyn Generator>, timeout: Duration) -> AppContext {
        let chunks = chunk_text("one two three four five six seven", 3, 1).unwrap();
        AppContext::build(chunks, Arc::new(ShapeEmbedder), generator, settings(timeout))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_search_uses_default_top_k() {
        let ctx = context_with(SlowGenerator::new(Duration::ZERO), Duration::from_secs(5)).await;
        assert_eq!(ctx.chunk_count(), 4);
        assert_eq!(ctx.search("two words", None).await.unwrap().len(), 2);
        assert_eq!(ctx.search("two words", Some(10)).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_answer() {
        let ctx = context_with(SlowGenerator::new(Duration::ZERO), Duration::from_secs(5)).await;
        let context = ctx.search("q", None).await.unwrap();
        assert_eq!(ctx.answer(&context, "q").await.unwrap(), "forty-two");
    }

    #[tokio::test]
    async fn test_answer_timeout() {
        let ctx = context_with(
            SlowGenerator::new(Duration::from_secs(5)),
            Duration::from_millis(50),
        )
        .await;
        let err = ctx.answer(&[], "q").await.unwrap_err();
        assert!(matches!(err, AskError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_generation_serialized() {
        let generator = SlowGenerator::new(Duration::from_millis(30));
        let ctx = Arc::new(context_with(generator.clone(), Duration::from_secs(5)).await);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move { ctx.answer(&[], "q").await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(generator.max_running.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queue_wait_counts_toward_timeout() {
        let ctx = Arc::new(
            context_with(
                SlowGenerator::new(Duration::from_millis(200)),
                Duration::from_millis(300),
            )
            .await,
        );

        let first = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.answer(&[], "q").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = ctx.answer(&[], "q").await;

        assert!(matches!(second, Err(AskError::Timeout(_))));
        assert_eq!(first.await.unwrap().unwrap(), "forty-two");
    }

    #[test]
    fn test_read_document_missing() {
        let err = read_document(Path::new("/nonexistent/doc.txt")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/doc.txt"));
    }
}
