//! Prompt assembly and answer extraction.
//!
//! The answerer turns retrieved [`ContextItem`]s and the user query into a
//! single prompt, hands it to a [`Generator`], and returns only the text
//! the model appended after the prompt.
//!
//! # Prompt layout
//!
//! ```text
//! {system prompt}
//! Context:
//! {chunk 1}
//!
//! {chunk 2}
//!
//! Question: {query}
//! Answer:
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RagError;
use crate::retrieve::ContextItem;

/// Default new-token budget per answer.
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 256;

/// Default system instructions placed at the top of every prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
Answer the question using only the context below. \
If the context does not contain the answer, say that you do not know.";

/// Decoding settings for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    /// Maximum number of tokens to generate after the prompt.
    pub max_new_tokens: u32,
    /// Greedy decoding (no sampling).
    pub greedy: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            greedy: true,
        }
    }
}

/// Text generation capability.
///
/// Behaves like a causal language model decode: the returned string is
/// the full sequence, i.e. the prompt followed by the continuation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Generate a continuation of `prompt`, returning prompt + continuation.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Build the prompt for `query` over the retrieved `context`.
pub fn build_prompt(system_prompt: &str, context: &[ContextItem], query: &str) -> String {
    let context_block = context
        .iter()
        .map(|item| item.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\nContext:\n{}\n\nQuestion: {}\nAnswer:",
        system_prompt.trim(),
        context_block,
        query.trim()
    )
}

/// Strip `prompt` from the front of `output` and trim the remainder.
///
/// The prefix is removed verbatim when present. Tokenizer round-trips can
/// alter the echoed prompt slightly, so otherwise the first
/// `prompt.len()` bytes are dropped.
///
/// # Errors
///
/// [`RagError::Generation`] when the output is shorter than the prompt,
/// the cut does not fall on a character boundary, or nothing remains
/// after trimming.
pub fn extract_answer(prompt: &str, output: &str) -> Result<String, RagError> {
    let suffix = match output.strip_prefix(prompt) {
        Some(rest) => rest,
        None => {
            if output.len() < prompt.len() {
                return Err(RagError::Generation(format!(
                    "output ({} bytes) is shorter than the prompt ({} bytes)",
                    output.len(),
                    prompt.len()
                )));
            }
            output.get(prompt.len()..).ok_or_else(|| {
                RagError::Generation(
                    "output does not align with the prompt on a character boundary".to_string(),
                )
            })?
        }
    };

    let answer = suffix.trim();
    if answer.is_empty() {
        return Err(RagError::Generation(
            "model produced no text after the prompt".to_string(),
        ));
    }
    Ok(answer.to_string())
}

/// Build the prompt, run the generator, and return the new text only.
///
/// Any generator failure is reported as [`RagError::Generation`].
pub async fn generate_answer(
    generator: &dyn Generator,
    system_prompt: &str,
    params: &GenerationParams,
    context: &[ContextItem],
    query: &str,
) -> Result<String, RagError> {
    let prompt = build_prompt(system_prompt, context, query);
    tracing::debug!(
        model = generator.model_name(),
        prompt_bytes = prompt.len(),
        context_items = context.len(),
        "generating answer"
    );

    let output = generator
        .generate(&prompt, params)
        .await
        .map_err(|e| RagError::Generation(format!("{:#}", e)))?;

    extract_answer(&prompt, &output)
}
