//! Text generation providers.
//!
//! Concrete implementations of [`docchat_core::answer::Generator`]:
//! - **[`OllamaGenerator`]**: `POST /api/generate` on a local Ollama
//!   instance, raw prompt mode (no chat template applied).
//! - **[`OpenAIGenerator`]**: `POST /v1/completions` on any
//!   OpenAI-compatible completions server (vLLM, llama.cpp server, ...),
//!   with `echo` enabled so the prompt comes back in front of the output.
//!
//! Both honour the [`Generator`] contract of returning the prompt followed
//! by the continuation. Decoding is greedy (temperature 0) when
//! [`GenerationParams::greedy`] is set. Generation failures are not
//! retried.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use docchat_core::answer::{GenerationParams, Generator};

use crate::config::GenerationConfig;

/// Create the [`Generator`] configured in `[generation]`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn temperature(params: &GenerationParams) -> f32 {
    if params.greedy {
        0.0
    } else {
        0.7
    }
}

/// Send one request and return the JSON body, failing on any non-2xx status.
async fn post_json(
    request: reqwest::RequestBuilder,
    label: &str,
    url: &str,
) -> Result<serde_json::Value> {
    let response = request
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("{} connection error ({}): {}", label, url, e))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", label, status, body_text);
    }
    Ok(response.json().await?)
}

// ============ Ollama ============

pub struct OllamaGenerator {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            url: url.trim_end_matches('/').to_string(),
            client: http_client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "raw": true,
            "stream": false,
            "options": {
                "num_predict": params.max_new_tokens,
                "temperature": temperature(params),
            },
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let endpoint = format!("{}/api/generate", self.url);
        let request = self
            .client
            .post(&endpoint)
            .json(&self.request_body(prompt, params));
        let json = post_json(request, "Ollama", &endpoint).await?;
        let continuation = parse_ollama_response(&json)?;
        // Ollama returns only the new text.
        Ok(format!("{}{}", prompt, continuation))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<&str> {
    json.get("response")
        .and_then(|r| r.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}

// ============ OpenAI-compatible completions ============

/// Generator for OpenAI-compatible `/v1/completions` servers.
///
/// Sends `OPENAI_API_KEY` as a bearer token when it is set; local servers
/// usually need none.
pub struct OpenAIGenerator {
    model: String,
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            model,
            url: url.trim_end_matches('/').to_string(),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            client: http_client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": params.max_new_tokens,
            "temperature": temperature(params),
            "echo": true,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let endpoint = format!("{}/v1/completions", self.url);
        let mut request = self
            .client
            .post(&endpoint)
            .json(&self.request_body(prompt, params));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let json = post_json(request, "OpenAI", &endpoint).await?;
        Ok(parse_openai_response(&json)?.to_string())
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<&str> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("text"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].text"))
}
