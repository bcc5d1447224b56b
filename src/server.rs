//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Retrieve context for a message and generate an answer |
//! | `POST` | `/search` | Retrieval only: the chunks `/chat` would use |
//! | `GET`  | `/health` | Health check (returns version and chunk count) |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embedding_failed` (502),
//! `generation_failed` (502), `timeout` (504), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! on another port can call the API during development. Tighten this
//! before exposing the server beyond localhost.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use docchat_core::retrieve::ContextItem;
use docchat_core::RagError;

use crate::config::Config;
use crate::context::{AppContext, AskError};

/// Builds the context from `config` and serves until the process exits.
///
/// Startup errors (missing document, model load failure, bind failure)
/// are returned before any request is accepted.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = Arc::new(AppContext::init(config).await?);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        "docchat listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

/// The application router over a prepared context.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/search", post(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(ctx)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"timeout"`).
    code: &'static str,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, "{}", self.message);
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<&RagError> for AppError {
    fn from(err: &RagError) -> Self {
        let message = err.to_string();
        match err {
            RagError::InvalidConfiguration(_) => AppError::bad_request(message),
            RagError::Embedding(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "embedding_failed", message)
            }
            RagError::Generation(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "generation_failed", message)
            }
            RagError::Index(_) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<RagError>() {
            Some(rag) => rag.into(),
            None => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                format!("{:#}", err),
            ),
        }
    }
}

// Malformed bodies (non-JSON, missing fields, wrong types) are client
// errors in the same shape as every other error.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<AskError> for AppError {
    fn from(err: AskError) -> Self {
        match &err {
            AskError::Rag(rag) => rag.into(),
            AskError::Timeout(_) => {
                AppError::new(StatusCode::GATEWAY_TIMEOUT, "timeout", err.to_string())
            }
        }
    }
}

fn validate_top_k(top_k: Option<usize>) -> Result<(), AppError> {
    if top_k == Some(0) {
        return Err(AppError::bad_request("top_k must be >= 1"));
    }
    Ok(())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Number of indexed chunks.
    chunks: usize,
}

async fn handle_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        chunks: ctx.chunk_count(),
    })
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
}

/// Handler for `POST /chat`.
///
/// Runs the full pipeline: embed the message, retrieve the nearest
/// chunks, generate under the configured timeout, return the answer.
async fn handle_chat(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload?;
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::bad_request("message must not be empty"));
    }
    validate_top_k(req.top_k)?;

    let context = ctx.search(message, req.top_k).await?;
    let answer = ctx.answer(&context, message).await?;

    tracing::info!(
        context_items = context.len(),
        answer_bytes = answer.len(),
        "chat answered"
    );
    Ok(Json(ChatResponse { answer }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<ContextItem>,
}

async fn handle_search(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(req) = payload?;
    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::bad_request("query must not be empty"));
    }
    validate_top_k(req.top_k)?;

    let results = ctx.search(query, req.top_k).await?;
    Ok(Json(SearchResponse { results }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rag_error_mapping() {
        let cases = [
            (
                RagError::InvalidConfiguration("x".into()),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (
                RagError::Embedding("x".into()),
                StatusCode::BAD_GATEWAY,
                "embedding_failed",
            ),
            (
                RagError::Generation("x".into()),
                StatusCode::BAD_GATEWAY,
                "generation_failed",
            ),
            (
                RagError::Index("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];
        for (err, status, code) in cases {
            let app: AppError = (&err).into();
            assert_eq!(app.status, status);
            assert_eq!(app.code, code);
        }
    }

    #[test]
    fn test_anyhow_downcast() {
        let err: anyhow::Error = RagError::Embedding("down".into()).into();
        let app: AppError = err.into();
        assert_eq!(app.code, "embedding_failed");

        let app: AppError = anyhow::anyhow!("something else").into();
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_timeout_mapping() {
        let app: AppError = AskError::Timeout(Duration::from_secs(3)).into();
        assert_eq!(app.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(app.code, "timeout");
        assert!(app.message.contains("3s"));
    }

    #[test]
    fn test_validate_top_k() {
        assert!(validate_top_k(None).is_ok());
        assert!(validate_top_k(Some(3)).is_ok());
        assert!(validate_top_k(Some(0)).is_err());
    }
}
