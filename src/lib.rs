//! # docchat
//!
//! Ask questions about a single text document over HTTP.
//!
//! At startup the document is split into overlapping word windows, every
//! window is embedded, and the vectors go into an exact L2 index. Each
//! `POST /chat` request embeds the message, pulls the nearest chunks, and
//! asks a language model to answer from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ Document │──▶│ Chunker  │──▶│ Embedder │──▶ FlatL2Index
//! └──────────┘   └──────────┘   └──────────┘        │
//!                                                   ▼
//!   POST /chat ──▶ embed query ──▶ top-k chunks ──▶ prompt ──▶ Generator
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat chunks                     # inspect chunk boundaries
//! docchat ask "What is the deadline?"
//! docchat serve                      # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`context`] | Startup wiring and the shared application context |
//! | [`embedding`] | Embedding providers (fastembed, OpenAI, Ollama) |
//! | [`generation`] | Text generation providers (Ollama, OpenAI-compatible) |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`server`] | HTTP server |
//!
//! Chunking, the vector index, retrieval, and prompt assembly live in the
//! `docchat-core` crate.

pub mod config;
pub mod context;
pub mod embedding;
pub mod generation;
pub mod logging;
pub mod server;
