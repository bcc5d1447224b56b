//! # docchat core
//!
//! Runtime-independent logic for docchat: word-window chunking, the exact
//! flat vector index, retrieval, and prompt/answer assembly.
//!
//! Embedding and text generation are reached only through the
//! [`embedding::Embedder`] and [`answer::Generator`] traits. This crate has
//! no HTTP client, filesystem I/O, or ML runtime dependencies, so every
//! stage can be tested with fake capabilities.

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod retrieve;

pub use error::RagError;
