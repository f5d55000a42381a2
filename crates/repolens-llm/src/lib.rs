//! Completion and embedding provider abstraction.
//!
//! The same provider instance serves both sides of the pipeline: indexing embeds
//! chunk text with it and question answering embeds the question with it, so the
//! two vector spaces always come from one model.

pub mod any;
pub mod compatible;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use error::LlmError;
pub use provider::LlmProvider;
