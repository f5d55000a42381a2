//! Repository indexing and multi-repository retrieval.
//!
//! Indexing turns a working copy into function, class and commit chunks, embeds
//! them and writes them into one vector collection per repository. Retrieval
//! embeds a question once, queries every selected repository's collection and
//! hands the merged snippets to the answer synthesizer.

pub mod chunk;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod indexer;
pub mod languages;
pub mod queue;
pub mod retriever;
pub mod store;
pub mod synthesizer;
pub mod working_copy;

pub use error::{IndexError, Result};

/// Rough token count used for context budgeting.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}
