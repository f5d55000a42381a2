//! One completion call that turns retrieved snippets into an answer.

use std::fmt::Write as _;
use std::sync::Arc;

use repolens_llm::LlmError;
use repolens_llm::any::AnyProvider;
use repolens_llm::provider::{LlmProvider, Message};
use serde::Serialize;

use crate::retriever::RetrievedChunk;

const SYSTEM_PROMPT: &str = "You are an expert AI coding assistant.\n\n\
You must answer the user's question based ONLY on the retrieved code snippets.\n\
If useful, include code blocks using triple backticks.";

const ANSWER_SHAPE: &str = "Provide:\n\
- Clear explanation\n\
- Referenced code blocks\n\
- File or function names if detectable";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub repo: String,
    pub text: String,
}

/// Answer text together with the snippets it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub snippets: Vec<String>,
}

impl Answer {
    /// Attach `chunks` as provenance to `answer`, keeping their order.
    #[must_use]
    pub fn with_chunks(answer: impl Into<String>, chunks: &[RetrievedChunk]) -> Self {
        Self {
            answer: answer.into(),
            sources: chunks
                .iter()
                .map(|c| Source {
                    repo: c.repo.clone(),
                    text: c.text.clone(),
                })
                .collect(),
            snippets: chunks.iter().map(|c| c.text.clone()).collect(),
        }
    }

    /// An explanation with no provenance.
    #[must_use]
    pub fn message(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
            snippets: Vec::new(),
        }
    }
}

/// The completion service could not produce an answer.
#[derive(Debug, thiserror::Error)]
#[error("answer synthesis unavailable: {0}")]
pub struct SynthesisUnavailable(#[from] pub LlmError);

#[derive(Debug, Clone)]
pub struct AnswerSynthesizer {
    provider: Arc<AnyProvider>,
}

impl AnswerSynthesizer {
    #[must_use]
    pub fn new(provider: Arc<AnyProvider>) -> Self {
        Self { provider }
    }

    /// Ask the completion service once, constrained to `chunks`.
    ///
    /// # Errors
    ///
    /// Returns [`SynthesisUnavailable`] if the call fails or comes back empty.
    pub async fn synthesize(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Answer, SynthesisUnavailable> {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(build_prompt(question, chunks)),
        ];
        let text = self.provider.chat(&messages).await?;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: self.provider.name().to_owned(),
            }
            .into());
        }
        tracing::debug!(
            provider = self.provider.name(),
            snippets = chunks.len(),
            "answer synthesized"
        );
        Ok(Answer::with_chunks(text, chunks))
    }
}

/// Snippets in retrieval order, each introduced by a `---` separator.
#[must_use]
pub fn context_block(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("---\n{}", c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "User Question:\n{question}\n\nRelevant Code Snippets:\n{}\n\n{ANSWER_SHAPE}",
        context_block(chunks)
    );
    prompt
}
