//! Question answering over the user's selected repositories.

use std::sync::Arc;

use repolens_index::retriever::{MultiRepoRetriever, Retrieval, RetrievedChunk};
use repolens_index::synthesizer::{Answer, AnswerSynthesizer};
use repolens_memory::RepositoryCatalog;
use serde::Serialize;

pub const NOTHING_SELECTED: &str =
    "You have no repositories selected. Select at least one repository first.";
pub const NO_RELEVANT_CONTENT: &str = "No relevant code found in selected repositories.";
pub const SEARCH_UNAVAILABLE: &str =
    "Repository search is unavailable right now. Please try again later.";
pub const SYNTHESIS_UNAVAILABLE: &str = "The answer service is unavailable right now. \
Here are the most relevant snippets from your repositories.";

/// How an answer was produced. Every variant carries a user-facing `answer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QaOutcome {
    Answered,
    /// Retrieval worked but the completion service did not; the snippets are returned raw.
    Degraded,
    NothingSelected,
    NoRelevantContent,
    /// The question could not be embedded or the selection could not be read.
    SearchUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaResponse {
    pub outcome: QaOutcome,
    #[serde(flatten)]
    pub answer: Answer,
}

impl QaResponse {
    fn message(outcome: QaOutcome, text: &str) -> Self {
        Self {
            outcome,
            answer: Answer::message(text),
        }
    }
}

pub struct QaService {
    catalog: Arc<dyn RepositoryCatalog>,
    retriever: MultiRepoRetriever,
    synthesizer: AnswerSynthesizer,
}

impl std::fmt::Debug for QaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaService")
            .field("retriever", &self.retriever)
            .field("synthesizer", &self.synthesizer)
            .finish_non_exhaustive()
    }
}

impl QaService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn RepositoryCatalog>,
        retriever: MultiRepoRetriever,
        synthesizer: AnswerSynthesizer,
    ) -> Self {
        Self {
            catalog,
            retriever,
            synthesizer,
        }
    }

    /// Answer `question` from the repositories `user_id` has selected.
    pub async fn answer_for_user(&self, user_id: i64, question: &str) -> QaResponse {
        match self.catalog.selected_ids(user_id).await {
            Ok(ids) => self.answer(question, &ids).await,
            Err(e) => {
                tracing::warn!(user_id, "failed to load selected repositories: {e}");
                QaResponse::message(QaOutcome::SearchUnavailable, SEARCH_UNAVAILABLE)
            }
        }
    }

    /// Answer `question` from the given repositories.
    pub async fn answer(&self, question: &str, repo_ids: &[i64]) -> QaResponse {
        let chunks = match self.retriever.retrieve(question, repo_ids).await {
            Ok(Retrieval::Found(chunks)) => chunks,
            Ok(Retrieval::NothingSelected) => {
                return QaResponse::message(QaOutcome::NothingSelected, NOTHING_SELECTED);
            }
            Ok(Retrieval::NoRelevantContent) => {
                return QaResponse::message(QaOutcome::NoRelevantContent, NO_RELEVANT_CONTENT);
            }
            Err(e) => {
                tracing::warn!("question embedding failed: {e}");
                return QaResponse::message(QaOutcome::SearchUnavailable, SEARCH_UNAVAILABLE);
            }
        };

        match self.synthesizer.synthesize(question, &chunks).await {
            Ok(answer) => QaResponse {
                outcome: QaOutcome::Answered,
                answer,
            },
            Err(e) => {
                tracing::warn!(snippets = chunks.len(), "{e}, returning raw snippets");
                degraded(&chunks)
            }
        }
    }
}

fn degraded(chunks: &[RetrievedChunk]) -> QaResponse {
    QaResponse {
        outcome: QaOutcome::Degraded,
        answer: Answer::with_chunks(SYNTHESIS_UNAVAILABLE, chunks),
    }
}

#[cfg(test)]
mod tests {
    use repolens_index::chunk::{Chunk, ChunkKind};
    use repolens_index::embedder::Embedder;
    use repolens_index::languages::Lang;
    use repolens_index::retriever::RetrieverConfig;
    use repolens_index::store::{EmbeddedChunk, RepoStore};
    use repolens_llm::any::AnyProvider;
    use repolens_llm::mock::MockProvider;
    use repolens_memory::sqlite::SqliteStore;
    use repolens_memory::{InMemoryVectorStore, NewRepository};

    use super::*;

    struct Fixture {
        catalog: Arc<SqliteStore>,
        store: RepoStore,
        embedder: Arc<Embedder>,
    }

    impl Fixture {
        async fn new(embeddings: MockProvider) -> Self {
            Self {
                catalog: Arc::new(SqliteStore::new(":memory:").await.unwrap()),
                store: RepoStore::new(Arc::new(InMemoryVectorStore::new()), "repo"),
                embedder: Arc::new(Embedder::new(Arc::new(AnyProvider::Mock(embeddings)), 8)),
            }
        }

        fn service(&self, chat: MockProvider) -> QaService {
            QaService::new(
                self.catalog.clone(),
                MultiRepoRetriever::new(
                    self.catalog.clone(),
                    Arc::clone(&self.embedder),
                    self.store.clone(),
                    RetrieverConfig::default(),
                ),
                AnswerSynthesizer::new(Arc::new(AnyProvider::Mock(chat))),
            )
        }

        async fn indexed_repo(&self, full_name: &str, body: &str) -> i64 {
            let id = self
                .catalog
                .add(NewRepository {
                    user_id: 1,
                    name: "app".into(),
                    full_name: full_name.into(),
                    local_path: None,
                })
                .await
                .unwrap()
                .id;
            let mut chunk = Chunk::code(
                ChunkKind::Function,
                Lang::Python,
                "app.py",
                "handler",
                body.into(),
            );
            chunk.id = "code_0".into();
            let vector = self.embedder.embed(body).await.unwrap();
            let dim = u64::try_from(vector.len()).unwrap();
            let collection = self.store.recreate(id, dim).await.unwrap();
            self.store
                .upsert(&collection, vec![EmbeddedChunk { chunk, vector }])
                .await
                .unwrap();
            self.catalog.set_indexed(id, true).await.unwrap();
            self.catalog.set_selected(id, true).await.unwrap();
            id
        }
    }

    #[tokio::test]
    async fn answers_with_sources() {
        let fx = Fixture::new(MockProvider::default()).await;
        let id = fx.indexed_repo("acme/api", "def login(user): check password").await;
        let service = fx.service(MockProvider::with_responses(vec!["Use login.".into()]));

        let response = service.answer("how does login work", &[id]).await;

        assert_eq!(response.outcome, QaOutcome::Answered);
        assert_eq!(response.answer.answer, "Use login.");
        assert_eq!(response.answer.sources[0].repo, "acme/api");
        assert_eq!(
            response.answer.snippets,
            vec!["def login(user): check password".to_owned()]
        );
    }

    #[tokio::test]
    async fn empty_selection_is_explicit() {
        let fx = Fixture::new(MockProvider::default()).await;
        let response = fx.service(MockProvider::default()).answer_for_user(1, "q").await;
        assert_eq!(response.outcome, QaOutcome::NothingSelected);
        assert_eq!(response.answer.answer, NOTHING_SELECTED);
        assert!(response.answer.sources.is_empty());
        assert!(response.answer.snippets.is_empty());
    }

    #[tokio::test]
    async fn selected_but_unindexed_is_no_relevant_content() {
        let fx = Fixture::new(MockProvider::default()).await;
        let id = fx
            .catalog
            .add(NewRepository {
                user_id: 1,
                name: "new".into(),
                full_name: "acme/new".into(),
                local_path: None,
            })
            .await
            .unwrap()
            .id;
        fx.catalog.set_selected(id, true).await.unwrap();

        let chat = MockProvider::default();
        let response = fx.service(chat.clone()).answer_for_user(1, "q").await;

        assert_eq!(response.outcome, QaOutcome::NoRelevantContent);
        assert_eq!(response.answer.answer, NO_RELEVANT_CONTENT);
        assert!(chat.requests().is_empty());
    }

    #[tokio::test]
    async fn chat_failure_degrades_to_snippets() {
        let fx = Fixture::new(MockProvider::default()).await;
        fx.indexed_repo("acme/api", "def login(user): check password").await;

        let response = fx.service(MockProvider::failing()).answer_for_user(1, "login").await;

        assert_eq!(response.outcome, QaOutcome::Degraded);
        assert_eq!(response.answer.answer, SYNTHESIS_UNAVAILABLE);
        assert_eq!(response.answer.sources.len(), 1);
        assert_eq!(response.answer.snippets.len(), 1);
    }

    #[tokio::test]
    async fn embedding_failure_is_search_unavailable() {
        let fx = Fixture::new(MockProvider::default().with_failing_embeddings()).await;
        let response = fx.service(MockProvider::default()).answer("q", &[1]).await;
        assert_eq!(response.outcome, QaOutcome::SearchUnavailable);
        assert!(response.answer.sources.is_empty());
    }

    #[test]
    fn response_serializes_flat() {
        let response = QaResponse::message(QaOutcome::NoRelevantContent, NO_RELEVANT_CONTENT);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["outcome"], "no_relevant_content");
        assert_eq!(json["answer"], NO_RELEVANT_CONTENT);
        assert_eq!(json["sources"], serde_json::json!([]));
        assert_eq!(json["snippets"], serde_json::json!([]));
    }
}
