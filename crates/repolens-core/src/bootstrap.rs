//! Component construction from [`Config`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use repolens_index::embedder::Embedder;
use repolens_index::extractor::{Extractor, ExtractorConfig};
use repolens_index::indexer::Indexer;
use repolens_index::queue::IndexQueue;
use repolens_index::retriever::{MultiRepoRetriever, RetrieverConfig};
use repolens_index::store::RepoStore;
use repolens_index::synthesizer::AnswerSynthesizer;
use repolens_index::working_copy::DirectoryCheckout;
use repolens_llm::any::AnyProvider;
use repolens_llm::compatible::CompatibleProvider;
use repolens_llm::ollama::OllamaProvider;
use repolens_llm::openai::OpenAiProvider;
use repolens_memory::sqlite::SqliteStore;
use repolens_memory::{InMemoryVectorStore, QdrantOps, VectorStore};

use crate::config::{Config, ProviderKind, VectorBackend};
use crate::qa::QaService;

/// Everything the CLI needs, wired from one [`Config`].
pub struct App {
    pub config: Config,
    pub provider: Arc<AnyProvider>,
    pub catalog: Arc<SqliteStore>,
    pub queue: IndexQueue,
    pub qa: QaService,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Build every component. The provider is shared by indexing, retrieval
    /// and synthesis so stored and query vectors come from one model.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a backend cannot
    /// be opened.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let provider = Arc::new(create_provider(&config)?);
        let catalog = Arc::new(open_catalog(&config.storage.sqlite_path).await?);
        let vectors = create_vector_store(&config)?;
        let store = RepoStore::new(vectors, config.storage.collection_prefix.clone());
        let embedder = Arc::new(Embedder::new(
            Arc::clone(&provider),
            config.index.embed_batch_size,
        ));

        let extractor = Extractor::new(ExtractorConfig {
            function_window: config.index.function_window,
            class_window: config.index.class_window,
            max_file_bytes: config.index.max_file_bytes,
        });
        let indexer = Indexer::new(
            catalog.clone(),
            Arc::new(DirectoryCheckout::new(&config.index.repos_dir)),
            extractor,
            Arc::clone(&embedder),
            store.clone(),
        );
        let queue = IndexQueue::new(Arc::new(indexer));

        let retriever = MultiRepoRetriever::new(
            catalog.clone(),
            embedder,
            store,
            RetrieverConfig {
                per_repo_limit: config.retrieval.per_repo_limit,
                budget_tokens: config.retrieval.context_budget_tokens,
            },
        );
        let qa = QaService::new(
            catalog.clone(),
            retriever,
            AnswerSynthesizer::new(Arc::clone(&provider)),
        );

        tracing::info!(
            provider = %config.llm.provider,
            model = %config.llm.model,
            embedding_model = %config.llm.embedding_model,
            "components ready"
        );

        Ok(Self {
            config,
            provider,
            catalog,
            queue,
            qa,
        })
    }
}

/// `--config` flag, then `REPOLENS_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("REPOLENS_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// # Errors
///
/// Returns an error if a hosted provider is selected without an API key.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
            llm.embedding_model.clone(),
        ))),
        ProviderKind::OpenAi => {
            let api_key = llm
                .api_key
                .as_ref()
                .context("REPOLENS_LLM_API_KEY required for the openai provider")?;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                api_key.expose().to_owned(),
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
                Some(llm.embedding_model.clone()),
            )))
        }
        ProviderKind::Compatible => {
            let api_key = llm.api_key.as_ref().with_context(|| {
                format!("REPOLENS_LLM_API_KEY required for {}", llm.compatible_name)
            })?;
            Ok(AnyProvider::Compatible(CompatibleProvider::new(
                llm.compatible_name.clone(),
                api_key.expose().to_owned(),
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
                Some(llm.embedding_model.clone()),
            )))
        }
    }
}

/// # Errors
///
/// Returns an error if the Qdrant client cannot be built.
pub fn create_vector_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.storage.vector_backend {
        VectorBackend::Qdrant => {
            let ops = QdrantOps::new(&config.storage.qdrant_url).with_context(|| {
                format!("failed to connect to Qdrant at {}", config.storage.qdrant_url)
            })?;
            Ok(Arc::new(ops))
        }
        VectorBackend::Memory => {
            tracing::warn!("using in-memory vector store, indexes are lost on exit");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
    }
}

async fn open_catalog(path: &str) -> anyhow::Result<SqliteStore> {
    if path != ":memory:"
        && let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    SqliteStore::new(path)
        .await
        .with_context(|| format!("failed to open repository database at {path}"))
}

/// Log whether the configured provider is reachable.
pub async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    }
}
