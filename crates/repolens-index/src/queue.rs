//! Background indexing with observable state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::error::Result;
use crate::indexer::{IndexReport, Indexer};

/// Indexing state of a repository as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    NotIndexed,
    Indexing,
    Indexed,
}

impl IndexState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotIndexed => "not indexed",
            Self::Indexing => "indexing",
            Self::Indexed => "indexed",
        }
    }
}

/// Progress of one queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed(IndexReport),
    Failed(String),
}

/// Completion channel for one job. Several tickets may watch the same job.
#[derive(Debug, Clone)]
pub struct IndexTicket {
    pub repo_id: i64,
    rx: watch::Receiver<JobStatus>,
}

impl IndexTicket {
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.rx.borrow().clone()
    }

    /// Wait until the job completes or fails.
    pub async fn wait(mut self) -> JobStatus {
        match self
            .rx
            .wait_for(|s| !matches!(s, JobStatus::Running))
            .await
        {
            Ok(status) => status.clone(),
            Err(_) => JobStatus::Failed("indexing task ended without a result".into()),
        }
    }
}

type Jobs = Arc<Mutex<HashMap<i64, watch::Receiver<JobStatus>>>>;

/// Runs indexing jobs on the tokio runtime, one in flight per repository.
///
/// Enqueueing a repository that is already indexing joins the running job
/// instead of starting another.
#[derive(Clone)]
pub struct IndexQueue {
    indexer: Arc<Indexer>,
    jobs: Jobs,
}

impl std::fmt::Debug for IndexQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexQueue").finish_non_exhaustive()
    }
}

impl IndexQueue {
    #[must_use]
    pub fn new(indexer: Arc<Indexer>) -> Self {
        Self {
            indexer,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start indexing `repo_id` in the background, or join the job already running.
    #[must_use]
    pub fn enqueue(&self, repo_id: i64) -> IndexTicket {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = jobs.get(&repo_id) {
            tracing::debug!(repo_id, "joining in-flight indexing job");
            return IndexTicket {
                repo_id,
                rx: rx.clone(),
            };
        }

        let (tx, rx) = watch::channel(JobStatus::Running);
        jobs.insert(repo_id, rx.clone());
        drop(jobs);

        let indexer = Arc::clone(&self.indexer);
        let jobs = Arc::clone(&self.jobs);
        let own_rx = rx.clone();
        tokio::spawn(async move {
            let status = match indexer.index(repo_id).await {
                Ok(report) => JobStatus::Completed(report),
                Err(e) => JobStatus::Failed(e.to_string()),
            };
            {
                let mut jobs = jobs.lock().unwrap_or_else(PoisonError::into_inner);
                if jobs.get(&repo_id).is_some_and(|r| r.same_channel(&own_rx)) {
                    jobs.remove(&repo_id);
                }
            }
            let _ = tx.send(status);
        });

        IndexTicket { repo_id, rx }
    }

    #[must_use]
    pub fn is_indexing(&self, repo_id: i64) -> bool {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&repo_id)
    }

    /// # Errors
    ///
    /// Returns an error if the repository record cannot be read.
    pub async fn state(&self, repo_id: i64) -> Result<IndexState> {
        if self.is_indexing(repo_id) {
            return Ok(IndexState::Indexing);
        }
        let record = self.indexer.catalog().get(repo_id).await?;
        Ok(match record {
            Some(r) if r.indexed => IndexState::Indexed,
            _ => IndexState::NotIndexed,
        })
    }
}

#[cfg(test)]
mod tests {
    use repolens_llm::any::AnyProvider;
    use repolens_llm::mock::MockProvider;
    use repolens_memory::sqlite::SqliteStore;
    use repolens_memory::{InMemoryVectorStore, NewRepository, RepositoryCatalog};
    use tempfile::TempDir;

    use super::*;
    use crate::embedder::Embedder;
    use crate::extractor::Extractor;
    use crate::store::RepoStore;
    use crate::working_copy::DirectoryCheckout;

    async fn setup(mock: MockProvider) -> (IndexQueue, Arc<SqliteStore>, TempDir) {
        let catalog = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let repos_dir = tempfile::tempdir().unwrap();
        let indexer = Indexer::new(
            catalog.clone(),
            Arc::new(DirectoryCheckout::new(repos_dir.path())),
            Extractor::default(),
            Arc::new(Embedder::new(Arc::new(AnyProvider::Mock(mock)), 8)),
            RepoStore::new(Arc::new(InMemoryVectorStore::new()), "repo"),
        );
        (IndexQueue::new(Arc::new(indexer)), catalog, repos_dir)
    }

    async fn add_repo(catalog: &SqliteStore, dir: &TempDir, with_checkout: bool) -> i64 {
        let record = catalog
            .add(NewRepository {
                user_id: 1,
                name: "app".into(),
                full_name: "acme/app".into(),
                local_path: None,
            })
            .await
            .unwrap();
        if with_checkout {
            let root = dir.path().join(record.id.to_string());
            std::fs::create_dir_all(&root).unwrap();
            std::fs::write(root.join("a.py"), "def a():\n    pass\n").unwrap();
        }
        record.id
    }

    #[tokio::test]
    async fn completed_job_marks_repository_indexed() {
        let (queue, catalog, dir) = setup(MockProvider::default()).await;
        let id = add_repo(&catalog, &dir, true).await;
        assert_eq!(queue.state(id).await.unwrap(), IndexState::NotIndexed);

        let status = queue.enqueue(id).wait().await;

        let JobStatus::Completed(report) = status else {
            panic!("expected completion, got {status:?}");
        };
        assert_eq!(report.code_chunks, 1);
        assert_eq!(queue.state(id).await.unwrap(), IndexState::Indexed);
    }

    #[tokio::test]
    async fn second_enqueue_joins_running_job() {
        let (queue, catalog, dir) = setup(MockProvider::default().with_delay(50)).await;
        let id = add_repo(&catalog, &dir, true).await;

        let first = queue.enqueue(id);
        let second = queue.enqueue(id);
        assert_eq!(queue.state(id).await.unwrap(), IndexState::Indexing);
        assert_eq!(second.status(), JobStatus::Running);

        let (a, b) = tokio::join!(first.wait(), second.wait());
        assert_eq!(a, b);
        assert!(matches!(a, JobStatus::Completed(_)));
        assert!(!queue.is_indexing(id));
    }

    #[tokio::test]
    async fn failed_job_reports_error_and_stays_unindexed() {
        let (queue, catalog, dir) = setup(MockProvider::default()).await;
        let id = add_repo(&catalog, &dir, false).await;

        let status = queue.enqueue(id).wait().await;

        let JobStatus::Failed(message) = status else {
            panic!("expected failure, got {status:?}");
        };
        assert!(message.contains("working copy"));
        assert_eq!(queue.state(id).await.unwrap(), IndexState::NotIndexed);
    }

    #[test]
    fn state_labels() {
        assert_eq!(IndexState::Indexing.as_str(), "indexing");
        assert_eq!(IndexState::NotIndexed.as_str(), "not indexed");
    }
}
