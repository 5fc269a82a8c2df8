use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::exchange::{EmbeddingRecord, SimilarExchange};
use crate::domain::vector_repository::VectorRepository;
use crate::error::{InsightError, InsightResult};
use crate::infrastructure::embedding::TextEmbedder;

/// Builds the embedding function. Runs on the blocking pool, may download model files.
pub type EmbedderFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn TextEmbedder>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

enum State {
    Uninitialized,
    Initializing,
    Ready(Arc<dyn TextEmbedder>),
    Failed(String),
}

#[derive(Debug, Clone, Copy)]
pub struct VectorStoreSettings {
    pub dimension: usize,
    pub recreate_on_startup: bool,
}

/// Owns the embedding function and the vector index handle.
///
/// `initialize` moves the manager from `Uninitialized` to `Ready` (or `Failed`)
/// exactly once; every other operation requires `Ready`.
pub struct VectorStoreManager {
    repository: Arc<dyn VectorRepository>,
    embedder_factory: EmbedderFactory,
    settings: VectorStoreSettings,
    state: Mutex<State>,
    init_guard: tokio::sync::Mutex<()>,
}

impl VectorStoreManager {
    pub fn new(
        repository: Arc<dyn VectorRepository>,
        embedder_factory: EmbedderFactory,
        settings: VectorStoreSettings,
    ) -> Self {
        Self {
            repository,
            embedder_factory,
            settings,
            state: Mutex::new(State::Uninitialized),
            init_guard: tokio::sync::Mutex::new(()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> LifecycleState {
        match &*self.lock_state() {
            State::Uninitialized => LifecycleState::Uninitialized,
            State::Initializing => LifecycleState::Initializing,
            State::Ready(_) => LifecycleState::Ready,
            State::Failed(_) => LifecycleState::Failed,
        }
    }

    /// Connects, loads the embedding model and ensures the collection.
    ///
    /// Concurrent callers wait for the first attempt and share its outcome. Once
    /// `Failed`, later calls report the original failure without retrying.
    pub async fn initialize(&self) -> InsightResult<()> {
        let _guard = self.init_guard.lock().await;

        let previous_failure = match &*self.lock_state() {
            State::Ready(_) => return Ok(()),
            State::Failed(reason) => Some(reason.clone()),
            State::Uninitialized | State::Initializing => None,
        };
        if let Some(reason) = previous_failure {
            return Err(InsightError::InitializationFailed(reason));
        }

        *self.lock_state() = State::Initializing;
        log::info!(
            "Initializing vector store for collection '{}'...",
            self.repository.collection_name()
        );

        match self.run_initialization().await {
            Ok(embedder) => {
                *self.lock_state() = State::Ready(embedder);
                log::info!("Vector store ready.");
                Ok(())
            }
            Err(e) => {
                log::error!("Vector store initialization failed: {}", e);
                *self.lock_state() = State::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_initialization(&self) -> InsightResult<Arc<dyn TextEmbedder>> {
        self.repository
            .health_check()
            .await
            .map_err(InsightError::Connectivity)?;
        log::info!("Vector index backend is reachable.");

        log::info!("Loading embedding model...");
        let factory = Arc::clone(&self.embedder_factory);
        let embedder = tokio::task::spawn_blocking(move || factory())
            .await
            .map_err(|e| InsightError::ModelLoad(anyhow::anyhow!("embedding loader panicked: {}", e)))?
            .map_err(InsightError::ModelLoad)?;
        if embedder.dimension() != self.settings.dimension {
            return Err(InsightError::ModelLoad(anyhow::anyhow!(
                "embedding dimension {} does not match collection dimension {}",
                embedder.dimension(),
                self.settings.dimension
            )));
        }
        log::info!("Embedding model loaded ({} dimensions).", embedder.dimension());

        self.ensure_collection().await?;
        Ok(embedder)
    }

    async fn ensure_collection(&self) -> InsightResult<()> {
        let collection = self.repository.collection_name().to_string();
        let schema_error = |source: anyhow::Error| InsightError::SchemaSetup {
            collection: collection.clone(),
            source,
        };

        let exists = self
            .repository
            .collection_exists()
            .await
            .map_err(schema_error)?;

        if exists && !self.settings.recreate_on_startup {
            log::info!("Collection '{}' already exists, keeping stored exchanges.", collection);
            return Ok(());
        }
        if exists {
            log::warn!("recreate_on_startup is set: dropping collection '{}'.", collection);
            self.repository.delete_collection().await.map_err(schema_error)?;
        }
        self.repository.create_collection().await.map_err(schema_error)?;
        log::info!("Collection '{}' is ready.", collection);
        Ok(())
    }

    fn ready_embedder(&self) -> InsightResult<Arc<dyn TextEmbedder>> {
        match &*self.lock_state() {
            State::Ready(embedder) => Ok(Arc::clone(embedder)),
            _ => Err(InsightError::NotInitialized),
        }
    }

    /// Embeds `text` on the blocking pool.
    pub async fn embed(&self, text: &str) -> InsightResult<Vec<f32>> {
        let embedder = self.ready_embedder()?;
        let owned = text.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.embed(&owned))
            .await
            .map_err(|e| InsightError::Embedding(anyhow::anyhow!("embedding task failed: {}", e)))?
            .map_err(InsightError::Embedding)?;

        if vector.len() != self.settings.dimension {
            return Err(InsightError::Embedding(anyhow::anyhow!(
                "expected {} dimensions, got {}",
                self.settings.dimension,
                vector.len()
            )));
        }
        Ok(vector)
    }

    /// Stores a new exchange and returns its id. Identical questions accumulate.
    pub async fn upsert(&self, question: &str, answer: &str) -> InsightResult<String> {
        let vector = self.embed(question).await?;
        let id = Uuid::new_v4().to_string();
        self.repository
            .insert(EmbeddingRecord {
                id: id.clone(),
                vector,
                question: question.to_string(),
                answer: answer.to_string(),
            })
            .await
            .map_err(InsightError::Index)?;
        log::debug!("Stored exchange {} for question '{}'", id, preview(question));
        Ok(id)
    }

    /// Nearest stored exchanges, most similar first.
    pub async fn search_exchanges(&self, question: &str, top_k: usize) -> InsightResult<Vec<SimilarExchange>> {
        let vector = self.embed(question).await?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let mut results = self
            .repository
            .search(vector, top_k)
            .await
            .map_err(InsightError::Index)?;
        results.truncate(top_k);
        log::debug!(
            "Retrieved {} similar exchanges for question '{}'",
            results.len(),
            preview(question)
        );
        Ok(results)
    }

    /// Nearest stored exchanges rendered as `"Q: ...\nA: ..."` context strings.
    pub async fn search(&self, question: &str, top_k: usize) -> InsightResult<Vec<String>> {
        Ok(self
            .search_exchanges(question, top_k)
            .await?
            .iter()
            .map(SimilarExchange::as_context)
            .collect())
    }

    pub async fn record_count(&self) -> InsightResult<u64> {
        self.ready_embedder()?;
        self.repository.count().await.map_err(InsightError::Index)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(30).collect()
}
