use anyhow::{Context, Result};
use std::sync::Arc;

use crate::application::analytics::AnalyticsEngine;
use crate::application::query_service::{QuerySettings, QueryService};
use crate::application::vector_store_manager::{EmbedderFactory, VectorStoreManager, VectorStoreSettings};
use crate::config::{EmbeddingProvider, InsightsConfig, VectorBackend};
use crate::domain::generation::GenerationService;
use crate::domain::rows::{HistoryStore, RowStore};
use crate::domain::vector_repository::VectorRepository;
use crate::infrastructure::embedding::{EmbeddingGenerator, HashingEmbedder, TextEmbedder};
use crate::infrastructure::{
    EmbeddingModel, GeminiClient, InMemoryVectorIndex, JsonlHistoryStore, MemoryDocumentStore, VectorDb,
};

/// Fully initialized collaborators, ready to serve requests.
pub struct AppServices {
    pub config: Arc<InsightsConfig>,
    pub vector_store: Arc<VectorStoreManager>,
    pub query_service: Arc<QueryService>,
}

/// Builds every collaborator from `config` and initializes the vector store.
///
/// Any failure here is fatal; the request surface must not start without a ready
/// vector store.
pub async fn initialize_services(config: Arc<InsightsConfig>) -> Result<AppServices> {
    let generator: Arc<dyn GenerationService> = Arc::new(
        GeminiClient::new(&config.generation).context("Failed to configure the generation service")?,
    );
    initialize_with_generator(config, generator).await
}

/// Same as [`initialize_services`], with an externally supplied generation service.
pub async fn initialize_with_generator(
    config: Arc<InsightsConfig>,
    generator: Arc<dyn GenerationService>,
) -> Result<AppServices> {
    let repository = build_repository(&config)?;
    let vector_store = Arc::new(VectorStoreManager::new(
        repository,
        build_embedder_factory(&config),
        VectorStoreSettings {
            dimension: config.vector_store.dimension as usize,
            recreate_on_startup: config.vector_store.recreate_on_startup,
        },
    ));
    vector_store.initialize().await?;

    let rows = Arc::new(MemoryDocumentStore::new());
    let history: Arc<dyn HistoryStore> = match &config.storage.history_path {
        Some(path) => Arc::new(JsonlHistoryStore::open(path.clone()).await?),
        None => rows.clone(),
    };
    let rows: Arc<dyn RowStore> = rows;

    let query_service = Arc::new(QueryService::new(
        rows,
        history,
        vector_store.clone(),
        generator,
        AnalyticsEngine::new(&config.analytics),
        QuerySettings::from_config(&config),
    ));

    Ok(AppServices {
        config,
        vector_store,
        query_service,
    })
}

fn build_repository(config: &InsightsConfig) -> Result<Arc<dyn VectorRepository>> {
    let settings = &config.vector_store;
    let repository: Arc<dyn VectorRepository> = match settings.backend {
        VectorBackend::Qdrant => {
            log::info!("Using Qdrant at {}", settings.url);
            Arc::new(VectorDb::connect(
                &settings.url,
                settings.collection_name.clone(),
                settings.dimension,
            )?)
        }
        VectorBackend::Memory => {
            log::info!("Using the in-memory vector index; exchanges are lost on exit.");
            Arc::new(InMemoryVectorIndex::new(
                settings.collection_name.clone(),
                settings.dimension as usize,
            ))
        }
    };
    Ok(repository)
}

fn build_embedder_factory(config: &InsightsConfig) -> EmbedderFactory {
    let dimension = config.vector_store.dimension as usize;
    match config.embedding.provider {
        EmbeddingProvider::FastEmbed => {
            let cache_dir = config.embedding.cache_dir.clone();
            Arc::new(move || -> Result<Arc<dyn TextEmbedder>> {
                log::info!("Loading embedding model (cache: {:?})...", cache_dir);
                let generator = EmbeddingGenerator::new(EmbeddingModel::AllMiniLML6V2, cache_dir.clone())?;
                Ok(Arc::new(generator))
            })
        }
        EmbeddingProvider::Hashing => {
            Arc::new(move || -> Result<Arc<dyn TextEmbedder>> { Ok(Arc::new(HashingEmbedder::new(dimension))) })
        }
    }
}
