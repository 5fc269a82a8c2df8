pub use qdrant_client; // Re-export for integration tests
use self::qdrant_client::qdrant::value::Kind as QdrantValueKind;
use self::qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use self::qdrant_client::{Payload, Qdrant};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::exchange::{EmbeddingRecord, ExchangePayload, SimilarExchange};
use crate::domain::vector_repository::VectorRepository;

/// Qdrant collection holding question/answer exchanges.
pub struct VectorDb {
    client: Box<Qdrant>,
    collection_name: String,
    vector_size: u64,
}

impl VectorDb {
    /// Creates a new VectorDb instance. No network traffic happens here.
    ///
    /// # Arguments
    ///
    /// * `client` - A Qdrant client built from the configured URL.
    /// * `collection_name` - The name of the collection to use.
    /// * `vector_size` - The dimension of the vectors.
    pub fn new(client: Box<Qdrant>, collection_name: String, vector_size: u64) -> Result<Self> {
        if collection_name.is_empty() {
            return Err(anyhow!("Collection name cannot be empty"));
        }
        if vector_size == 0 {
            return Err(anyhow!("Vector size must be greater than zero"));
        }
        Ok(Self { client, collection_name, vector_size })
    }

    /// Builds a client for `url` and wraps it.
    pub fn connect(url: &str, collection_name: String, vector_size: u64) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .with_context(|| format!("Failed to build Qdrant client for {}", url))?;
        Self::new(Box::new(client), collection_name, vector_size)
    }

    fn to_point(record: EmbeddingRecord) -> Result<PointStruct> {
        let payload_value = serde_json::to_value(ExchangePayload {
            question: record.question,
            answer: record.answer,
        })?;
        let payload = Payload::try_from(payload_value)
            .map_err(|e| anyhow!("Failed to convert exchange payload: {}", e))?;
        Ok(PointStruct::new(record.id, record.vector, payload))
    }

    fn string_field(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> Option<String> {
        match payload.get(key).and_then(|v| v.kind.as_ref()) {
            Some(QdrantValueKind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn to_exchange(point: ScoredPoint) -> Option<SimilarExchange> {
        let question = Self::string_field(&point.payload, "question");
        let answer = Self::string_field(&point.payload, "answer");
        match (question, answer) {
            (Some(question), Some(answer)) => Some(SimilarExchange {
                question,
                answer,
                score: point.score,
            }),
            _ => {
                log::warn!("Search result point {:?} has an incomplete payload, skipping.", point.id);
                None
            }
        }
    }
}

#[async_trait]
impl VectorRepository for VectorDb {
    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    async fn health_check(&self) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| anyhow!("Qdrant is not reachable: {}", e))?;
        log::debug!(
            "Connected to Qdrant, {} existing collections.",
            collections.collections.len()
        );
        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool> {
        self.client
            .collection_exists(self.collection_name.clone())
            .await
            .map_err(|e| anyhow!("Failed to check collection '{}': {}", self.collection_name, e))
    }

    async fn create_collection(&self) -> Result<()> {
        log::info!(
            "Creating collection '{}' with size {} and distance Cosine...",
            self.collection_name,
            self.vector_size
        );
        let create_builder = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(self.vector_size, Distance::Cosine));

        match self.client.create_collection(create_builder).await {
            Ok(_) => {
                log::info!("Successfully created collection '{}'.", self.collection_name);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to create collection '{}': {}", self.collection_name, e);
                Err(anyhow!("Failed to create collection: {}", e))
            }
        }
    }

    async fn delete_collection(&self) -> Result<()> {
        log::warn!("Deleting collection '{}' and every stored exchange.", self.collection_name);
        self.client
            .delete_collection(self.collection_name.clone())
            .await
            .map_err(|e| anyhow!("Failed to delete collection '{}': {}", self.collection_name, e))?;
        Ok(())
    }

    async fn insert(&self, record: EmbeddingRecord) -> Result<()> {
        if record.vector.len() as u64 != self.vector_size {
            return Err(anyhow!(
                "Vector dimension ({}) does not match collection dimension ({})",
                record.vector.len(),
                self.vector_size
            ));
        }
        let point_id = record.id.clone();
        let point = Self::to_point(record)?;
        let upsert_builder =
            UpsertPointsBuilder::new(self.collection_name.clone(), vec![point]).wait(true);

        match self.client.upsert_points(upsert_builder).await {
            Ok(response) => {
                log::debug!("Upsert response for point {}: {:?}", point_id, response.result);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to upsert point into collection '{}': {}", self.collection_name, e);
                Err(anyhow!("Qdrant upsert failed: {}", e))
            }
        }
    }

    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SimilarExchange>> {
        if query_vector.len() as u64 != self.vector_size {
            return Err(anyhow!(
                "Query vector dimension ({}) does not match collection dimension ({})",
                query_vector.len(),
                self.vector_size
            ));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let request = SearchPointsBuilder::new(self.collection_name.clone(), query_vector, limit as u64)
            .with_payload(true);

        match self.client.search_points(request).await {
            Ok(response) => {
                log::debug!("Search found {} points in '{}'.", response.result.len(), self.collection_name);
                Ok(response.result.into_iter().filter_map(Self::to_exchange).collect())
            }
            Err(e) => {
                log::error!("Qdrant search failed in collection '{}': {}", self.collection_name, e);
                Err(anyhow!("Qdrant search failed: {}", e))
            }
        }
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection_name.clone()).exact(true))
            .await
            .map_err(|e| anyhow!("Qdrant count failed: {}", e))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}
