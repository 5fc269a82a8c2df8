use anyhow::Result;
use async_trait::async_trait;

use crate::domain::exchange::{EmbeddingRecord, SimilarExchange};

/// Vector index backend bound to a single collection.
///
/// The collection name, dimension and cosine metric are fixed when the
/// repository is constructed.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    fn collection_name(&self) -> &str;

    /// Fails when the backend cannot be reached.
    async fn health_check(&self) -> Result<()>;

    async fn collection_exists(&self) -> Result<bool>;

    async fn create_collection(&self) -> Result<()>;

    async fn delete_collection(&self) -> Result<()>;

    /// Inserts one record. Never overwrites an existing record with a different id.
    async fn insert(&self, record: EmbeddingRecord) -> Result<()>;

    /// Returns up to `limit` records ordered by descending cosine similarity.
    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SimilarExchange>>;

    async fn count(&self) -> Result<u64>;
}
