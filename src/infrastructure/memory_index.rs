use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::RwLock;

use crate::domain::exchange::{EmbeddingRecord, SimilarExchange};
use crate::domain::vector_repository::VectorRepository;

const EPSILON: f32 = 1e-8;

/// Raw cosine similarity in `[-1, 1]`, `None` on length mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let (mut dot, mut mag_a, mut mag_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    let denominator = (mag_a * mag_b).sqrt();
    if denominator < EPSILON {
        Some(0.0)
    } else {
        Some((dot / denominator).clamp(-1.0, 1.0))
    }
}

#[derive(Default)]
struct Collection {
    records: Vec<EmbeddingRecord>,
}

/// Process-local vector index with exact cosine search.
///
/// Selected with `vector_store.backend = "memory"`. Contents are lost on restart.
pub struct InMemoryVectorIndex {
    collection_name: String,
    dimension: usize,
    collection: RwLock<Option<Collection>>,
}

impl InMemoryVectorIndex {
    pub fn new(collection_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            collection_name: collection_name.into(),
            dimension,
            collection: RwLock::new(None),
        }
    }

    fn missing(&self) -> anyhow::Error {
        anyhow!("Collection '{}' does not exist", self.collection_name)
    }
}

#[async_trait]
impl VectorRepository for InMemoryVectorIndex {
    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool> {
        let guard = self.collection.read().map_err(|_| anyhow!("index lock poisoned"))?;
        Ok(guard.is_some())
    }

    async fn create_collection(&self) -> Result<()> {
        let mut guard = self.collection.write().map_err(|_| anyhow!("index lock poisoned"))?;
        if guard.is_some() {
            return Err(anyhow!("Collection '{}' already exists", self.collection_name));
        }
        *guard = Some(Collection::default());
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        let mut guard = self.collection.write().map_err(|_| anyhow!("index lock poisoned"))?;
        *guard = None;
        Ok(())
    }

    async fn insert(&self, record: EmbeddingRecord) -> Result<()> {
        if record.vector.len() != self.dimension {
            return Err(anyhow!(
                "Vector dimension ({}) does not match collection dimension ({})",
                record.vector.len(),
                self.dimension
            ));
        }
        let mut guard = self.collection.write().map_err(|_| anyhow!("index lock poisoned"))?;
        let collection = guard.as_mut().ok_or_else(|| self.missing())?;
        if collection.records.iter().any(|r| r.id == record.id) {
            return Err(anyhow!("Record '{}' already exists", record.id));
        }
        collection.records.push(record);
        Ok(())
    }

    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SimilarExchange>> {
        if query_vector.len() != self.dimension {
            return Err(anyhow!(
                "Query vector dimension ({}) does not match collection dimension ({})",
                query_vector.len(),
                self.dimension
            ));
        }
        let guard = self.collection.read().map_err(|_| anyhow!("index lock poisoned"))?;
        let collection = guard.as_ref().ok_or_else(|| self.missing())?;

        let mut scored: Vec<(f32, &EmbeddingRecord)> = collection
            .records
            .iter()
            .filter_map(|r| cosine_similarity(&query_vector, &r.vector).map(|s| (s, r)))
            .collect();
        // stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, r)| SimilarExchange {
                question: r.question.clone(),
                answer: r.answer.clone(),
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let guard = self.collection.read().map_err(|_| anyhow!("index lock poisoned"))?;
        let collection = guard.as_ref().ok_or_else(|| self.missing())?;
        Ok(collection.records.len() as u64)
    }
}
