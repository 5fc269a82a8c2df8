use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One uploaded table row: field name to dynamic value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Backing storage for the currently uploaded row set.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Discards every stored row. Paired with [`RowStore::insert_rows`] for a wholesale
    /// replacement; the two steps are not transactional.
    async fn clear_rows(&self) -> Result<()>;

    /// Appends rows and returns how many were stored.
    async fn insert_rows(&self, rows: Vec<Row>) -> Result<usize>;

    async fn load_rows(&self) -> Result<Vec<Row>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of answered questions.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<()>;

    async fn entries(&self) -> Result<Vec<HistoryEntry>>;
}
