use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::domain::rows::{HistoryEntry, HistoryStore, Row, RowStore};

/// In-process store for the uploaded table and, optionally, the query history.
#[derive(Default)]
pub struct MemoryDocumentStore {
    rows: RwLock<Vec<Row>>,
    history: RwLock<Vec<HistoryEntry>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RowStore for MemoryDocumentStore {
    async fn clear_rows(&self) -> Result<()> {
        let mut rows = self.rows.write().await;
        let discarded = rows.len();
        rows.clear();
        log::debug!("Discarded {} stored rows.", discarded);
        Ok(())
    }

    async fn insert_rows(&self, new_rows: Vec<Row>) -> Result<usize> {
        let inserted = new_rows.len();
        self.rows.write().await.extend(new_rows);
        Ok(inserted)
    }

    async fn load_rows(&self) -> Result<Vec<Row>> {
        Ok(self.rows.read().await.clone())
    }
}

#[async_trait]
impl HistoryStore for MemoryDocumentStore {
    async fn append(&self, entry: HistoryEntry) -> Result<()> {
        self.history.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.history.read().await.clone())
    }
}

/// Query history persisted as one JSON object per line.
pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    /// Creates the parent directory if needed. The file itself is created on first append.
    pub async fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent_dir) = path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir)
                    .await
                    .with_context(|| format!("Failed to create history directory {:?}", parent_dir))?;
            }
        }
        log::info!("Query history will be appended to {:?}", path);
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open history file {:?}", self.path))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(anyhow!("Failed to read history file {:?}: {}", self.path, e)),
        };

        let mut entries = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("Skipping malformed history line {}: {}", line_no + 1, e),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::tempdir;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn entry(question: &str) -> HistoryEntry {
        HistoryEntry {
            question: question.to_string(),
            answer: format!("answer to {}", question),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rows_are_replaced_by_clear_then_insert() {
        let store = MemoryDocumentStore::new();
        store
            .insert_rows(vec![row(json!({"title": "old"}))])
            .await
            .unwrap();

        store.clear_rows().await.unwrap();
        let inserted = store
            .insert_rows(vec![row(json!({"title": "a"})), row(json!({"title": "b"}))])
            .await
            .unwrap();

        assert_eq!(inserted, 2);
        let rows = store.load_rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], json!("a"));
        assert_eq!(rows[1]["title"], json!("b"));
    }

    #[tokio::test]
    async fn memory_history_keeps_order() {
        let store = MemoryDocumentStore::new();
        store.append(entry("first")).await.unwrap();
        store.append(entry("second")).await.unwrap();
        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].question, "first");
        assert_eq!(entries[1].question, "second");
    }

    #[tokio::test]
    async fn jsonl_history_survives_reopen() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("history.jsonl");

        let store = JsonlHistoryStore::open(path.clone()).await?;
        assert!(store.entries().await?.is_empty());
        store.append(entry("How much in 2020?")).await?;
        store.append(entry("And in 2021?")).await?;
        drop(store);

        let reopened = JsonlHistoryStore::open(path.clone()).await?;
        let entries = reopened.entries().await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].question, "How much in 2020?");
        assert_eq!(entries[1].answer, "answer to And in 2021?");

        let raw = std::fs::read_to_string(&path)?;
        assert_eq!(raw.lines().count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn jsonl_history_skips_malformed_lines() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("history.jsonl");
        let valid = serde_json::to_string(&entry("ok"))?;
        std::fs::write(&path, format!("{}\nnot json\n\n", valid))?;

        let store = JsonlHistoryStore::open(path).await?;
        let entries = store.entries().await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].question, "ok");
        Ok(())
    }
}
