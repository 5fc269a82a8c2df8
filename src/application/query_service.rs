use chrono::Utc;
use std::sync::Arc;

use crate::application::analytics::{render_stats, AnalyticsEngine, SalesAggregate};
use crate::application::prompt::{build_prompt, render_table, PromptContext};
use crate::application::vector_store_manager::VectorStoreManager;
use crate::config::InsightsConfig;
use crate::domain::exchange::SimilarExchange;
use crate::domain::generation::{GenerationParams, GenerationService};
use crate::domain::rows::{HistoryEntry, HistoryStore, Row, RowStore};
use crate::error::{InsightError, InsightResult};

#[derive(Debug, Clone, Copy)]
pub struct QuerySettings {
    pub top_k: usize,
    pub sample_rows: usize,
    pub generation: GenerationParams,
}

impl QuerySettings {
    pub fn from_config(config: &InsightsConfig) -> Self {
        Self {
            top_k: config.query.top_k,
            sample_rows: config.query.sample_rows,
            generation: GenerationParams {
                temperature: config.generation.temperature,
                max_output_tokens: config.generation.max_output_tokens,
            },
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            sample_rows: 50,
            generation: GenerationParams::default(),
        }
    }
}

/// Answers questions about the uploaded table.
///
/// Each answer is grounded in the yearly sales aggregates, a sample of the raw rows and
/// the most similar past exchanges. Nothing is written until the generation service
/// has produced an answer.
pub struct QueryService {
    rows: Arc<dyn RowStore>,
    history: Arc<dyn HistoryStore>,
    vector_store: Arc<VectorStoreManager>,
    generator: Arc<dyn GenerationService>,
    analytics: AnalyticsEngine,
    settings: QuerySettings,
}

impl QueryService {
    pub fn new(
        rows: Arc<dyn RowStore>,
        history: Arc<dyn HistoryStore>,
        vector_store: Arc<VectorStoreManager>,
        generator: Arc<dyn GenerationService>,
        analytics: AnalyticsEngine,
        settings: QuerySettings,
    ) -> Self {
        Self {
            rows,
            history,
            vector_store,
            generator,
            analytics,
            settings,
        }
    }

    /// Replaces the stored table. Returns the number of rows stored.
    pub async fn upload(&self, rows: Vec<Row>) -> InsightResult<usize> {
        if rows.is_empty() {
            return Err(InsightError::EmptyUpload);
        }
        self.rows.clear_rows().await.map_err(InsightError::Storage)?;
        let inserted = self
            .rows
            .insert_rows(rows)
            .await
            .map_err(InsightError::Storage)?;
        log::info!("Stored {} uploaded rows.", inserted);
        Ok(inserted)
    }

    pub async fn sales_stats(&self) -> InsightResult<Vec<SalesAggregate>> {
        let rows = self.load_rows().await?;
        self.analytics.sales_by_year(&rows)
    }

    pub async fn answer(&self, question: &str) -> InsightResult<String> {
        let rows = self.load_rows().await?;
        let stats = self.analytics.sales_by_year(&rows)?;
        let sales_summary = render_stats(&stats);

        let similar = self.vector_store.search(question, self.settings.top_k).await?;
        let data_sample = render_table(&rows, self.settings.sample_rows);

        let prompt = build_prompt(&PromptContext {
            similar_exchanges: &similar,
            sales_summary: &sales_summary,
            data_sample: &data_sample,
            question,
        });
        log::debug!(
            "Prompt built with {} similar exchanges and {} stat lines",
            similar.len(),
            stats.len()
        );

        let answer = self
            .generator
            .generate(&prompt, self.settings.generation)
            .await
            .map_err(InsightError::Generation)?
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(InsightError::EmptyGeneration)?;

        self.history
            .append(HistoryEntry {
                question: question.to_string(),
                answer: answer.clone(),
                timestamp: Utc::now(),
            })
            .await
            .map_err(InsightError::Storage)?;
        self.vector_store.upsert(question, &answer).await?;

        Ok(answer)
    }

    /// Past exchanges closest to `question`, with their similarity scores.
    pub async fn similar_questions(&self, question: &str, limit: usize) -> InsightResult<Vec<SimilarExchange>> {
        self.vector_store.search_exchanges(question, limit).await
    }

    pub async fn history(&self) -> InsightResult<Vec<HistoryEntry>> {
        self.history.entries().await.map_err(InsightError::Storage)
    }

    async fn load_rows(&self) -> InsightResult<Vec<Row>> {
        let rows = self.rows.load_rows().await.map_err(InsightError::Storage)?;
        if rows.is_empty() {
            return Err(InsightError::NoData);
        }
        Ok(rows)
    }
}
