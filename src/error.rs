use thiserror::Error;

/// Errors surfaced by the retrieval, analytics and query pipeline.
///
/// Startup variants (`Connectivity`, `ModelLoad`, `SchemaSetup`,
/// `InitializationFailed`) abort the process. The others are per-request and are
/// turned into a user-facing message at the request boundary.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("vector index backend is unreachable: {0}")]
    Connectivity(#[source] anyhow::Error),

    #[error("failed to load the embedding model: {0}")]
    ModelLoad(#[source] anyhow::Error),

    #[error("failed to set up collection '{collection}': {source}")]
    SchemaSetup {
        collection: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("vector store initialization previously failed: {0}")]
    InitializationFailed(String),

    #[error("vector store is not initialized")]
    NotInitialized,

    #[error("no data available")]
    NoData,

    #[error("uploaded table contains no rows")]
    EmptyUpload,

    #[error("the generation service returned no content")]
    EmptyGeneration,

    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("vector index operation failed: {0}")]
    Index(#[source] anyhow::Error),

    #[error("storage operation failed: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("generation request failed: {0}")]
    Generation(#[source] anyhow::Error),
}

impl InsightError {
    /// True for errors that must stop the process instead of failing one request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            InsightError::Connectivity(_)
                | InsightError::ModelLoad(_)
                | InsightError::SchemaSetup { .. }
                | InsightError::InitializationFailed(_)
        )
    }

    /// Message shown to the end user of the request surface.
    pub fn user_message(&self) -> String {
        match self {
            InsightError::NoData => "No data available. Upload a table first.".to_string(),
            InsightError::EmptyUpload => "The uploaded table is empty or invalid.".to_string(),
            InsightError::NotInitialized => {
                "The search service is still initializing. Please try again shortly.".to_string()
            }
            InsightError::EmptyGeneration => {
                "The answer could not be generated. Please try again.".to_string()
            }
            other => format!("Request failed: {}", other),
        }
    }
}

pub type InsightResult<T> = Result<T, InsightError>;
