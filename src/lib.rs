pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod initialization;
pub mod server;

/// Re-export necessary items for main.rs and tests
pub use application::analytics::{AnalyticsEngine, SalesAggregate};
pub use application::query_service::{QueryService, QuerySettings};
pub use application::vector_store_manager::{LifecycleState, VectorStoreManager, VectorStoreSettings};
pub use config::{load_config, InsightsConfig};
pub use domain::generation::{GenerationParams, GenerationService};
pub use domain::rows::{HistoryEntry, HistoryStore, Row, RowStore};
pub use domain::vector_repository::VectorRepository;
pub use error::{InsightError, InsightResult};
pub use infrastructure::vector_db::{qdrant_client, VectorDb};
pub use initialization::{initialize_services, initialize_with_generator, AppServices};
