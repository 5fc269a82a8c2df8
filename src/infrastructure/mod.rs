pub mod document_store;
pub mod embedding;
pub mod gemini;
pub mod memory_index;
pub mod vector_db;

// Re-export key types for easier access from the application layer
pub use document_store::{JsonlHistoryStore, MemoryDocumentStore};
pub use embedding::{EmbeddingGenerator, HashingEmbedder, TextEmbedder};
pub use gemini::GeminiClient;
pub use memory_index::InMemoryVectorIndex;
pub use vector_db::VectorDb;

// Re-export EmbeddingModel directly from the dependency
pub use fastembed::EmbeddingModel;
