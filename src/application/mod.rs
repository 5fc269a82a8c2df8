pub mod analytics;
pub mod prompt;
pub mod query_service;
pub mod vector_store_manager;
