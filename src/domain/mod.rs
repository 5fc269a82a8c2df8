pub mod exchange;
pub mod generation;
pub mod rows;
pub mod vector_repository;
