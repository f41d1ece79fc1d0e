/// Persistence contract and its backends.
pub mod event_store;
/// Database model definitions.
pub mod models;
/// Fixture loading for the in-memory backend.
pub mod seed;
/// Storage abstraction layer for database operations.
pub mod storage;
