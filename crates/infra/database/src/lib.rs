//! Durable-tier Postgres repositories: model configs, provider models and
//! API-key pools.

pub mod error;
pub mod pool;
pub mod repository;

pub use error::RepositoryError;
pub use pool::DbPool;
pub use repository::{ApiKeyRepository, ModelConfigRepository, ProviderModelRepository};
