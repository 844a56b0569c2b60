use thiserror::Error;
use systemprompt_identifiers::{ApiKeyId, ModelCode};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("model config not found for {0}")]
    ModelNotFound(ModelCode),

    #[error("api key not found: {0}")]
    KeyNotFound(ApiKeyId),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database pool initialization failed: {0}")]
    PoolInitialization(String),
}
