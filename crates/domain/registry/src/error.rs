use systemprompt_identifiers::ModelCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("no enabled keys available for model {0}")]
    NoKeys(ModelCode),

    #[error(transparent)]
    Cache(#[from] systemprompt_cache::config_cache::ConfigCacheError),

    #[error(transparent)]
    Database(#[from] systemprompt_database::RepositoryError),
}
