use systemprompt_identifiers::ModelCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no model configuration found for '{0}'")]
    ModelNotFound(String),

    #[error(transparent)]
    Registry(#[from] systemprompt_registry::RegistryError),

    #[error(transparent)]
    Database(#[from] systemprompt_database::RepositoryError),

    #[error("repair/create batch failed for {model_code}, all rows soft-deleted")]
    BatchFailed { model_code: ModelCode },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
