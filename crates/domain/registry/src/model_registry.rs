use systemprompt_cache::ConfigCache;
use systemprompt_models::ModelConfig;

use crate::error::RegistryError;

/// Resolves a caller-supplied model identifier to a concrete provider
/// configuration (§4.A `get_model_config`). A thin facade over
/// [`ConfigCache`] — the registry owns no state of its own beyond the cache
/// handle, matching the "the registry owns model and key records" ownership
/// rule from §3 (the cache and its durable tier are the actual owners).
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    cache: ConfigCache,
}

impl ModelRegistry {
    #[must_use]
    pub fn new(cache: ConfigCache) -> Self {
        Self { cache }
    }

    pub async fn resolve(&self, name_or_code: &str) -> Result<ModelConfig, RegistryError> {
        self.cache
            .get_model_config(name_or_code)
            .await
            .map_err(|e| match e {
                systemprompt_cache::config_cache::ConfigCacheError::NotFound(name) => {
                    RegistryError::ModelNotFound(name)
                },
                other => other.into(),
            })
    }

    #[must_use]
    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }
}
