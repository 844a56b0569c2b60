use std::sync::Arc;
use std::time::Duration;

use systemprompt_database::{ApiKeyRepository, ModelConfigRepository, ProviderModelRepository};
use systemprompt_identifiers::ModelCode;
use systemprompt_models::{ApiKeyRecord, ModelConfig};
use systemprompt_traits::DurableCache;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const FAST_TIER_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error)]
pub enum ConfigCacheError {
    #[error("no enabled model configuration found for '{0}'")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] systemprompt_database::RepositoryError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn config_key(model_code: &ModelCode) -> String {
    format!("model:config:{model_code}")
}

fn keys_key(model_code: &ModelCode) -> String {
    format!("model:apikeys:{model_code}")
}

/// Two-tier, read-through, write-around configuration cache (§4.A). The fast
/// tier (Redis, one-hour TTL) caches a model's config and its ordered key
/// list verbatim; the durable tier (Postgres) is authoritative and is always
/// consulted on a fast-tier miss.
#[derive(Clone)]
pub struct ConfigCache {
    fast: Arc<dyn DurableCache>,
    model_configs: ModelConfigRepository,
    provider_models: ProviderModelRepository,
    api_keys: ApiKeyRepository,
    preload_guard: Arc<OnceCell<()>>,
}

impl std::fmt::Debug for ConfigCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigCache").finish_non_exhaustive()
    }
}

impl ConfigCache {
    #[must_use]
    pub fn new(
        fast: Arc<dyn DurableCache>,
        model_configs: ModelConfigRepository,
        provider_models: ProviderModelRepository,
        api_keys: ApiKeyRepository,
    ) -> Self {
        Self {
            fast,
            model_configs,
            provider_models,
            api_keys,
            preload_guard: Arc::new(OnceCell::new()),
        }
    }

    #[must_use]
    pub fn provider_models(&self) -> &ProviderModelRepository {
        &self.provider_models
    }

    #[must_use]
    pub fn api_key_repository(&self) -> &ApiKeyRepository {
        &self.api_keys
    }

    /// Lists every enabled model configuration, straight from the durable
    /// tier (the catalog synchronizer's "sync all" entry point; not worth
    /// caching since it only runs on an operator-triggered route).
    pub async fn list_enabled_models(&self) -> Result<Vec<ModelConfig>, ConfigCacheError> {
        Ok(self.model_configs.list_enabled().await?)
    }

    /// Resolves `name_or_code` to a model configuration. Tries the
    /// fast-tier cache by `model_code` first only once the code is known —
    /// since the name→code join lives in the durable tier, a cache hit
    /// requires the caller to already know the code (typical of a repeat
    /// request for the same model). A miss falls through to the durable
    /// tier, which performs the join-or-bare-code resolution itself.
    pub async fn get_model_config(&self, name_or_code: &str) -> Result<ModelConfig, ConfigCacheError> {
        let candidate_code = ModelCode::new(name_or_code);
        if let Some(raw) = self.fast.get(&config_key(&candidate_code)).await.unwrap_or(None) {
            if let Ok(config) = serde_json::from_str::<ModelConfig>(&raw) {
                debug!(model_code = %candidate_code, "config cache fast-tier hit");
                return Ok(config);
            }
        }

        let config = self
            .model_configs
            .resolve_by_name_or_code(name_or_code)
            .await?
            .ok_or_else(|| ConfigCacheError::NotFound(name_or_code.to_string()))?;

        if let Ok(raw) = serde_json::to_string(&config) {
            if let Err(err) = self.fast.set(&config_key(&config.model_code), &raw, Some(FAST_TIER_TTL)).await {
                warn!(model_code = %config.model_code, error = %err, "fast-tier cache write failed");
            }
        }

        Ok(config)
    }

    /// Ordered `(priority DESC, success_count DESC)` key list for a model,
    /// cached verbatim in the fast tier. Returns empty on no match rather
    /// than erroring — an empty pool is a router-level concern (`NoKeys`).
    pub async fn get_available_keys(
        &self,
        model_code: &ModelCode,
    ) -> Result<Vec<ApiKeyRecord>, ConfigCacheError> {
        if let Some(raw) = self.fast.get(&keys_key(model_code)).await.unwrap_or(None) {
            if let Ok(keys) = serde_json::from_str::<Vec<ApiKeyRecord>>(&raw) {
                return Ok(keys);
            }
        }

        let keys = self.api_keys.list_available(model_code).await?;

        if let Ok(raw) = serde_json::to_string(&keys) {
            if let Err(err) = self.fast.set(&keys_key(model_code), &raw, Some(FAST_TIER_TTL)).await {
                warn!(model_code = %model_code, error = %err, "fast-tier cache write failed");
            }
        }

        Ok(keys)
    }

    /// Deletes all fast-tier keys for `model_code`. Called after any write
    /// affecting a model or its keys; a read-only-replica error from the
    /// fast tier is already swallowed inside the `DurableCache` impl, so
    /// reads simply fall through to the durable tier on the next call.
    pub async fn invalidate(&self, model_code: &ModelCode) {
        let _ = self.fast.delete(&config_key(model_code)).await;
        let _ = self.fast.delete(&keys_key(model_code)).await;
    }

    /// Warms both cache layers for every enabled model. Guaranteed to run at
    /// most once per process regardless of how many callers invoke it
    /// concurrently at startup.
    pub async fn preload(&self) -> Result<(), ConfigCacheError> {
        self.preload_guard
            .get_or_try_init(|| async {
                let configs = self.model_configs.list_enabled().await?;
                for config in &configs {
                    if let Ok(raw) = serde_json::to_string(config) {
                        if let Err(err) = self.fast.set(&config_key(&config.model_code), &raw, Some(FAST_TIER_TTL)).await {
                            warn!(model_code = %config.model_code, error = %err, "fast-tier cache write failed during preload");
                        }
                    }
                    let keys = self.api_keys.list_available(&config.model_code).await?;
                    if let Ok(raw) = serde_json::to_string(&keys) {
                        if let Err(err) = self.fast.set(&keys_key(&config.model_code), &raw, Some(FAST_TIER_TTL)).await {
                            warn!(model_code = %config.model_code, error = %err, "fast-tier cache write failed during preload");
                        }
                    }
                }
                Ok::<(), ConfigCacheError>(())
            })
            .await
            .map(|_| ())
    }
}
