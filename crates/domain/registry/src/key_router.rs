use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use systemprompt_cache::ConfigCache;
use systemprompt_identifiers::{ApiKeyId, ModelCode};
use systemprompt_models::ApiKeyRecord;

use crate::error::RegistryError;

/// Round-robin index over a model's ordered key list, with per-request
/// health writeback (§4.B). The rotation index is per-process and reset on
/// restart, per the design note: a distributed counter would be needed only
/// if strict uniform distribution across pods mattered, and the cache TTL
/// bounds how stale a racy local index can get in the meantime.
#[derive(Debug, Clone)]
pub struct KeyRouter {
    cache: ConfigCache,
    rotation: Arc<Mutex<HashMap<ModelCode, AtomicUsize>>>,
}

impl KeyRouter {
    #[must_use]
    pub fn new(cache: ConfigCache) -> Self {
        Self {
            cache,
            rotation: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the next key for `model_code`, advancing the rotation index
    /// modulo the list length. Fails with `NoKeys` when the pool is empty.
    pub async fn get_next(&self, model_code: &ModelCode) -> Result<ApiKeyRecord, RegistryError> {
        let keys = self.cache.get_available_keys(model_code).await?;
        if keys.is_empty() {
            return Err(RegistryError::NoKeys(model_code.clone()));
        }

        let index = self.advance_index(model_code, keys.len());
        Ok(keys[index].clone())
    }

    fn advance_index(&self, model_code: &ModelCode, len: usize) -> usize {
        advance_rotation(&self.rotation, model_code, len)
    }

    /// Records a report for `key_id`: increments usage, stamps
    /// success/failure, and auto-disables per the §3 invariant. Updates only
    /// the durable tier and invalidates the fast tier through
    /// [`ConfigCache::invalidate`] — the router never mutates the cache
    /// directly.
    pub async fn report(
        &self,
        model_code: &ModelCode,
        key_id: &ApiKeyId,
        success: bool,
        reason: Option<&str>,
    ) -> Result<(), RegistryError> {
        self.cache
            .api_key_repository()
            .report(key_id, success, reason)
            .await?;
        self.cache.invalidate(model_code).await;
        Ok(())
    }
}

fn advance_rotation(
    rotation: &Mutex<HashMap<ModelCode, AtomicUsize>>,
    model_code: &ModelCode,
    len: usize,
) -> usize {
    let mut rotation = rotation.lock().expect("rotation mutex poisoned");
    let counter = rotation
        .entry(model_code.clone())
        .or_insert_with(|| AtomicUsize::new(0));
    let previous = counter.fetch_add(1, Ordering::Relaxed);
    previous % len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_index_wraps_modulo_len() {
        let rotation = Mutex::new(HashMap::new());
        let code = ModelCode::new("DeepSeek");
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(advance_rotation(&rotation, &code, 3));
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn distinct_models_rotate_independently() {
        let rotation = Mutex::new(HashMap::new());
        let a = ModelCode::new("DeepSeek");
        let b = ModelCode::new("Claude");
        assert_eq!(advance_rotation(&rotation, &a, 2), 0);
        assert_eq!(advance_rotation(&rotation, &b, 5), 0);
        assert_eq!(advance_rotation(&rotation, &a, 2), 1);
    }
}
