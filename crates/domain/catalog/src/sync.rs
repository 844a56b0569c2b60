use std::collections::HashSet;

use serde_json::Value;
use systemprompt_ai::bridge::normalize_model_list;
use systemprompt_ai::providers::anthropic::AnthropicClient;
use systemprompt_ai::providers::openai_compatible::OpenAiCompatibleClient;
use systemprompt_ai::ModelLister;
use systemprompt_cache::ConfigCache;
use systemprompt_identifiers::{ModelCode, ProviderKind};
use systemprompt_models::{ModelConfig, ProviderModel};
use systemprompt_registry::ModelRegistry;

use crate::error::{CatalogError, Result};

/// Reconciles one provider's stored model catalog against its live
/// model-list response (§4.H). Owns no state beyond its collaborators — the
/// authoritative rows live in [`ConfigCache::provider_models`].
#[derive(Clone)]
pub struct CatalogSynchronizer {
    registry: ModelRegistry,
}

/// Outcome of syncing one provider, for the operator endpoint's response body.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub model_code: ModelCode,
    pub outcome: SyncOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Repairs and/or creations applied, retired names hard-deleted.
    Reconciled { created: usize, repaired: usize, deleted: usize },
    /// The provider call failed, or the response carried no usable array;
    /// every stored row for this model was soft-deleted.
    SoftDeletedAllOnFailure { reason: String },
}

impl CatalogSynchronizer {
    #[must_use]
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn cache(&self) -> &ConfigCache {
        self.registry.cache()
    }

    /// Runs the sync algorithm (§4.H) for a single `model_code`.
    pub async fn sync_one(&self, model_code: &ModelCode) -> Result<SyncReport> {
        let config = self
            .registry
            .resolve(model_code.as_str())
            .await
            .map_err(|_| CatalogError::ModelNotFound(model_code.to_string()))?;

        let stored = self.cache().provider_models().list_for_model_code(model_code).await?;

        let fetched = self.fetch_remote_list(&config).await;
        let Ok(raw) = fetched else {
            self.soft_delete_all(model_code).await?;
            return Ok(self.report_soft_delete(model_code, fetched.unwrap_err()));
        };

        let normalized = normalize_model_list(&raw, config.provider_kind.as_str());
        let Some(tool_capable) = extract_tool_capable_entries(&raw, &normalized) else {
            self.soft_delete_all(model_code).await?;
            return Ok(self.report_soft_delete(model_code, "response carried no usable model array".to_string()));
        };

        let plan = diff_against_stored(&stored, &tool_capable);

        if let Err(err) = self.apply_repairs_and_creations(model_code, &plan).await {
            self.soft_delete_all(model_code).await?;
            return Err(err);
        }

        for name in &plan.to_hard_delete {
            self.cache().provider_models().hard_delete(model_code, name).await?;
        }
        self.cache().invalidate(model_code).await;

        Ok(SyncReport {
            model_code: model_code.clone(),
            outcome: SyncOutcome::Reconciled {
                created: plan.to_create.len(),
                repaired: plan.to_repair.len(),
                deleted: plan.to_hard_delete.len(),
            },
        })
    }

    /// Syncs every enabled model (the `/v1/models/sync/all` operator route).
    pub async fn sync_all(&self, model_codes: &[ModelCode]) -> Vec<Result<SyncReport>> {
        let mut reports = Vec::with_capacity(model_codes.len());
        for model_code in model_codes {
            reports.push(self.sync_one(model_code).await);
        }
        reports
    }

    async fn fetch_remote_list(&self, config: &ModelConfig) -> std::result::Result<Value, String> {
        let Some(endpoint) = &config.model_list_endpoint else {
            return Err("model config carries no model_list_endpoint".to_string());
        };
        let key = self
            .registry
            .cache()
            .get_available_keys(&config.model_code)
            .await
            .map_err(|err| err.to_string())?
            .into_iter()
            .next()
            .ok_or_else(|| "no enabled key available for this model".to_string())?;

        let lister = build_lister(config, key.trimmed_secret());
        lister.list_models(endpoint).await.map_err(|err| err.to_string())
    }

    async fn soft_delete_all(&self, model_code: &ModelCode) -> Result<()> {
        self.cache().provider_models().soft_delete_all_for_model_code(model_code).await?;
        self.cache().invalidate(model_code).await;
        Ok(())
    }

    async fn apply_repairs_and_creations(&self, model_code: &ModelCode, plan: &DiffPlan) -> Result<()> {
        for entry in plan.to_repair.iter().chain(plan.to_create.iter()) {
            self.cache()
                .provider_models()
                .upsert(&ProviderModel {
                    model_code: model_code.clone(),
                    name: entry.clone(),
                    display_name: entry.clone(),
                    available: true,
                    deprecated: false,
                    is_latest: false,
                    supports_tools: true,
                })
                .await
                .map_err(|_| CatalogError::BatchFailed { model_code: model_code.clone() })?;
        }
        Ok(())
    }

    fn report_soft_delete(&self, model_code: &ModelCode, reason: String) -> SyncReport {
        tracing::warn!(model_code = %model_code, reason = %reason, "catalog sync soft-deleted all rows");
        SyncReport {
            model_code: model_code.clone(),
            outcome: SyncOutcome::SoftDeletedAllOnFailure { reason },
        }
    }
}

fn build_lister(config: &ModelConfig, api_key: &str) -> Box<dyn ModelLister> {
    match config.provider_kind {
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(config.base_url.clone(), api_key.to_string())),
        ProviderKind::OpenAiCompatible => {
            Box::new(OpenAiCompatibleClient::new(&config.base_url, &config.chat_endpoint, api_key.to_string()))
        },
    }
}

/// Filters the normalized list down to tool-capable entries, returning their
/// bare names. `None` means the raw response carried no array at all (the
/// normalizer always produces `data: []` even from garbage input, so we check
/// the original shape rather than the normalized one to distinguish "empty
/// list" from "not a list").
fn extract_tool_capable_entries(raw: &Value, normalized: &Value) -> Option<Vec<String>> {
    let has_usable_array = raw.get("data").and_then(Value::as_array).is_some()
        || raw.get("models").and_then(Value::as_array).is_some()
        || raw.as_array().is_some()
        || matches!(raw, Value::Object(map) if map.values().any(|v| v.is_array()));
    if !has_usable_array {
        return None;
    }

    let data = normalized.get("data").and_then(Value::as_array)?;
    Some(
        data.iter()
            .filter(|entry| advertises_tool_support(entry))
            .filter_map(|entry| entry.get("id").and_then(Value::as_str).map(str::to_string))
            .collect(),
    )
}

/// A provider entry advertises tool support either explicitly, or by omission
/// (most list-models responses don't carry a tools flag at all; absence is
/// treated as support since the canonical request path always offers tools
/// and a non-tool-capable model simply ignores them).
fn advertises_tool_support(entry: &Value) -> bool {
    entry
        .get("supports_tools")
        .or_else(|| entry.get("tool_use"))
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

struct DiffPlan {
    to_repair: Vec<String>,
    to_create: Vec<String>,
    to_hard_delete: Vec<String>,
}

fn diff_against_stored(stored: &[ProviderModel], remote_names: &[String]) -> DiffPlan {
    let remote_set: HashSet<&str> = remote_names.iter().map(String::as_str).collect();
    let stored_by_name: std::collections::HashMap<&str, &ProviderModel> =
        stored.iter().map(|model| (model.name.as_str(), model)).collect();

    let mut to_repair = Vec::new();
    let mut to_create = Vec::new();
    for name in remote_names {
        match stored_by_name.get(name.as_str()) {
            Some(model) if model.available && !model.deprecated => {},
            Some(_) => to_repair.push(name.clone()),
            None => to_create.push(name.clone()),
        }
    }

    let to_hard_delete = stored
        .iter()
        .map(|model| model.name.clone())
        .filter(|name| !remote_set.contains(name.as_str()))
        .collect();

    DiffPlan { to_repair, to_create, to_hard_delete }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, available: bool, deprecated: bool) -> ProviderModel {
        ProviderModel {
            model_code: ModelCode::new("DeepSeek"),
            name: name.to_string(),
            display_name: name.to_string(),
            available,
            deprecated,
            is_latest: false,
            supports_tools: true,
        }
    }

    #[test]
    fn diff_classifies_repair_create_and_delete() {
        let stored = vec![model("a", true, false), model("b", false, false), model("c", true, false)];
        let remote = vec!["a".to_string(), "b".to_string(), "d".to_string()];
        let plan = diff_against_stored(&stored, &remote);
        assert_eq!(plan.to_repair, vec!["b".to_string()]);
        assert_eq!(plan.to_create, vec!["d".to_string()]);
        assert_eq!(plan.to_hard_delete, vec!["c".to_string()]);
    }

    #[test]
    fn extract_returns_none_for_unusable_response() {
        let raw = serde_json::json!({"error": "unavailable"});
        let normalized = normalize_model_list(&raw, "owner");
        assert!(extract_tool_capable_entries(&raw, &normalized).is_none());
    }

    #[test]
    fn extract_filters_out_explicit_non_tool_models() {
        let raw = serde_json::json!({"data": [{"id": "m1", "supports_tools": true}, {"id": "m2", "supports_tools": false}]});
        let normalized = normalize_model_list(&raw, "owner");
        let names = extract_tool_capable_entries(&raw, &normalized).expect("usable array");
        assert_eq!(names, vec!["m1".to_string()]);
    }
}
