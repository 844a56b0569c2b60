use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use systemprompt_identifiers::{ApiKeyId, ModelCode, ProviderKind};

/// A model configuration record (§3 "Model configuration"). Keyed by
/// `model_code`; the registry returns the highest-priority enabled record for a
/// code, the newest on a priority tie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_code: ModelCode,
    pub provider_kind: ProviderKind,
    pub base_url: String,
    pub chat_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_list_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_base_url: Option<String>,
    pub enabled: bool,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens_hint: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_cost_per_1k: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_cost_per_1k: Option<f32>,
    pub created_at: DateTime<Utc>,
}

/// A concrete provider-advertised model name, linked to a `model_code` (§3
/// "Provider model"). Public listing only surfaces rows with
/// `available && !deprecated` whose parent `ModelConfig` is also enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderModel {
    pub model_code: ModelCode,
    pub name: String,
    pub display_name: String,
    pub available: bool,
    pub deprecated: bool,
    pub is_latest: bool,
    pub supports_tools: bool,
}

impl ProviderModel {
    #[must_use]
    pub fn publicly_listed(&self, parent_enabled: bool) -> bool {
        self.available && !self.deprecated && parent_enabled
    }
}

/// An API-key record in a model's key pool (§3 "API-key record"). The auto-disable
/// invariant lives with this type so the router and the catalog synchronizer agree
/// on the same rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: ApiKeyId,
    pub model_code: ModelCode,
    pub secret: String,
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub usage_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_failure_reason: Option<String>,
    pub per_minute_limit: Option<u32>,
    pub per_day_limit: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    /// Trims surrounding whitespace from the secret on read, per §3 invariant.
    #[must_use]
    pub fn trimmed_secret(&self) -> &str {
        self.secret.trim()
    }

    /// Auto-disable rule: a key is disabled once `failure_count >= 10` or
    /// `(failure_count > 5 && failure_ratio > 0.5)`.
    #[must_use]
    pub fn should_auto_disable(&self) -> bool {
        if self.failure_count >= 10 {
            return true;
        }
        if self.failure_count > 5 {
            let ratio = self.failure_count as f64 / self.usage_count.max(1) as f64;
            return ratio > 0.5;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(usage: u64, failures: u64) -> ApiKeyRecord {
        ApiKeyRecord {
            id: ApiKeyId::new("k1"),
            model_code: ModelCode::new("DeepSeek"),
            secret: "  sk-abc  ".to_string(),
            name: "primary".to_string(),
            enabled: true,
            priority: 0,
            usage_count: usage,
            success_count: usage.saturating_sub(failures),
            failure_count: failures,
            last_used_at: None,
            last_success_at: None,
            last_failure_at: None,
            last_failure_reason: None,
            per_minute_limit: None,
            per_day_limit: None,
            expires_at: None,
        }
    }

    #[test]
    fn trims_secret_whitespace() {
        assert_eq!(key(1, 0).trimmed_secret(), "sk-abc");
    }

    #[test]
    fn disables_at_ten_failures_regardless_of_ratio() {
        assert!(key(1000, 10).should_auto_disable());
    }

    #[test]
    fn disables_on_majority_failure_ratio_above_five() {
        assert!(key(10, 6).should_auto_disable());
        assert!(!key(100, 6).should_auto_disable());
        assert!(!key(10, 5).should_auto_disable());
    }
}
