use std::sync::Arc;

use sqlx::{PgPool, Row};
use systemprompt_identifiers::{ModelCode, ProviderKind};
use systemprompt_models::ModelConfig;

use crate::error::RepositoryError;
use crate::pool::DbPool;

/// Durable-tier repository for model configuration records (§3, §4.A).
#[derive(Debug, Clone)]
pub struct ModelConfigRepository {
    pool: Arc<PgPool>,
    write_pool: Arc<PgPool>,
}

impl ModelConfigRepository {
    pub fn new(db: &DbPool) -> Result<Self, RepositoryError> {
        Ok(Self {
            pool: db.pool_arc()?,
            write_pool: db.write_pool_arc()?,
        })
    }

    /// Returns the highest-priority enabled record for `model_code`; on a
    /// priority tie the newest (`created_at` descending) wins.
    pub async fn get_enabled(
        &self,
        model_code: &ModelCode,
    ) -> Result<Option<ModelConfig>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT model_code, provider_kind, base_url, chat_endpoint, model_list_endpoint,
                   upload_base_url, enabled, priority, max_tokens_hint,
                   input_cost_per_1k, output_cost_per_1k, created_at
            FROM model_configs
            WHERE model_code = $1 AND enabled = true
            ORDER BY priority DESC, created_at DESC
            LIMIT 1
            ",
        )
        .bind(model_code.as_str())
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|row| row_to_model_config(&row)))
    }

    /// Resolves a `model_code` by joining through `provider_models.name`,
    /// falling back to treating `name_or_code` as a bare `model_code`. This
    /// is `get_model_config` from §4.A.
    pub async fn resolve_by_name_or_code(
        &self,
        name_or_code: &str,
    ) -> Result<Option<ModelConfig>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT mc.model_code, mc.provider_kind, mc.base_url, mc.chat_endpoint,
                   mc.model_list_endpoint, mc.upload_base_url, mc.enabled, mc.priority,
                   mc.max_tokens_hint, mc.input_cost_per_1k, mc.output_cost_per_1k, mc.created_at
            FROM provider_models pm
            JOIN model_configs mc ON mc.model_code = pm.model_code
            WHERE pm.name = $1 AND mc.enabled = true
            ORDER BY mc.priority DESC, mc.created_at DESC
            LIMIT 1
            ",
        )
        .bind(name_or_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        if let Some(row) = row {
            return Ok(Some(row_to_model_config(&row)));
        }

        self.get_enabled(&ModelCode::new(name_or_code)).await
    }

    pub async fn list_enabled(&self) -> Result<Vec<ModelConfig>, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT model_code, provider_kind, base_url, chat_endpoint, model_list_endpoint,
                   upload_base_url, enabled, priority, max_tokens_hint,
                   input_cost_per_1k, output_cost_per_1k, created_at
            FROM model_configs
            WHERE enabled = true
            ",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(row_to_model_config).collect())
    }

    pub async fn set_enabled(
        &self,
        model_code: &ModelCode,
        enabled: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE model_configs SET enabled = $2 WHERE model_code = $1")
            .bind(model_code.as_str())
            .bind(enabled)
            .execute(self.write_pool.as_ref())
            .await?;
        Ok(())
    }
}

fn row_to_model_config(row: &sqlx::postgres::PgRow) -> ModelConfig {
    let provider_kind: String = row.get("provider_kind");
    ModelConfig {
        model_code: ModelCode::new(row.get::<String, _>("model_code")),
        provider_kind: provider_kind.parse::<ProviderKind>().unwrap_or(ProviderKind::OpenAiCompatible),
        base_url: row.get("base_url"),
        chat_endpoint: row.get("chat_endpoint"),
        model_list_endpoint: row.get("model_list_endpoint"),
        upload_base_url: row.get("upload_base_url"),
        enabled: row.get("enabled"),
        priority: row.get("priority"),
        max_tokens_hint: row.get::<Option<i32>, _>("max_tokens_hint").map(|v| v as u32),
        input_cost_per_1k: row.get("input_cost_per_1k"),
        output_cost_per_1k: row.get("output_cost_per_1k"),
        created_at: row.get("created_at"),
    }
}
