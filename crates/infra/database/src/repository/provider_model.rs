use std::sync::Arc;

use sqlx::{PgPool, Row};
use systemprompt_identifiers::ModelCode;
use systemprompt_models::ProviderModel;

use crate::error::RepositoryError;
use crate::pool::DbPool;

/// Durable-tier repository for per-provider concrete model names (§3
/// "Provider model").
#[derive(Debug, Clone)]
pub struct ProviderModelRepository {
    pool: Arc<PgPool>,
    write_pool: Arc<PgPool>,
}

impl ProviderModelRepository {
    pub fn new(db: &DbPool) -> Result<Self, RepositoryError> {
        Ok(Self {
            pool: db.pool_arc()?,
            write_pool: db.write_pool_arc()?,
        })
    }

    pub async fn list_for_model_code(
        &self,
        model_code: &ModelCode,
    ) -> Result<Vec<ProviderModel>, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT model_code, name, display_name, available, deprecated, is_latest, supports_tools
            FROM provider_models
            WHERE model_code = $1
            ",
        )
        .bind(model_code.as_str())
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(row_to_provider_model).collect())
    }

    /// Public model-listing query: only rows where `available && !deprecated`
    /// and the parent model config is enabled.
    pub async fn list_publicly_listed(&self) -> Result<Vec<ProviderModel>, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT pm.model_code, pm.name, pm.display_name, pm.available, pm.deprecated,
                   pm.is_latest, pm.supports_tools
            FROM provider_models pm
            JOIN model_configs mc ON mc.model_code = pm.model_code
            WHERE pm.available = true AND pm.deprecated = false AND mc.enabled = true
            ",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(row_to_provider_model).collect())
    }

    pub async fn upsert(&self, model: &ProviderModel) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO provider_models (model_code, name, display_name, available, deprecated, is_latest, supports_tools)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (model_code, name) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                available = EXCLUDED.available,
                deprecated = EXCLUDED.deprecated,
                is_latest = EXCLUDED.is_latest,
                supports_tools = EXCLUDED.supports_tools
            ",
        )
        .bind(model.model_code.as_str())
        .bind(&model.name)
        .bind(&model.display_name)
        .bind(model.available)
        .bind(model.deprecated)
        .bind(model.is_latest)
        .bind(model.supports_tools)
        .execute(self.write_pool.as_ref())
        .await?;
        Ok(())
    }

    pub async fn soft_delete_all_for_model_code(
        &self,
        model_code: &ModelCode,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE provider_models SET available = false WHERE model_code = $1")
            .bind(model_code.as_str())
            .execute(self.write_pool.as_ref())
            .await?;
        Ok(())
    }

    pub async fn hard_delete(
        &self,
        model_code: &ModelCode,
        name: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM provider_models WHERE model_code = $1 AND name = $2")
            .bind(model_code.as_str())
            .bind(name)
            .execute(self.write_pool.as_ref())
            .await?;
        Ok(())
    }
}

fn row_to_provider_model(row: &sqlx::postgres::PgRow) -> ProviderModel {
    ProviderModel {
        model_code: ModelCode::new(row.get::<String, _>("model_code")),
        name: row.get("name"),
        display_name: row.get("display_name"),
        available: row.get("available"),
        deprecated: row.get("deprecated"),
        is_latest: row.get("is_latest"),
        supports_tools: row.get("supports_tools"),
    }
}
