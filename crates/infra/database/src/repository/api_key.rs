use std::sync::Arc;

use chrono::Utc;
use sqlx::{PgPool, Row};
use systemprompt_identifiers::{ApiKeyId, ModelCode};
use systemprompt_models::ApiKeyRecord;

use crate::error::RepositoryError;
use crate::pool::DbPool;

/// Durable-tier repository for a model's API-key pool (§3 "API-key record",
/// §4.B Key Router).
#[derive(Debug, Clone)]
pub struct ApiKeyRepository {
    pool: Arc<PgPool>,
    write_pool: Arc<PgPool>,
}

impl ApiKeyRepository {
    pub fn new(db: &DbPool) -> Result<Self, RepositoryError> {
        Ok(Self {
            pool: db.pool_arc()?,
            write_pool: db.write_pool_arc()?,
        })
    }

    /// Ordered by `(priority DESC, success_count DESC)`, enabled keys only.
    pub async fn list_available(
        &self,
        model_code: &ModelCode,
    ) -> Result<Vec<ApiKeyRecord>, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT id, model_code, secret, name, enabled, priority, usage_count, success_count,
                   failure_count, last_used_at, last_success_at, last_failure_at,
                   last_failure_reason, per_minute_limit, per_day_limit, expires_at
            FROM api_keys
            WHERE model_code = $1 AND enabled = true
            ORDER BY priority DESC, success_count DESC
            ",
        )
        .bind(model_code.as_str())
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(row_to_api_key).collect())
    }

    pub async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id, model_code, secret, name, enabled, priority, usage_count, success_count,
                   failure_count, last_used_at, last_success_at, last_failure_at,
                   last_failure_reason, per_minute_limit, per_day_limit, expires_at
            FROM api_keys
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|row| row_to_api_key(&row)))
    }

    pub async fn set_enabled(&self, id: &ApiKeyId, enabled: bool) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE api_keys SET enabled = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(enabled)
            .execute(self.write_pool.as_ref())
            .await?;
        Ok(())
    }

    /// Applies a usage/success/failure report, auto-disabling the key when
    /// the §3 invariant trips. Returns the updated record so the caller (the
    /// key router) can decide whether to invalidate the cache.
    pub async fn report(
        &self,
        id: &ApiKeyId,
        success: bool,
        reason: Option<&str>,
    ) -> Result<ApiKeyRecord, RepositoryError> {
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| RepositoryError::KeyNotFound(id.clone()))?;

        record.usage_count += 1;
        let now = Utc::now();
        if success {
            record.success_count += 1;
            record.last_success_at = Some(now);
        } else {
            record.failure_count += 1;
            record.last_failure_at = Some(now);
            record.last_failure_reason = reason.map(str::to_string);
        }
        record.last_used_at = Some(now);

        let should_disable = record.should_auto_disable();
        if should_disable {
            record.enabled = false;
        }

        sqlx::query(
            r"
            UPDATE api_keys SET
                usage_count = $2, success_count = $3, failure_count = $4,
                last_used_at = $5, last_success_at = $6, last_failure_at = $7,
                last_failure_reason = $8, enabled = $9
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .bind(record.usage_count as i64)
        .bind(record.success_count as i64)
        .bind(record.failure_count as i64)
        .bind(record.last_used_at)
        .bind(record.last_success_at)
        .bind(record.last_failure_at)
        .bind(&record.last_failure_reason)
        .bind(record.enabled)
        .execute(self.write_pool.as_ref())
        .await?;

        Ok(record)
    }
}

fn row_to_api_key(row: &sqlx::postgres::PgRow) -> ApiKeyRecord {
    ApiKeyRecord {
        id: ApiKeyId::new(row.get::<String, _>("id")),
        model_code: ModelCode::new(row.get::<String, _>("model_code")),
        secret: row.get("secret"),
        name: row.get("name"),
        enabled: row.get("enabled"),
        priority: row.get("priority"),
        usage_count: row.get::<i64, _>("usage_count") as u64,
        success_count: row.get::<i64, _>("success_count") as u64,
        failure_count: row.get::<i64, _>("failure_count") as u64,
        last_used_at: row.get("last_used_at"),
        last_success_at: row.get("last_success_at"),
        last_failure_at: row.get("last_failure_at"),
        last_failure_reason: row.get("last_failure_reason"),
        per_minute_limit: row.get::<Option<i32>, _>("per_minute_limit").map(|v| v as u32),
        per_day_limit: row.get::<Option<i32>, _>("per_day_limit").map(|v| v as u32),
        expires_at: row.get("expires_at"),
    }
}
