use async_trait::async_trait;
use std::time::Duration;

/// The durable-cache protocol from §6: string values, optional TTL, three
/// operations. Read-only-replica errors are observable here but MUST be
/// swallowed silently by every write-path caller (the system tolerates
/// missing writes rather than failing the request) — implementations detect
/// the condition themselves and return `Ok(())`, so no typed error variant
/// for it crosses this trait boundary.
#[async_trait]
pub trait DurableCache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()>;

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}
