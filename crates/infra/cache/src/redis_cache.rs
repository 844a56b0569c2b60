use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use systemprompt_traits::DurableCache;
use tracing::warn;

/// The durable key-value cache from §6, backed by Redis. `set`/`delete` on a
/// read-only replica are swallowed silently — the system tolerates a missing
/// write over failing the caller's request.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn is_read_only_replica_error(err: &redis::RedisError) -> bool {
        err.to_string().to_uppercase().contains("READONLY")
    }
}

#[async_trait]
impl DurableCache for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let result: Result<(), redis::RedisError> = match ttl {
            Some(ttl) => conn.set_ex(key, value, ttl.as_secs().max(1)).await,
            None => conn.set(key, value).await,
        };

        if let Err(err) = result {
            if Self::is_read_only_replica_error(&err) {
                warn!(key, "swallowed read-only-replica error on cache write");
                return Ok(());
            }
            return Err(err.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let result: Result<(), redis::RedisError> = conn.del(key).await;
        if let Err(err) = result {
            if Self::is_read_only_replica_error(&err) {
                warn!(key, "swallowed read-only-replica error on cache delete");
                return Ok(());
            }
            return Err(err.into());
        }
        Ok(())
    }
}
