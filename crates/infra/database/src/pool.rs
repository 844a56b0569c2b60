use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::RepositoryError;

/// Owns the read pool and, when writes are routed to a primary, a distinct
/// write pool. Most deployments point both at the same DSN; the split exists
/// so a read-replica topology is a config change, not a code change.
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: Arc<PgPool>,
    write_pool: Arc<PgPool>,
}

impl DbPool {
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(RepositoryError::Database)?;
        let pool = Arc::new(pool);
        Ok(Self {
            pool: Arc::clone(&pool),
            write_pool: pool,
        })
    }

    #[must_use]
    pub fn from_pools(pool: PgPool, write_pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            write_pool: Arc::new(write_pool),
        }
    }

    pub fn pool_arc(&self) -> Result<Arc<PgPool>, RepositoryError> {
        Ok(Arc::clone(&self.pool))
    }

    pub fn write_pool_arc(&self) -> Result<Arc<PgPool>, RepositoryError> {
        Ok(Arc::clone(&self.write_pool))
    }
}
