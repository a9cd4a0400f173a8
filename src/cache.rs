//! Cache invalidation signalling. Tags go out over a Postgres NOTIFY
//! channel; whoever caches catalog reads listens there and evicts. The
//! signal is idempotent, so repeated notifications for one tag are harmless.

use anyhow::Result;
use sqlx::PgPool;

#[async_trait::async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate_tag(&self, tag: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct PgCacheInvalidator {
    pool: PgPool,
    channel: String,
}

impl PgCacheInvalidator {
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }
}

#[async_trait::async_trait]
impl CacheInvalidator for PgCacheInvalidator {
    async fn invalidate_tag(&self, tag: &str) -> Result<()> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel)
            .bind(tag)
            .persistent(false)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
