//! Postgres-backed work queue between the import and the consumer.
//!
//! The publisher inserts one row per accepted record. Consumers claim rows
//! with `FOR UPDATE SKIP LOCKED`, so several processes can drain the same
//! queue without double-claiming. Both terminal outcomes keep the row for
//! inspection; nothing ever requeues.

use anyhow::Result;
use chrono::Utc;
use sqlx::{PgPool, QueryBuilder};

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub id: i64,
    pub payload: String,
}

/// Terminal state for one claimed message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Done,
    Dropped { error: String },
}

#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    /// Batch-inserts one page's accepted payloads.
    async fn enqueue(&self, payloads: &[String]) -> Result<()>;
    /// Claims the oldest queued message, marking it running under `worker`.
    async fn claim_next(&self, worker: &str) -> Result<Option<QueuedMessage>>;
    async fn finish(&self, id: i64, outcome: MessageOutcome) -> Result<()>;
}

#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, payloads: &[String]) -> Result<()> {
        if payloads.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new("INSERT INTO import_queue (payload, status, enqueued_at) ");
        qb.push_values(payloads, |mut b, payload| {
            b.push_bind(payload).push_bind("queued").push_bind(Utc::now());
        });
        qb.build().persistent(false).execute(&self.pool).await?;
        Ok(())
    }

    async fn claim_next(&self, worker: &str) -> Result<Option<QueuedMessage>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, payload FROM import_queue
             WHERE status = 'queued'
             ORDER BY id
             FOR UPDATE SKIP LOCKED
             LIMIT 1",
        )
        .persistent(false)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, payload)) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE import_queue SET status = 'running', locked_at = $2, locked_by = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(Utc::now())
        .bind(worker)
        .persistent(false)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(QueuedMessage { id, payload }))
    }

    async fn finish(&self, id: i64, outcome: MessageOutcome) -> Result<()> {
        match outcome {
            MessageOutcome::Done => {
                sqlx::query(
                    "UPDATE import_queue SET status = 'done', finished_at = $2, last_error = NULL WHERE id = $1",
                )
                .bind(id)
                .bind(Utc::now())
                .persistent(false)
                .execute(&self.pool)
                .await?;
            }
            MessageOutcome::Dropped { error } => {
                sqlx::query(
                    "UPDATE import_queue SET status = 'dropped', finished_at = $2, last_error = $3 WHERE id = $1",
                )
                .bind(id)
                .bind(Utc::now())
                .bind(error)
                .persistent(false)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }
}
