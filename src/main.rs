use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use catalog_sync::cache::PgCacheInvalidator;
use catalog_sync::config::Settings;
use catalog_sync::consumer::MessageConsumer;
use catalog_sync::mapping::{Mapper, MapperDeps};
use catalog_sync::queue::PgJobQueue;
use catalog_sync::repo::products::PgProductRepo;
use catalog_sync::repo::refs::PgRefStore;
use catalog_sync::tracing::init_tracing;
use catalog_sync::util::db::Db;
use catalog_sync::util::env as env_util;

/// Queue consumer daemon. Polls the import queue, maps each claimed record
/// onto the catalog and exits once the message quota is spent so the
/// supervisor can start a fresh process with re-read reference data.
#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info,sqlx=warn")?;

    let settings = Settings::from_env().context("could not assemble settings")?;
    let db = Db::connect(&settings.database_url, settings.db_max_connections)
        .await
        .context("database connect failed")?;

    let refs = PgRefStore::new(db.pool.clone());
    let products = PgProductRepo::new(db.pool.clone());
    let queue = PgJobQueue::new(db.pool.clone());
    let cache = PgCacheInvalidator::new(db.pool.clone(), settings.cache_channel.clone());

    let mapper = Mapper::build(
        &settings,
        MapperDeps {
            cities: &refs,
            stores: &refs,
            properties: &refs,
            brands: &refs,
            statuses: &refs,
            products: &products,
            filter_positions: &refs,
        },
    )
    .await
    .context("mapper bootstrap failed")?;

    let mut consumer = MessageConsumer::new(
        mapper,
        &products,
        &refs,
        &cache,
        settings.worker_id.clone(),
        settings.message_quota,
    );

    info!(
        worker = %settings.worker_id,
        quota = settings.message_quota,
        poll_secs = settings.poll_interval.as_secs(),
        "consumer started"
    );

    let mut ticker = tokio::time::interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                match consumer.drain(&queue).await {
                    Ok(0) => {}
                    Ok(n) => info!(processed = n, "queue drained"),
                    Err(err) => error!(error = format!("{err:#}"), "queue drain failed"),
                }
                if consumer.quota_reached() {
                    info!(quota = settings.message_quota, "message quota reached, exiting");
                    break;
                }
            }
        }
    }

    Ok(())
}
