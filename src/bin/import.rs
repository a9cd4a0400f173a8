use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use catalog_sync::checkpoint::FileCheckpointStore;
use catalog_sync::config::Settings;
use catalog_sync::gateway::HttpSourceGateway;
use catalog_sync::import::ImportDriver;
use catalog_sync::publish::RecordPublisher;
use catalog_sync::queue::PgJobQueue;
use catalog_sync::repo::refs::PgRefStore;
use catalog_sync::tracing::init_tracing;
use catalog_sync::util::db::Db;
use catalog_sync::util::env as env_util;

#[derive(Parser, Debug)]
#[command(
    name = "import",
    version,
    about = "Pages the product source into the import queue"
)]
struct Cli {
    /// Restrict the import to a single source record id.
    #[arg(long)]
    filter_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info,sqlx=warn")?;
    let cli = Cli::parse();

    let settings = Settings::from_env().context("could not assemble settings")?;
    let db = Db::connect(&settings.database_url, settings.db_max_connections)
        .await
        .context("database connect failed")?;

    let gateway = HttpSourceGateway::new(
        settings.source_url.clone(),
        settings.gateway_attempts,
        settings.gateway_retry_delay,
    )
    .context("source gateway bootstrap failed")?;
    let checkpoint = FileCheckpointStore::new(settings.checkpoint_dir.clone());
    let queue = PgJobQueue::new(db.pool.clone());
    let sections = PgRefStore::new(db.pool.clone());
    let publisher = RecordPublisher::new(&queue, &sections);

    let driver = ImportDriver::new(
        &gateway,
        &checkpoint,
        &publisher,
        settings.page_size,
        settings.import_log_key.clone(),
    );

    let pages = driver.run(cli.filter_id.as_deref()).await?;
    info!(pages, "import finished");
    println!("imported {pages} page(s)");
    Ok(())
}
