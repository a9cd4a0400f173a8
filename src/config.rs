//! Runtime settings for the import driver and the queue consumer.
//!
//! Everything is sourced from the environment (a `.env` file is honored via
//! the shared env helpers). The two price-city maps use the
//! `Name=priceTypeId,Name=priceTypeId` comma-list form.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use url::Url;
use uuid::Uuid;

use crate::util::env::{db_url, env_opt, env_parse, env_req};

/// City whose price type must be present on every record unless overridden.
pub const DEFAULT_REFERENCE_CITY: &str = "Павлодар";

#[derive(Debug, Clone)]
pub struct Settings {
    pub source_url: Url,
    pub page_size: u32,
    pub gateway_attempts: u32,
    pub gateway_retry_delay: Duration,
    pub checkpoint_dir: PathBuf,
    pub import_log_key: String,
    pub reference_city: String,
    pub price_city_map: IndexMap<String, String>,
    pub club_price_city_map: IndexMap<String, String>,
    pub message_quota: u32,
    pub poll_interval: Duration,
    pub worker_id: String,
    pub cache_channel: String,
    pub database_url: String,
    pub db_max_connections: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let source_url = env_req("SOURCE_URL")?;
        let source_url = Url::parse(&source_url)
            .with_context(|| format!("SOURCE_URL is not a valid URL: {source_url}"))?;

        let page_size: u32 = env_parse("PAGE_SIZE", 100);
        if page_size == 0 {
            return Err(anyhow!("PAGE_SIZE must be at least 1"));
        }
        let gateway_attempts: u32 = env_parse("GATEWAY_ATTEMPTS", 4);
        if gateway_attempts == 0 {
            return Err(anyhow!("GATEWAY_ATTEMPTS must be at least 1"));
        }

        let price_city_map = parse_city_map(&env_req("PRICE_CITY_MAP")?);
        if price_city_map.is_empty() {
            return Err(anyhow!("PRICE_CITY_MAP is empty or malformed"));
        }
        let club_price_city_map =
            parse_city_map(&env_opt("CLUB_PRICE_CITY_MAP").unwrap_or_default());

        Ok(Self {
            source_url,
            page_size,
            gateway_attempts,
            gateway_retry_delay: Duration::from_millis(env_parse("GATEWAY_RETRY_DELAY_MS", 500)),
            checkpoint_dir: PathBuf::from(
                env_opt("CHECKPOINT_DIR").unwrap_or_else(|| "./checkpoints".into()),
            ),
            import_log_key: env_opt("IMPORT_LOG_KEY").unwrap_or_else(|| "product_import".into()),
            reference_city: env_opt("REFERENCE_CITY")
                .unwrap_or_else(|| DEFAULT_REFERENCE_CITY.into()),
            price_city_map,
            club_price_city_map,
            message_quota: env_parse("MESSAGE_QUOTA", 1000),
            poll_interval: Duration::from_secs(env_parse("POLL_INTERVAL_SECS", 5)),
            worker_id: env_opt("WORKER_ID")
                .unwrap_or_else(|| format!("consumer-{}", Uuid::new_v4())),
            cache_channel: env_opt("CACHE_CHANNEL").unwrap_or_else(|| "cache_invalidation".into()),
            database_url: db_url()?,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 5),
        })
    }
}

/// Parses `Name=id,Name=id` into an ordered name -> price-type-id map.
/// Blank names or ids are dropped.
pub fn parse_city_map(raw: &str) -> IndexMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, id)| (name.trim().to_string(), id.trim().to_string()))
        .filter(|(name, id)| !name.is_empty() && !id.is_empty())
        .collect()
}
