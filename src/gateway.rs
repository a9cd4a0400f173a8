//! HTTP gateway to the upstream ERP source.
//!
//! One call fetches one complete page or fails; there are no partial
//! results. Transport failures retry with a linear backoff (base delay
//! times the attempt ordinal) until the configured attempt budget runs out,
//! at which point the run-level error carries a 504 status.

use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("source unavailable after {attempts} configured attempts")]
    Unavailable { attempts: u32 },
}

impl GatewayError {
    /// Status reported in the import failure log.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Unavailable { .. } => 504,
        }
    }
}

/// One decoded page: raw items plus the source's total item count.
#[derive(Debug, Clone, Deserialize)]
pub struct PageResult {
    pub items: Vec<Value>,
    pub count: u64,
}

#[derive(Deserialize)]
struct Envelope {
    result: PageResult,
}

#[async_trait::async_trait]
pub trait SourceGateway: Send + Sync {
    async fn fetch_page(
        &self,
        page: u32,
        filter_id: Option<&str>,
    ) -> Result<PageResult, GatewayError>;
}

pub struct HttpSourceGateway {
    client: reqwest::Client,
    url: Url,
    attempts: u32,
    retry_delay: Duration,
}

impl HttpSourceGateway {
    pub fn new(url: Url, attempts: u32, retry_delay: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(crate::util::env::env_parse(
                "SOURCE_HTTP_TIMEOUT_SECS",
                30,
            )))
            .build()
            .context("building source http client")?;
        Ok(Self {
            client,
            url,
            attempts,
            retry_delay,
        })
    }

    async fn try_fetch(
        &self,
        page: u32,
        filter_id: Option<&str>,
    ) -> Result<PageResult, reqwest::Error> {
        let body = serde_json::json!({
            "page": page.to_string(),
            "filterId": filter_id.unwrap_or(""),
        });
        let envelope: Envelope = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.result)
    }
}

#[async_trait::async_trait]
impl SourceGateway for HttpSourceGateway {
    async fn fetch_page(
        &self,
        page: u32,
        filter_id: Option<&str>,
    ) -> Result<PageResult, GatewayError> {
        // ordinals run 1..attempts exclusive: a budget of N yields N-1 tries,
        // each failure sleeping delay * ordinal before the next
        for attempt in 1..self.attempts {
            let started = Instant::now();
            debug!(page, attempt, "fetching source page");
            match self.try_fetch(page, filter_id).await {
                Ok(result) => {
                    debug!(
                        page,
                        attempt,
                        items = result.items.len(),
                        count = result.count,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "source page fetched"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(page, attempt, error = %e, "source fetch attempt failed");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
            }
        }
        Err(GatewayError::Unavailable {
            attempts: self.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_decodes_items_and_count() {
        let raw = json!({
            "result": {
                "items": [{"id": "prod-1"}, {"id": "prod-2"}],
                "count": 41
            }
        });
        let envelope: Envelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.result.items.len(), 2);
        assert_eq!(envelope.result.count, 41);
    }

    #[test]
    fn unavailable_maps_to_gateway_timeout_status() {
        let err = GatewayError::Unavailable { attempts: 4 };
        assert_eq!(err.status(), 504);
        assert!(err.to_string().contains("4"));
    }

    #[tokio::test]
    async fn attempt_budget_of_one_never_dials_out() {
        // 1..1 is empty, so the gateway fails without touching the network
        let gateway = HttpSourceGateway::new(
            Url::parse("http://127.0.0.1:9/import").unwrap(),
            1,
            Duration::from_millis(1),
        )
        .unwrap();
        let err = gateway.fetch_page(0, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable { attempts: 1 }));
    }
}
