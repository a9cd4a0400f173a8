//! Record publisher: turns one fetched page into queue messages.
//!
//! Every item is built and validated independently; a bad record is logged
//! with its full payload and skipped without touching the rest of the page.
//! Only infrastructure failures (repository or queue transport) abort the
//! surrounding import run.

use anyhow::Result;
use serde_json::Value;
use tracing::error;

use crate::model::transfer::TransferModel;
use crate::queue::JobQueue;
use crate::repo::refs::SectionRepo;

pub struct RecordPublisher<'a> {
    queue: &'a dyn JobQueue,
    sections: &'a dyn SectionRepo,
}

impl<'a> RecordPublisher<'a> {
    pub fn new(queue: &'a dyn JobQueue, sections: &'a dyn SectionRepo) -> Self {
        Self { queue, sections }
    }

    /// Publishes every buildable record of one page as one batch insert.
    /// Returns the number of messages enqueued.
    pub async fn publish_page(&self, items: &[Value]) -> Result<usize> {
        let mut payloads = Vec::with_capacity(items.len());
        for item in items {
            let model = match TransferModel::build_from_value(item) {
                Ok(model) => model,
                Err(e) => {
                    error!(error = %e, record = %item, "record skipped: transfer model build failed");
                    continue;
                }
            };
            if self
                .sections
                .find_by_external_id(&model.section)
                .await?
                .is_none()
            {
                error!(section = %model.section, record = %item, "record skipped: unknown section");
                continue;
            }
            match model.to_payload() {
                Ok(payload) => payloads.push(payload),
                Err(e) => {
                    error!(error = %e, record = %item, "record skipped: payload serialization failed");
                }
            }
        }
        self.queue.enqueue(&payloads).await?;
        Ok(payloads.len())
    }
}
