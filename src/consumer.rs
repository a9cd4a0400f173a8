//! Queue consumer: one message, one attempted catalog update.
//!
//! Every claimed message counts against the processing quota whether it
//! succeeds or drops; the process exits once the quota is reached and the
//! host scheduler starts a fresh one, which is what bounds the memoizing
//! reference caches. Errors never requeue a message.

use anyhow::{bail, Result};
use tracing::{debug, error, info, warn};

use crate::cache::CacheInvalidator;
use crate::mapping::prices::PriceError;
use crate::mapping::Mapper;
use crate::model::product::{Product, ProductUpdate};
use crate::model::transfer::{BuildError, TransferModel};
use crate::queue::{JobQueue, MessageOutcome};
use crate::repo::products::ProductRepo;
use crate::repo::refs::SectionRepo;

/// Message-level outcome; both variants mean "handled".
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Ok,
    Dropped(String),
}

pub struct MessageConsumer<'a> {
    mapper: Mapper<'a>,
    products: &'a dyn ProductRepo,
    sections: &'a dyn SectionRepo,
    cache: &'a dyn CacheInvalidator,
    worker_id: String,
    quota: u32,
    handled: u32,
}

impl<'a> MessageConsumer<'a> {
    pub fn new(
        mapper: Mapper<'a>,
        products: &'a dyn ProductRepo,
        sections: &'a dyn SectionRepo,
        cache: &'a dyn CacheInvalidator,
        worker_id: impl Into<String>,
        quota: u32,
    ) -> Self {
        Self {
            mapper,
            products,
            sections,
            cache,
            worker_id: worker_id.into(),
            quota,
            handled: 0,
        }
    }

    pub fn quota_reached(&self) -> bool {
        self.handled >= self.quota
    }

    /// Claims and handles messages until the queue runs dry or the quota is
    /// reached. Returns the number of messages finished in this call.
    pub async fn drain(&mut self, queue: &dyn JobQueue) -> Result<u32> {
        let mut processed = 0;
        while !self.quota_reached() {
            let Some(message) = queue.claim_next(&self.worker_id).await? else {
                break;
            };
            let outcome = match self.handle(&message.payload).await {
                Handled::Ok => MessageOutcome::Done,
                Handled::Dropped(error) => MessageOutcome::Dropped { error },
            };
            queue.finish(message.id, outcome).await?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Handles one message payload. Every call counts against the quota, and
    /// every error is terminal for the message.
    pub async fn handle(&mut self, payload: &str) -> Handled {
        self.handled += 1;
        match self.process(payload).await {
            Ok(()) => Handled::Ok,
            Err(e) => {
                if e.downcast_ref::<BuildError>().is_some() {
                    error!(error = %e, payload = %payload, "could not build transfer model from message");
                } else {
                    error!(error = format!("{e:#}"), payload = %payload, "message dropped");
                }
                Handled::Dropped(format!("{e:#}"))
            }
        }
    }

    async fn process(&mut self, payload: &str) -> Result<()> {
        if payload.trim().is_empty() {
            bail!("empty message payload");
        }
        let model = TransferModel::build_from_str(payload)?;
        let section = self
            .sections
            .find_by_external_id(&model.section)
            .await?
            .ok_or_else(|| BuildError::UnknownSection(model.section.clone()))?;

        let Some(mut product) = self.products.find_by_external_id(&model.id).await? else {
            let stub = Product::new_stub(&model.id, &model.name, model.code);
            self.products.insert(&stub).await?;
            info!(external_id = %model.id, id = %stub.id, "new product created from first sight");
            self.invalidate(&stub).await;
            return Ok(());
        };

        let discounts = self.mapper.map_discounts(&model);
        let resolved = self.mapper.map_prices(&model, &discounts)?;
        let units = model.units.clone();
        let filters = self.mapper.build_filters(&model).await?;
        let brand = self.mapper.resolve_brand(&model).await?;
        let balance = self.mapper.map_balance(&model);
        let set = self.mapper.resolve_set(&model).await?;
        let unifying = self.mapper.build_unifying(&model).await?;

        // position rows land even when the update is rejected just below
        self.mapper.store_filter_positions(&model, section.id).await?;

        if resolved.prices.is_empty() {
            return Err(PriceError::NoUsablePrices {
                external_id: model.id.clone(),
            }
            .into());
        }

        let prices = resolved.merged();
        let fields = self.mapper.map_fields(&model, &balance).await?;
        let update = ProductUpdate {
            fields,
            section,
            brand,
            prices,
            discounts,
            units,
            balance,
            set,
            filters,
            unifying,
        };
        let shifts = product.apply(update);
        self.products.save(&product, &shifts).await?;
        debug!(external_id = %product.external_id, id = %product.id, "product updated");
        self.invalidate(&product).await;
        Ok(())
    }

    async fn invalidate(&self, product: &Product) {
        let tag = product.cache_tag();
        if let Err(e) = self.cache.invalidate_tag(&tag).await {
            warn!(error = format!("{e:#}"), tag = %tag, "cache invalidation failed");
        }
    }
}
