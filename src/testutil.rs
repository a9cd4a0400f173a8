//! Fixture builders and in-memory trait implementations backing the unit
//! tests. Everything here lives behind `#[cfg(test)]`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use indexmap::IndexMap;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use crate::cache::CacheInvalidator;
use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::config::Settings;
use crate::gateway::{GatewayError, PageResult, SourceGateway};
use crate::model::product::{Product, SectionShift};
use crate::queue::{JobQueue, MessageOutcome, QueuedMessage};
use crate::repo::products::ProductRepo;
use crate::repo::refs::{
    ActiveStore, Brand, BrandRepo, City, CityRepo, FilterPositionRepo, LoyaltyStatus, PropertyRef,
    PropertyRepo, Section, SectionRepo, StatusRepo, StoreRepo,
};

pub fn city(name: &str) -> City {
    City {
        id: Uuid::new_v4(),
        name: name.to_string(),
        parent_id: None,
    }
}

pub fn store_for(external_id: &str, city: &City, for_customers: bool) -> ActiveStore {
    ActiveStore {
        external_id: external_id.to_string(),
        for_customers,
        city: city.clone(),
    }
}

pub fn stub_product(external_id: &str) -> Product {
    Product::new_stub(external_id, external_id, 1)
}

/// A complete, valid raw record as the source delivers it. Tests override
/// individual keys to shape their scenario.
pub fn sample_record(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Плитка настенная",
        "code": 4417,
        "section": "sec-7",
        "limit": 10,
        "discounts": [{"type": "pt-pvl", "value": 5, "maxValue": 500}],
        "price": [{"type": "pt-pvl", "value": "1250.50"}],
        "units": [
            {"name": "шт", "coefficient": 1, "base": true, "calc": false},
            {"name": "м2", "coefficient": "2.5", "base": false, "calc": "true"}
        ],
        "balance": [{"stock": "store-1", "value": 12}],
        "set": [{"id": "prod-101", "value": 2, "default": "true"}],
        "properties": [
            {"id": "prop-1", "value": 60, "isFilter": true, "isCharacteristic": false}
        ],
        "unifyingProperties": [{"id": "prop-2", "value": "белый"}],
        "badge": [{"value": "Акция"}],
        "onOrder": [{"enabled": false, "daysCount": 3, "supply": [{"date": "2026-09-01"}]}],
        "barcodes": ["4601234567890"],
        "related": [{"id": "prod-102"}],
        "additional": [],
        "search": "кафель",
        "pointsMultiplier": [{"status": "st-gold", "multiplier": 2}],
        "additionalPoints": "1.5",
        "vendorCode": "VC-9",
        "visible": true
    })
}

/// Settings matching the price types used by [`sample_record`].
pub fn test_settings() -> Settings {
    let mut price_city_map = IndexMap::new();
    price_city_map.insert("Павлодар".to_string(), "pt-pvl".to_string());
    price_city_map.insert("Астана".to_string(), "pt-ast".to_string());
    let mut club_price_city_map = IndexMap::new();
    club_price_city_map.insert("Павлодар".to_string(), "pt-pvl-club".to_string());

    Settings {
        source_url: Url::parse("http://import.local/products").unwrap(),
        page_size: 100,
        gateway_attempts: 4,
        gateway_retry_delay: Duration::from_millis(1),
        checkpoint_dir: std::env::temp_dir().join("catalog-sync-tests"),
        import_log_key: "product_import".to_string(),
        reference_city: "Павлодар".to_string(),
        price_city_map,
        club_price_city_map,
        message_quota: 1000,
        poll_interval: Duration::from_millis(10),
        worker_id: "worker-test".to_string(),
        cache_channel: "cache_invalidation".to_string(),
        database_url: "postgres://localhost/catalog_test".to_string(),
        db_max_connections: 1,
    }
}

#[derive(Default)]
pub struct InMemorySections {
    sections: Vec<Section>,
}

impl InMemorySections {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            sections: entries
                .iter()
                .map(|(external_id, name)| Section {
                    id: Uuid::new_v4(),
                    external_id: external_id.to_string(),
                    name: name.to_string(),
                    item_count: 0,
                })
                .collect(),
        }
    }

    pub fn get(&self, external_id: &str) -> Option<Section> {
        self.sections
            .iter()
            .find(|s| s.external_id == external_id)
            .cloned()
    }
}

#[async_trait::async_trait]
impl SectionRepo for InMemorySections {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Section>> {
        Ok(self.get(external_id))
    }
}

pub struct InMemoryCities {
    cities: Vec<City>,
}

impl InMemoryCities {
    pub fn with(cities: Vec<City>) -> Self {
        Self { cities }
    }
}

#[async_trait::async_trait]
impl CityRepo for InMemoryCities {
    async fn list_roots(&self) -> Result<Vec<City>> {
        Ok(self
            .cities
            .iter()
            .filter(|c| c.parent_id.is_none())
            .cloned()
            .collect())
    }
}

pub struct InMemoryStores {
    stores: Vec<ActiveStore>,
}

impl InMemoryStores {
    pub fn with(stores: Vec<ActiveStore>) -> Self {
        Self { stores }
    }
}

#[async_trait::async_trait]
impl StoreRepo for InMemoryStores {
    async fn list_active(&self) -> Result<Vec<ActiveStore>> {
        Ok(self.stores.clone())
    }
}

pub struct InMemoryStatuses {
    statuses: Vec<LoyaltyStatus>,
}

impl InMemoryStatuses {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            statuses: entries
                .iter()
                .map(|(external_id, name)| LoyaltyStatus {
                    id: Uuid::new_v4(),
                    external_id: external_id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl StatusRepo for InMemoryStatuses {
    async fn list_all(&self) -> Result<Vec<LoyaltyStatus>> {
        Ok(self.statuses.clone())
    }
}

pub struct InMemoryProperties {
    entries: HashMap<String, PropertyRef>,
    lookups: Mutex<HashMap<String, usize>>,
}

impl InMemoryProperties {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(external_id, name)| {
                    (
                        external_id.to_string(),
                        PropertyRef {
                            id: Uuid::new_v4(),
                            name: name.to_string(),
                        },
                    )
                })
                .collect(),
            lookups: Mutex::new(HashMap::new()),
        }
    }

    pub fn internal_id(&self, external_id: &str) -> Uuid {
        self.entries[external_id].id
    }

    pub fn lookups(&self, external_id: &str) -> usize {
        self.lookups
            .lock()
            .unwrap()
            .get(external_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl PropertyRepo for InMemoryProperties {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PropertyRef>> {
        *self
            .lookups
            .lock()
            .unwrap()
            .entry(external_id.to_string())
            .or_insert(0) += 1;
        Ok(self.entries.get(external_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryBrands {
    brands: Mutex<Vec<Brand>>,
    finds: Mutex<usize>,
    creates: Mutex<usize>,
}

impl InMemoryBrands {
    pub fn created_count(&self) -> usize {
        *self.creates.lock().unwrap()
    }

    pub fn find_count(&self) -> usize {
        *self.finds.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl BrandRepo for InMemoryBrands {
    async fn find_by_name(&self, name: &str) -> Result<Option<Brand>> {
        *self.finds.lock().unwrap() += 1;
        Ok(self
            .brands
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.name == name)
            .cloned())
    }

    async fn insert(&self, brand: &Brand) -> Result<()> {
        *self.creates.lock().unwrap() += 1;
        self.brands.lock().unwrap().push(brand.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryFilterPositions {
    positions: Mutex<HashMap<(Uuid, Uuid), i32>>,
}

impl InMemoryFilterPositions {
    pub fn stored(&self) -> HashMap<(Uuid, Uuid), i32> {
        self.positions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl FilterPositionRepo for InMemoryFilterPositions {
    async fn upsert(&self, section_id: Uuid, property_id: Uuid, position: i32) -> Result<()> {
        self.positions
            .lock()
            .unwrap()
            .insert((section_id, property_id), position);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProducts {
    products: Mutex<HashMap<String, Product>>,
    shifts: Mutex<Vec<SectionShift>>,
}

impl InMemoryProducts {
    pub fn seed(&self, product: Product) {
        self.products
            .lock()
            .unwrap()
            .insert(product.external_id.clone(), product);
    }

    pub fn get(&self, external_id: &str) -> Option<Product> {
        self.products.lock().unwrap().get(external_id).cloned()
    }

    /// Shifts recorded by the most recent `save`.
    pub fn last_shifts(&self) -> Vec<SectionShift> {
        self.shifts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ProductRepo for InMemoryProducts {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Product>> {
        Ok(self.get(external_id))
    }

    async fn resolve_external_ids(&self, external_ids: &[String]) -> Result<Vec<(String, Uuid)>> {
        let products = self.products.lock().unwrap();
        Ok(external_ids
            .iter()
            .filter_map(|ext| products.get(ext).map(|p| (ext.clone(), p.id)))
            .collect())
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        self.seed(product.clone());
        Ok(())
    }

    async fn save(&self, product: &Product, shifts: &[SectionShift]) -> Result<()> {
        self.seed(product.clone());
        *self.shifts.lock().unwrap() = shifts.to_vec();
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingCache {
    tags: Mutex<Vec<String>>,
}

impl RecordingCache {
    pub fn tags(&self) -> Vec<String> {
        self.tags.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CacheInvalidator for RecordingCache {
    async fn invalidate_tag(&self, tag: &str) -> Result<()> {
        self.tags.lock().unwrap().push(tag.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCheckpoint {
    pages: Mutex<HashMap<String, u32>>,
}

impl CheckpointStore for InMemoryCheckpoint {
    fn save(&self, key: &str, page: u32) -> Result<(), CheckpointError> {
        self.pages.lock().unwrap().insert(key.to_string(), page);
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<u32>, CheckpointError> {
        Ok(self.pages.lock().unwrap().get(key).copied())
    }

    fn clear(&self, key: &str) -> Result<(), CheckpointError> {
        self.pages.lock().unwrap().remove(key);
        Ok(())
    }
}

struct QueueEntry {
    id: i64,
    payload: String,
    claimed: bool,
}

#[derive(Default)]
struct QueueState {
    next_id: i64,
    entries: Vec<QueueEntry>,
    outcomes: Vec<(i64, MessageOutcome)>,
}

#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    /// Every payload ever enqueued, in insertion order.
    pub fn enqueued(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.payload.clone())
            .collect()
    }

    /// Messages still waiting to be claimed.
    pub fn remaining(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| !e.claimed)
            .count()
    }

    pub fn outcomes(&self) -> Vec<(i64, MessageOutcome)> {
        self.state.lock().unwrap().outcomes.clone()
    }
}

#[async_trait::async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, payloads: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for payload in payloads {
            state.next_id += 1;
            let id = state.next_id;
            state.entries.push(QueueEntry {
                id,
                payload: payload.clone(),
                claimed: false,
            });
        }
        Ok(())
    }

    async fn claim_next(&self, _worker: &str) -> Result<Option<QueuedMessage>> {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.entries.iter_mut().find(|e| !e.claimed) else {
            return Ok(None);
        };
        entry.claimed = true;
        Ok(Some(QueuedMessage {
            id: entry.id,
            payload: entry.payload.clone(),
        }))
    }

    async fn finish(&self, id: i64, outcome: MessageOutcome) -> Result<()> {
        self.state.lock().unwrap().outcomes.push((id, outcome));
        Ok(())
    }
}

pub struct MockGateway {
    pages: Vec<Vec<Value>>,
    count: u64,
    fail_from: Option<u32>,
    fetched: Mutex<Vec<u32>>,
    filters: Mutex<Vec<Option<String>>>,
}

impl MockGateway {
    pub fn new(pages: Vec<Vec<Value>>, count: u64) -> Self {
        Self {
            pages,
            count,
            fail_from: None,
            fetched: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
        }
    }

    /// Makes every fetch of `page` and beyond fail as unavailable.
    pub fn failing_from(mut self, page: u32) -> Self {
        self.fail_from = Some(page);
        self
    }

    pub fn fetched(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn filters(&self) -> Vec<Option<String>> {
        self.filters.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SourceGateway for MockGateway {
    async fn fetch_page(
        &self,
        page: u32,
        filter_id: Option<&str>,
    ) -> Result<PageResult, GatewayError> {
        self.fetched.lock().unwrap().push(page);
        self.filters
            .lock()
            .unwrap()
            .push(filter_id.map(str::to_string));
        if self.fail_from.is_some_and(|from| page >= from) {
            return Err(GatewayError::Unavailable { attempts: 4 });
        }
        Ok(PageResult {
            items: self.pages.get(page as usize).cloned().unwrap_or_default(),
            count: self.count,
        })
    }
}
