//! Persisted catalog entity and its domain operations.
//!
//! A product is created as a stub on first sight of an external id and fully
//! replaced on every later message for that id. Section item counts move
//! together with the entity inside one transaction: `reassign_section` and
//! `set_active` return the count shifts instead of applying them, so the
//! repository can bundle the row update and the counter updates.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::mapping::balance::BalanceByCity;
use crate::mapping::bundle::BundleComponent;
use crate::mapping::prices::{PriceRow, ResolvedDiscount};
use crate::mapping::MappedFields;
use crate::model::transfer::UnitEntry;
use crate::repo::refs::{Brand, Section};

/// Available for purchase or on-order.
pub const STATUS_AVAILABLE: i16 = 1;
/// Awaiting receipt, not currently purchasable.
pub const STATUS_AWAITING_RECEIPT: i16 = 0;

/// Model name used in cache invalidation tags.
pub const CACHE_MODEL_NAME: &str = "product";

/// Fixed badge table. Keys are lowercased, trimmed raw badge values.
pub fn badge_label(normalized: &str) -> Option<&'static str> {
    match normalized {
        "акция" => Some("Акция"),
        "новинки" | "новинка" | "_новинки" => Some("Новинка"),
        "витринный образец" => Some("Витринный образец"),
        "распродажа" => Some("Распродажа"),
        _ => None,
    }
}

/// A single section counter adjustment to apply in the same transaction as
/// the entity write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionShift {
    pub section_id: Uuid,
    pub delta: i32,
}

/// Everything a consumer computes for one message, applied to the entity as
/// one full replace.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub fields: MappedFields,
    pub section: Section,
    pub brand: Option<Brand>,
    pub prices: Vec<PriceRow>,
    pub discounts: Vec<ResolvedDiscount>,
    pub units: Vec<UnitEntry>,
    pub balance: BalanceByCity,
    pub set: Vec<BundleComponent>,
    pub filters: Vec<String>,
    pub unifying: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Product {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub sortable_name: String,
    pub product_code: String,
    pub active: bool,
    pub status: i16,
    pub section_id: Option<Uuid>,
    pub section_name: Option<String>,
    pub brand_id: Option<Uuid>,
    pub description: Option<String>,
    pub vendor_code: Option<String>,
    pub tnved: Option<String>,
    pub tru: Option<String>,
    pub badges: Vec<String>,
    pub barcodes: Vec<String>,
    pub characteristics: IndexMap<String, String>,
    pub on_order: bool,
    pub date_receipt: Option<String>,
    pub days_order: String,
    pub purchase_limit: i64,
    pub related: Vec<String>,
    pub additional: Vec<String>,
    pub points_multiplier: f64,
    pub points_multipliers: IndexMap<String, f64>,
    pub additional_points: f64,
    pub is_dimensional: bool,
    pub search_synonyms: String,
    pub prices: Vec<PriceRow>,
    pub discounts: Vec<ResolvedDiscount>,
    pub units: Vec<UnitEntry>,
    pub balance: BalanceByCity,
    pub set: Vec<BundleComponent>,
    pub filters: Vec<String>,
    pub unifying: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Minimal entity created on first sight of an external id. Full
    /// attributes arrive with the next message cycle for the same id.
    pub fn new_stub(external_id: &str, name: &str, code: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            name: name.trim().to_string(),
            sortable_name: String::new(),
            product_code: code.to_string(),
            active: true,
            status: STATUS_AWAITING_RECEIPT,
            section_id: None,
            section_name: None,
            brand_id: None,
            description: None,
            vendor_code: None,
            tnved: None,
            tru: None,
            badges: Vec::new(),
            barcodes: Vec::new(),
            characteristics: IndexMap::new(),
            on_order: false,
            date_receipt: None,
            days_order: String::new(),
            purchase_limit: 0,
            related: Vec::new(),
            additional: Vec::new(),
            points_multiplier: 1.0,
            points_multipliers: IndexMap::new(),
            additional_points: 0.0,
            is_dimensional: false,
            search_synonyms: String::new(),
            prices: Vec::new(),
            discounts: Vec::new(),
            units: Vec::new(),
            balance: BalanceByCity::new(),
            set: Vec::new(),
            filters: Vec::new(),
            unifying: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Tag broadcast to the cache layer whenever this entity changes.
    pub fn cache_tag(&self) -> String {
        format!("{}_{}", CACHE_MODEL_NAME, self.id)
    }

    /// Moves the entity to `section`, returning the counter shifts.
    ///
    /// Counters track active entities only, so an inactive entity moves
    /// without shifting any counter. Same-section reassignment refreshes the
    /// denormalized name and shifts nothing.
    pub fn reassign_section(&mut self, section: &Section) -> Vec<SectionShift> {
        if self.section_id == Some(section.id) {
            self.section_name = Some(section.name.clone());
            return Vec::new();
        }
        let mut shifts = Vec::new();
        if self.active {
            if let Some(old) = self.section_id {
                shifts.push(SectionShift { section_id: old, delta: -1 });
            }
            shifts.push(SectionShift { section_id: section.id, delta: 1 });
        }
        self.section_id = Some(section.id);
        self.section_name = Some(section.name.clone());
        shifts
    }

    /// Flips the active flag, returning the counter shift for the current
    /// section. A no-op transition shifts nothing.
    pub fn set_active(&mut self, active: bool) -> Vec<SectionShift> {
        if self.active == active {
            return Vec::new();
        }
        self.active = active;
        match self.section_id {
            Some(section_id) => vec![SectionShift {
                section_id,
                delta: if active { 1 } else { -1 },
            }],
            None => Vec::new(),
        }
    }

    /// Full-field replace. Section reassignment runs against the entity's
    /// pre-update active flag, then the active flag itself transitions, so
    /// the combined shifts stay consistent with the section-count invariant.
    pub fn apply(&mut self, update: ProductUpdate) -> Vec<SectionShift> {
        let mut shifts = self.reassign_section(&update.section);
        shifts.extend(self.set_active(update.fields.active));

        let fields = update.fields;
        self.external_id = fields.external_id;
        self.name = fields.name;
        self.sortable_name = fields.sortable_name;
        self.product_code = fields.product_code;
        self.status = fields.status;
        self.brand_id = update.brand.map(|b| b.id);
        self.description = fields.description;
        self.vendor_code = fields.vendor_code;
        self.tnved = fields.tnved;
        self.tru = fields.tru;
        self.badges = fields.badges;
        self.barcodes = fields.barcodes;
        self.characteristics = fields.characteristics;
        self.on_order = fields.on_order;
        self.date_receipt = fields.date_receipt;
        self.days_order = fields.days_order;
        self.purchase_limit = fields.limit;
        self.related = fields.related;
        self.additional = fields.additional;
        self.points_multiplier = fields.points_multiplier;
        self.points_multipliers = fields.points_multipliers;
        self.additional_points = fields.additional_points;
        self.is_dimensional = fields.is_dimensional;
        self.search_synonyms = fields.search_synonyms;
        self.prices = update.prices;
        self.discounts = update.discounts;
        self.units = update.units;
        self.balance = update.balance;
        self.set = update.set;
        self.filters = update.filters;
        self.unifying = update.unifying;
        self.updated_at = Utc::now();
        shifts
    }
}
