//! Per-message transformation of a validated transfer model into the fields
//! of a catalog entity.
//!
//! The [`Mapper`] owns everything with consumer-instance lifetime: the two
//! city indices, the store index, the loyalty statuses and the memoizing
//! property/brand resolvers. The stage functions themselves live in the
//! submodules and stay free of that state where they can.

pub mod balance;
pub mod brand;
pub mod bundle;
pub mod name;
pub mod points;
pub mod prices;
pub mod properties;
pub mod status;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::config::Settings;
use crate::mapping::balance::{BalanceByCity, StoreIndex};
use crate::mapping::brand::BrandResolver;
use crate::mapping::bundle::BundleComponent;
use crate::mapping::prices::{CityIndex, PriceError, ResolvedDiscount, ResolvedPrices};
use crate::mapping::properties::PropertyResolver;
use crate::mapping::status::{derive_status, StatusError};
use crate::model::transfer::TransferModel;
use crate::repo::products::ProductRepo;
use crate::repo::refs::{
    Brand, BrandRepo, CityRepo, FilterPositionRepo, LoyaltyStatus, PropertyRepo, StatusRepo,
    StoreRepo,
};

/// Repository seams the mapper reads reference data through.
pub struct MapperDeps<'a> {
    pub cities: &'a dyn CityRepo,
    pub stores: &'a dyn StoreRepo,
    pub properties: &'a dyn PropertyRepo,
    pub brands: &'a dyn BrandRepo,
    pub statuses: &'a dyn StatusRepo,
    pub products: &'a dyn ProductRepo,
    pub filter_positions: &'a dyn FilterPositionRepo,
}

/// Scalar output of [`Mapper::map_fields`], applied to the entity wholesale.
#[derive(Debug, Clone)]
pub struct MappedFields {
    pub name: String,
    pub sortable_name: String,
    pub external_id: String,
    pub description: Option<String>,
    pub badges: Vec<String>,
    pub on_order: bool,
    pub date_receipt: Option<String>,
    pub days_order: String,
    pub product_code: String,
    pub vendor_code: Option<String>,
    pub tnved: Option<String>,
    pub tru: Option<String>,
    pub barcodes: Vec<String>,
    pub characteristics: IndexMap<String, String>,
    pub limit: i64,
    pub related: Vec<String>,
    pub additional: Vec<String>,
    pub points_multiplier: f64,
    pub points_multipliers: IndexMap<String, f64>,
    pub additional_points: f64,
    pub is_dimensional: bool,
    pub search_synonyms: String,
    pub active: bool,
    pub status: i16,
}

pub struct Mapper<'a> {
    cities: CityIndex,
    club_cities: CityIndex,
    required_price_type: String,
    stores: StoreIndex,
    statuses: Vec<LoyaltyStatus>,
    properties: PropertyResolver<'a>,
    brands: BrandResolver<'a>,
    products: &'a dyn ProductRepo,
    filter_positions: &'a dyn FilterPositionRepo,
}

impl<'a> Mapper<'a> {
    /// Loads the reference data that lives for the whole consumer instance:
    /// root cities, active stores and loyalty statuses. The configured
    /// reference city must resolve to a price type or startup fails.
    pub async fn build(settings: &Settings, deps: MapperDeps<'a>) -> Result<Mapper<'a>> {
        let roots = deps.cities.list_roots().await?;
        let cities = CityIndex::build(&settings.price_city_map, &roots);
        let club_cities = CityIndex::build(&settings.club_price_city_map, &roots);
        let required_price_type = settings
            .price_city_map
            .get(&settings.reference_city)
            .cloned()
            .with_context(|| {
                format!(
                    "reference city {:?} has no entry in the price city map",
                    settings.reference_city
                )
            })?;
        let stores = StoreIndex::build(deps.stores.list_active().await?);
        let statuses = deps.statuses.list_all().await?;

        Ok(Mapper {
            cities,
            club_cities,
            required_price_type,
            stores,
            statuses,
            properties: PropertyResolver::new(deps.properties),
            brands: BrandResolver::new(deps.brands),
            products: deps.products,
            filter_positions: deps.filter_positions,
        })
    }

    pub fn map_discounts(&self, model: &TransferModel) -> Vec<ResolvedDiscount> {
        prices::map_discounts(model, &self.cities)
    }

    pub fn map_prices(
        &self,
        model: &TransferModel,
        discounts: &[ResolvedDiscount],
    ) -> Result<ResolvedPrices, PriceError> {
        prices::map_prices(
            model,
            &self.cities,
            &self.club_cities,
            &self.required_price_type,
            discounts,
        )
    }

    pub async fn build_filters(&mut self, model: &TransferModel) -> Result<Vec<String>> {
        properties::build_filters(model, &mut self.properties).await
    }

    pub async fn build_unifying(&mut self, model: &TransferModel) -> Result<Vec<String>> {
        properties::build_unifying(model, &mut self.properties).await
    }

    pub async fn store_filter_positions(
        &mut self,
        model: &TransferModel,
        section_id: Uuid,
    ) -> Result<()> {
        properties::store_filter_positions(
            model,
            section_id,
            &mut self.properties,
            self.filter_positions,
        )
        .await
    }

    pub async fn resolve_brand(&mut self, model: &TransferModel) -> Result<Option<Brand>> {
        brand::process_brand(model, &mut self.properties, &mut self.brands).await
    }

    pub fn map_balance(&self, model: &TransferModel) -> BalanceByCity {
        let aggregated = balance::map_balance(model, &self.stores);
        balance::validate_and_truncate(aggregated, &model.units)
    }

    pub async fn resolve_set(&self, model: &TransferModel) -> Result<Vec<BundleComponent>> {
        bundle::resolve_set(&model.set, self.products).await
    }

    /// Composes the scalar field set for a full entity update. `balance` must
    /// already be aggregated and truncated since status derives from it.
    pub async fn map_fields(
        &mut self,
        model: &TransferModel,
        balance: &BalanceByCity,
    ) -> Result<MappedFields> {
        let status = derive_status(model, balance)?;
        let on_order = model
            .on_order
            .first()
            .ok_or(StatusError::MissingOnOrder)?;
        let characteristics =
            properties::build_characteristics(model, &mut self.properties).await?;
        let display_name = name::compose_name(model);

        Ok(MappedFields {
            sortable_name: name::sortable_name(&display_name),
            name: display_name,
            external_id: model.id.clone(),
            description: name::clean_string(model.description.as_deref()),
            badges: name::normalize_badges(model),
            on_order: on_order.enabled,
            date_receipt: on_order.supply.first().map(|s| s.date.clone()),
            days_order: on_order.days_count.clone(),
            product_code: model.code.to_string(),
            vendor_code: name::clean_string(model.vendor_code.as_deref()),
            tnved: name::clean_string(model.tnved.as_deref()),
            tru: name::clean_string(model.tru.as_deref()),
            barcodes: model.barcodes.clone(),
            characteristics,
            limit: model.limit,
            related: model.related.iter().map(|r| r.id.clone()).collect(),
            additional: model.additional.iter().map(|r| r.id.clone()).collect(),
            // legacy scalar superseded by the per-status multipliers
            points_multiplier: 1.0,
            points_multipliers: points::points_multipliers(
                &model.points_multiplier,
                &self.statuses,
            ),
            additional_points: model
                .additional_points
                .as_deref()
                .and_then(|p| p.parse().ok())
                .unwrap_or(0.0),
            is_dimensional: model.is_dimensional,
            search_synonyms: model.search.clone(),
            active: model.visible,
            status,
        })
    }
}
