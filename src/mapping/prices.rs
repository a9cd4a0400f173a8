//! Multi-city price and discount resolution.
//!
//! Raw price entries carry an external price-type id; the consumer-local
//! [`CityIndex`] maps those ids onto root cities. Regular rows get a
//! percentage discount applied when a resolved discount matches both the
//! price type and the city; club rows are always face value.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::transfer::TransferModel;
use crate::repo::refs::City;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("record {external_id} carries no price for the mandatory reference city")]
    MissingMandatoryCity { external_id: String },
    #[error("no usable price types resolved for record {external_id}")]
    NoUsablePrices { external_id: String },
}

/// External price-type id -> root city, built once per consumer instance.
#[derive(Debug, Clone, Default)]
pub struct CityIndex {
    by_type: HashMap<String, City>,
}

impl CityIndex {
    /// `name_to_type` is the configured city-name -> price-type map; cities
    /// absent from it (and map entries naming no known root city) are dropped.
    pub fn build(name_to_type: &IndexMap<String, String>, roots: &[City]) -> Self {
        let mut by_type = HashMap::new();
        for city in roots {
            if let Some(price_type) = name_to_type.get(&city.name) {
                by_type.insert(price_type.clone(), city.clone());
            }
        }
        Self { by_type }
    }

    pub fn resolve(&self, price_type: &str) -> Option<&City> {
        self.by_type.get(price_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDiscount {
    pub city: City,
    #[serde(rename = "type")]
    pub price_type: String,
    pub value: f64,
    pub max_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRow {
    #[serde(rename = "type")]
    pub price_type: String,
    pub value: f64,
    pub discounted_price: f64,
    pub city: City,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPrices {
    pub prices: Vec<PriceRow>,
    pub club_prices: Vec<PriceRow>,
}

impl ResolvedPrices {
    /// Regular rows first, club rows appended, as the catalog stores them.
    pub fn merged(&self) -> Vec<PriceRow> {
        self.prices
            .iter()
            .chain(self.club_prices.iter())
            .cloned()
            .collect()
    }
}

/// Attaches cities to the raw discount entries. Club prices are never
/// discounted, so only the regular index participates.
pub fn map_discounts(model: &TransferModel, regular: &CityIndex) -> Vec<ResolvedDiscount> {
    model
        .discounts
        .iter()
        .filter_map(|d| {
            regular.resolve(&d.price_type).map(|city| ResolvedDiscount {
                city: city.clone(),
                price_type: d.price_type.clone(),
                value: d.value,
                max_value: d.max_value,
            })
        })
        .collect()
}

/// Resolves the record's price entries against both city indices.
///
/// A record without any entry for the mandatory price type is rejected
/// outright; one entry may land in both tiers when the type exists in both
/// indices.
pub fn map_prices(
    model: &TransferModel,
    regular: &CityIndex,
    club: &CityIndex,
    required_price_type: &str,
    discounts: &[ResolvedDiscount],
) -> Result<ResolvedPrices, PriceError> {
    let has_required = model
        .price
        .iter()
        .any(|p| p.price_type == required_price_type);
    if !has_required {
        warn!(
            target: "invalid_products",
            external_id = %model.id,
            "import rejected: no price for the mandatory reference city"
        );
        return Err(PriceError::MissingMandatoryCity {
            external_id: model.id.clone(),
        });
    }

    let mut resolved = ResolvedPrices::default();
    for entry in &model.price {
        if let Some(city) = regular.resolve(&entry.price_type) {
            resolved.prices.push(PriceRow {
                price_type: entry.price_type.clone(),
                value: entry.value,
                discounted_price: discounted_amount(&entry.price_type, entry.value, city, discounts),
                city: city.clone(),
            });
        }
        if let Some(city) = club.resolve(&entry.price_type) {
            resolved.club_prices.push(PriceRow {
                price_type: entry.price_type.clone(),
                value: entry.value,
                discounted_price: entry.value,
                city: city.clone(),
            });
        }
    }
    Ok(resolved)
}

fn discounted_amount(
    price_type: &str,
    value: f64,
    city: &City,
    discounts: &[ResolvedDiscount],
) -> f64 {
    for discount in discounts {
        if discount.price_type == price_type && discount.city.id == city.id {
            return value - value * discount.value / 100.0;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::transfer::TransferModel;
    use crate::testutil::{city, sample_record};
    use indexmap::IndexMap;
    use serde_json::json;

    fn indices() -> (CityIndex, CityIndex, Vec<City>) {
        let pavlodar = city("Павлодар");
        let astana = city("Астана");
        let roots = vec![pavlodar, astana];
        let mut regular: IndexMap<String, String> = IndexMap::new();
        regular.insert("Павлодар".into(), "pt-pvl".into());
        regular.insert("Астана".into(), "pt-ast".into());
        let mut club: IndexMap<String, String> = IndexMap::new();
        club.insert("Павлодар".into(), "pt-pvl-club".into());
        (
            CityIndex::build(&regular, &roots),
            CityIndex::build(&club, &roots),
            roots,
        )
    }

    fn model_with(prices: serde_json::Value, discounts: serde_json::Value) -> TransferModel {
        let mut raw = sample_record("prod-1");
        raw["price"] = prices;
        raw["discounts"] = discounts;
        TransferModel::build_from_value(&raw).unwrap()
    }

    #[test]
    fn rejects_record_without_mandatory_city_price() {
        let (regular, club, _) = indices();
        let model = model_with(json!([{"type": "pt-ast", "value": 100}]), json!([]));
        let err = map_prices(&model, &regular, &club, "pt-pvl", &[]).unwrap_err();
        assert!(matches!(err, PriceError::MissingMandatoryCity { .. }));
    }

    #[test]
    fn applies_discount_matching_type_and_city() {
        let (regular, club, _) = indices();
        let model = model_with(
            json!([{"type": "pt-pvl", "value": 200}, {"type": "pt-ast", "value": 300}]),
            json!([{"type": "pt-pvl", "value": 10, "maxValue": 100}]),
        );
        let discounts = map_discounts(&model, &regular);
        let resolved = map_prices(&model, &regular, &club, "pt-pvl", &discounts).unwrap();
        assert_eq!(resolved.prices.len(), 2);
        assert_eq!(resolved.prices[0].discounted_price, 180.0);
        // the Астана row has no matching discount
        assert_eq!(resolved.prices[1].discounted_price, 300.0);
    }

    #[test]
    fn club_rows_are_never_discounted() {
        let (regular, club, _) = indices();
        let model = model_with(
            json!([
                {"type": "pt-pvl", "value": 200},
                {"type": "pt-pvl-club", "value": 150}
            ]),
            json!([
                {"type": "pt-pvl", "value": 50, "maxValue": 0},
                {"type": "pt-pvl-club", "value": 50, "maxValue": 0}
            ]),
        );
        let discounts = map_discounts(&model, &regular);
        // the club-tier discount entry resolves to nothing
        assert_eq!(discounts.len(), 1);
        let resolved = map_prices(&model, &regular, &club, "pt-pvl", &discounts).unwrap();
        assert_eq!(resolved.club_prices.len(), 1);
        assert_eq!(resolved.club_prices[0].discounted_price, 150.0);
        assert_eq!(resolved.prices[0].discounted_price, 100.0);
    }

    #[test]
    fn one_entry_may_hit_both_tiers() {
        let pavlodar = city("Павлодар");
        let roots = vec![pavlodar];
        let mut regular: IndexMap<String, String> = IndexMap::new();
        regular.insert("Павлодар".into(), "pt-shared".into());
        let mut club_map: IndexMap<String, String> = IndexMap::new();
        club_map.insert("Павлодар".into(), "pt-shared".into());
        let regular = CityIndex::build(&regular, &roots);
        let club = CityIndex::build(&club_map, &roots);

        let model = model_with(json!([{"type": "pt-shared", "value": 80}]), json!([]));
        let resolved = map_prices(&model, &regular, &club, "pt-shared", &[]).unwrap();
        assert_eq!(resolved.prices.len(), 1);
        assert_eq!(resolved.club_prices.len(), 1);
        assert_eq!(resolved.merged().len(), 2);
    }

    #[test]
    fn unknown_price_types_resolve_to_nothing() {
        let (regular, club, _) = indices();
        let model = model_with(
            json!([{"type": "pt-pvl", "value": 10}, {"type": "pt-mystery", "value": 99}]),
            json!([]),
        );
        let resolved = map_prices(&model, &regular, &club, "pt-pvl", &[]).unwrap();
        assert_eq!(resolved.prices.len(), 1);
        assert!(resolved.club_prices.is_empty());
    }
}
