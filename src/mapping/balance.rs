//! Stock balance aggregation: raw per-store amounts are summed by store,
//! joined to cities through the store index, and finally validated against
//! the record's unit definitions (area goods below the smallest calculable
//! coefficient are not purchasable and read as zero stock).

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::transfer::{TransferModel, UnitEntry};
use crate::repo::refs::{ActiveStore, City};

/// Base unit name that enables the size-calculator truncation rule.
pub const AREA_UNIT_NAME: &str = "м2";

/// Active stores keyed by external id; loaded once per consumer instance.
#[derive(Debug, Clone, Default)]
pub struct StoreIndex {
    by_external: HashMap<String, ActiveStore>,
}

impl StoreIndex {
    pub fn build(stores: Vec<ActiveStore>) -> Self {
        let by_external = stores
            .into_iter()
            .map(|s| (s.external_id.clone(), s))
            .collect();
        Self { by_external }
    }

    pub fn resolve(&self, external_id: &str) -> Option<&ActiveStore> {
        self.by_external.get(external_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityBalance {
    pub city: City,
    pub count: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Per-city aggregated stock, keyed by city id.
pub type BalanceByCity = IndexMap<String, CityBalance>;

pub fn map_balance(model: &TransferModel, stores: &StoreIndex) -> BalanceByCity {
    let mut by_stock: IndexMap<String, f64> = IndexMap::new();
    for entry in &model.balance {
        *by_stock
            .entry(entry.stock.trim().to_string())
            .or_insert(0.0) += entry.value;
    }

    let mut result: BalanceByCity = IndexMap::new();
    for (stock, total) in by_stock {
        let Some(store) = stores.resolve(&stock) else {
            info!(stock = %stock, "unknown store for balance entry; amount dropped");
            continue;
        };
        if !store.for_customers {
            debug!(stock = %stock, "store closed to customers; balance skipped");
            continue;
        }
        let key = store.city.id.to_string();
        result
            .entry(key)
            .and_modify(|b| b.count += total)
            .or_insert(CityBalance {
                city: store.city.clone(),
                count: total,
                limit: None,
            });
    }
    result
}

/// Zeroes every city's count when an area-measured item with the size
/// calculator enabled holds less total stock than the smallest calculable
/// coefficient. Per-entry limits ride along untouched.
pub fn validate_and_truncate(balance: BalanceByCity, units: &[UnitEntry]) -> BalanceByCity {
    let base_is_area = units
        .iter()
        .find(|u| u.base)
        .map(|u| u.name == AREA_UNIT_NAME)
        .unwrap_or(false);
    let calculator_enabled = units.iter().any(|u| u.calc);
    if !(base_is_area && calculator_enabled && units.len() > 1) {
        return balance;
    }

    let min_coefficient = units
        .iter()
        .filter(|u| u.calc)
        .map(|u| u.coefficient)
        .fold(f64::INFINITY, f64::min);
    let total: f64 = balance.values().map(|b| b.count).sum();
    if total >= min_coefficient {
        return balance;
    }

    balance
        .into_iter()
        .map(|(key, mut entry)| {
            entry.count = 0.0;
            (key, entry)
        })
        .collect()
}
