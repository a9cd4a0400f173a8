//! Loyalty points multipliers. Every known status gets the default
//! multiplier of 1; a supplied entry for a status's external id overrides
//! the default, last matching entry winning.

use indexmap::IndexMap;

use crate::model::transfer::PointsEntry;
use crate::repo::refs::LoyaltyStatus;

pub fn points_multipliers(
    entries: &[PointsEntry],
    statuses: &[LoyaltyStatus],
) -> IndexMap<String, f64> {
    let mut result = IndexMap::new();
    for status in statuses {
        let mut multiplier = 1.0;
        for entry in entries {
            if entry.status == status.external_id {
                multiplier = entry.multiplier;
            }
        }
        result.insert(status.id.to_string(), multiplier);
    }
    result
}
