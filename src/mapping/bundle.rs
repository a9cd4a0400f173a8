//! Bundle (set) resolution: joins the record's component list against
//! already-imported catalog entities. A bundle naming any component the
//! catalog has not seen yet is dropped whole for this cycle and picks up on
//! a later import pass, once the component record has landed.

use std::collections::HashMap;

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::transfer::SetEntry;
use crate::repo::products::ProductRepo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleComponent {
    pub product_id: Uuid,
    pub external_id: String,
    pub count_coefficient: f64,
    pub is_default: bool,
}

pub async fn resolve_set(
    entries: &[SetEntry],
    products: &dyn ProductRepo,
) -> Result<Vec<BundleComponent>> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    // duplicate component ids collapse, last entry wins
    let mut mapped: IndexMap<String, (f64, bool)> = IndexMap::new();
    for entry in entries {
        mapped.insert(entry.id.clone(), (entry.value, entry.is_default));
    }

    let ids: Vec<String> = mapped.keys().cloned().collect();
    let resolved = products.resolve_external_ids(&ids).await?;
    if resolved.len() != mapped.len() {
        return Ok(Vec::new());
    }
    let by_external: HashMap<String, Uuid> = resolved.into_iter().collect();

    let mut components = Vec::with_capacity(mapped.len());
    for (external_id, (count_coefficient, is_default)) in mapped {
        let Some(product_id) = by_external.get(&external_id) else {
            return Ok(Vec::new());
        };
        components.push(BundleComponent {
            product_id: *product_id,
            external_id,
            count_coefficient,
            is_default,
        });
    }
    Ok(components)
}
