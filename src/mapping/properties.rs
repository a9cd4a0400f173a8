//! Free-form property handling: filter tokens, characteristics, unifying
//! tokens and per-section filter ordering. Property lookups go through a
//! memoizing resolver whose cache lives for one consumer process.

use std::collections::HashMap;

use anyhow::Result;
use indexmap::IndexMap;
use tracing::warn;
use uuid::Uuid;

use crate::mapping::brand::BRAND_PROPERTY_NAME;
use crate::model::transfer::TransferModel;
use crate::repo::refs::{FilterPositionRepo, PropertyRef, PropertyRepo};

/// Caches successful lookups only; a property missing from the reference
/// store is retried on every sighting, so late-arriving reference rows get
/// picked up within one process lifetime.
pub struct PropertyResolver<'a> {
    repo: &'a dyn PropertyRepo,
    cache: HashMap<String, PropertyRef>,
}

impl<'a> PropertyResolver<'a> {
    pub fn new(repo: &'a dyn PropertyRepo) -> Self {
        Self {
            repo,
            cache: HashMap::new(),
        }
    }

    pub async fn resolve(&mut self, external_id: &str) -> Result<Option<PropertyRef>> {
        if external_id.is_empty() {
            return Ok(None);
        }
        if let Some(hit) = self.cache.get(external_id) {
            return Ok(Some(hit.clone()));
        }
        match self.repo.find_by_external_id(external_id).await? {
            Some(property) => {
                self.cache.insert(external_id.to_string(), property.clone());
                Ok(Some(property))
            }
            None => Ok(None),
        }
    }
}

/// `"propertyId:value"` tokens from filter-flagged properties. The brand
/// property is carried separately on the entity and is excluded here.
pub async fn build_filters(
    model: &TransferModel,
    resolver: &mut PropertyResolver<'_>,
) -> Result<Vec<String>> {
    let mut filters = Vec::new();
    for prop in &model.properties {
        if !prop.is_filter {
            continue;
        }
        let Some(resolved) = resolver.resolve(&prop.id).await? else {
            warn!(property = %prop.id, value = %prop.value, "unknown property; filter skipped");
            continue;
        };
        if resolved.name == BRAND_PROPERTY_NAME {
            continue;
        }
        filters.push(format!("{}:{}", resolved.id, prop.value.trim()));
    }
    Ok(filters)
}

/// Characteristic-flagged properties as a display map. Keys are the resolved
/// property names with dots stripped (dotted keys break the storage path
/// syntax downstream).
pub async fn build_characteristics(
    model: &TransferModel,
    resolver: &mut PropertyResolver<'_>,
) -> Result<IndexMap<String, String>> {
    let mut characteristics = IndexMap::new();
    for prop in &model.properties {
        if !prop.is_characteristic {
            continue;
        }
        let Some(resolved) = resolver.resolve(&prop.id).await? else {
            warn!(property = %prop.id, value = %prop.value, "unknown characteristic; skipped");
            continue;
        };
        characteristics.insert(resolved.name.replace('.', ""), prop.value.trim().to_string());
    }
    Ok(characteristics)
}

/// Offer-variant tokens. Every property participates here, flags or not:
/// variants are distinguished by the full property vector.
pub async fn build_unifying(
    model: &TransferModel,
    resolver: &mut PropertyResolver<'_>,
) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    for prop in &model.properties {
        let Some(resolved) = resolver.resolve(&prop.id).await? else {
            warn!(property = %prop.id, value = %prop.value, "unknown unifying property; skipped");
            continue;
        };
        tokens.push(format!("{}:{}", resolved.id, prop.value.trim()));
    }
    Ok(tokens)
}

/// Persists the display ordering of the record's filter properties for its
/// section. Positions keep each property's index within the full property
/// list; unknown properties are skipped without a warning (filter extraction
/// already reported them).
pub async fn store_filter_positions(
    model: &TransferModel,
    section_id: Uuid,
    resolver: &mut PropertyResolver<'_>,
    positions: &dyn FilterPositionRepo,
) -> Result<()> {
    for (index, prop) in model.properties.iter().enumerate() {
        if !prop.is_filter {
            continue;
        }
        let Some(resolved) = resolver.resolve(&prop.id).await? else {
            continue;
        };
        positions.upsert(section_id, resolved.id, index as i32).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::transfer::TransferModel;
    use crate::testutil::{sample_record, InMemoryFilterPositions, InMemoryProperties};
    use serde_json::json;

    fn model_with_properties(properties: serde_json::Value) -> TransferModel {
        let mut raw = sample_record("prod-1");
        raw["properties"] = properties;
        TransferModel::build_from_value(&raw).unwrap()
    }

    #[tokio::test]
    async fn filter_tokens_use_internal_ids_and_trimmed_values() {
        let repo = InMemoryProperties::with(&[("prop-color", "Цвет"), ("prop-size", "Размер")]);
        let mut resolver = PropertyResolver::new(&repo);
        let model = model_with_properties(json!([
            {"id": "prop-color", "value": " белый ", "isFilter": true},
            {"id": "prop-size", "value": "60", "isFilter": false}
        ]));
        let filters = build_filters(&model, &mut resolver).await.unwrap();
        assert_eq!(filters.len(), 1);
        let internal = repo.internal_id("prop-color");
        assert_eq!(filters[0], format!("{internal}:белый"));
    }

    #[tokio::test]
    async fn unknown_and_brand_properties_never_become_filters() {
        let repo = InMemoryProperties::with(&[("prop-brand", BRAND_PROPERTY_NAME)]);
        let mut resolver = PropertyResolver::new(&repo);
        let model = model_with_properties(json!([
            {"id": "prop-brand", "value": "Керама", "isFilter": true},
            {"id": "prop-ghost", "value": "x", "isFilter": true}
        ]));
        let filters = build_filters(&model, &mut resolver).await.unwrap();
        assert!(filters.is_empty());
    }

    #[tokio::test]
    async fn characteristics_strip_dots_from_names() {
        let repo = InMemoryProperties::with(&[("prop-th", "Толщина, мм.")]);
        let mut resolver = PropertyResolver::new(&repo);
        let model = model_with_properties(json!([
            {"id": "prop-th", "value": " 8 ", "isCharacteristic": true}
        ]));
        let map = build_characteristics(&model, &mut resolver).await.unwrap();
        assert_eq!(map.get("Толщина, мм").map(String::as_str), Some("8"));
    }

    #[tokio::test]
    async fn unifying_tokens_cover_every_property() {
        let repo = InMemoryProperties::with(&[("prop-a", "А"), ("prop-b", "Б")]);
        let mut resolver = PropertyResolver::new(&repo);
        let model = model_with_properties(json!([
            {"id": "prop-a", "value": "1", "isFilter": true},
            {"id": "prop-b", "value": "2"}
        ]));
        let tokens = build_unifying(&model, &mut resolver).await.unwrap();
        assert_eq!(tokens.len(), 2);
    }

    #[tokio::test]
    async fn positions_keep_original_property_indices() {
        let repo = InMemoryProperties::with(&[("prop-a", "А"), ("prop-c", "В")]);
        let positions = InMemoryFilterPositions::default();
        let mut resolver = PropertyResolver::new(&repo);
        let section_id = Uuid::new_v4();
        let model = model_with_properties(json!([
            {"id": "prop-a", "value": "1", "isFilter": true},
            {"id": "prop-b", "value": "2"},
            {"id": "prop-c", "value": "3", "isFilter": true},
            {"id": "prop-ghost", "value": "4", "isFilter": true}
        ]));
        store_filter_positions(&model, section_id, &mut resolver, &positions)
            .await
            .unwrap();
        let stored = positions.stored();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[&(section_id, repo.internal_id("prop-a"))], 0);
        assert_eq!(stored[&(section_id, repo.internal_id("prop-c"))], 2);
    }

    #[tokio::test]
    async fn resolver_memoizes_found_lookups() {
        let repo = InMemoryProperties::with(&[("prop-a", "А")]);
        let mut resolver = PropertyResolver::new(&repo);
        resolver.resolve("prop-a").await.unwrap();
        resolver.resolve("prop-a").await.unwrap();
        resolver.resolve("prop-missing").await.unwrap();
        resolver.resolve("prop-missing").await.unwrap();
        assert_eq!(repo.lookups("prop-a"), 1);
        assert_eq!(repo.lookups("prop-missing"), 2);
    }
}
