//! Brand resolution. The feed carries the brand as an ordinary property
//! named "Бренд"; unknown brand names are auto-created deactivated so a
//! human can review them before they surface anywhere.

use std::collections::HashMap;

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::mapping::properties::PropertyResolver;
use crate::model::transfer::TransferModel;
use crate::repo::refs::{Brand, BrandRepo};

pub const BRAND_PROPERTY_NAME: &str = "Бренд";

/// Memoizes by normalized name (lowercased, trimmed, dots stripped); both
/// found and freshly created brands are cached for the process lifetime.
pub struct BrandResolver<'a> {
    repo: &'a dyn BrandRepo,
    cache: HashMap<String, Brand>,
}

impl<'a> BrandResolver<'a> {
    pub fn new(repo: &'a dyn BrandRepo) -> Self {
        Self {
            repo,
            cache: HashMap::new(),
        }
    }

    pub async fn resolve(&mut self, raw_name: &str) -> Result<Option<Brand>> {
        let name = raw_name.trim().to_lowercase();
        if name.is_empty() {
            return Ok(None);
        }
        let cache_key = name.replace('.', "");
        if let Some(hit) = self.cache.get(&cache_key) {
            return Ok(Some(hit.clone()));
        }

        let brand = match self.repo.find_by_name(&name).await? {
            Some(found) => found,
            None => {
                let created = Brand {
                    id: Uuid::new_v4(),
                    name: name.clone(),
                    active: false,
                };
                self.repo.insert(&created).await?;
                info!(brand = %name, "brand not found; created deactivated");
                created
            }
        };
        self.cache.insert(cache_key, brand.clone());
        Ok(Some(brand))
    }
}

/// Scans the record's properties for the first brand-named one and resolves
/// its value. Records with no brand property carry no brand.
pub async fn process_brand(
    model: &TransferModel,
    properties: &mut PropertyResolver<'_>,
    brands: &mut BrandResolver<'_>,
) -> Result<Option<Brand>> {
    for prop in &model.properties {
        let Some(resolved) = properties.resolve(&prop.id).await? else {
            continue;
        };
        if resolved.name == BRAND_PROPERTY_NAME {
            return brands.resolve(&prop.value).await;
        }
    }
    Ok(None)
}
