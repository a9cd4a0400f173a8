//! Reference-data entities and their repositories: sections, cities, stores,
//! free-form product properties, brands, loyalty statuses and the per-section
//! filter ordering. One Postgres-backed store implements every trait; tests
//! substitute in-memory versions.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub item_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

/// A store row joined with its city, as balance aggregation consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveStore {
    pub external_id: String,
    pub for_customers: bool,
    pub city: City,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoyaltyStatus {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
}

#[async_trait::async_trait]
pub trait SectionRepo: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Section>>;
}

#[async_trait::async_trait]
pub trait CityRepo: Send + Sync {
    /// Root cities only (no parent); price/discount resolution never targets
    /// district-level rows.
    async fn list_roots(&self) -> Result<Vec<City>>;
}

#[async_trait::async_trait]
pub trait StoreRepo: Send + Sync {
    async fn list_active(&self) -> Result<Vec<ActiveStore>>;
}

#[async_trait::async_trait]
pub trait PropertyRepo: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PropertyRef>>;
}

#[async_trait::async_trait]
pub trait BrandRepo: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Brand>>;
    async fn insert(&self, brand: &Brand) -> Result<()>;
}

#[async_trait::async_trait]
pub trait StatusRepo: Send + Sync {
    async fn list_all(&self) -> Result<Vec<LoyaltyStatus>>;
}

#[async_trait::async_trait]
pub trait FilterPositionRepo: Send + Sync {
    async fn upsert(&self, section_id: Uuid, property_id: Uuid, position: i32) -> Result<()>;
}

#[derive(Clone)]
pub struct PgRefStore {
    pool: PgPool,
}

impl PgRefStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SectionRepo for PgRefStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Section>> {
        let row = sqlx::query_as::<_, (Uuid, String, String, i64)>(
            "SELECT id, external_id, name, item_count FROM sections WHERE external_id = $1",
        )
        .bind(external_id)
        .persistent(false)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, external_id, name, item_count)| Section {
            id,
            external_id,
            name,
            item_count,
        }))
    }
}

#[async_trait::async_trait]
impl CityRepo for PgRefStore {
    async fn list_roots(&self) -> Result<Vec<City>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<Uuid>)>(
            "SELECT id, name, parent_id FROM cities WHERE parent_id IS NULL ORDER BY name",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, parent_id)| City {
                id,
                name,
                parent_id,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl StoreRepo for PgRefStore {
    async fn list_active(&self) -> Result<Vec<ActiveStore>> {
        let rows = sqlx::query_as::<_, (String, bool, Uuid, String, Option<Uuid>)>(
            "SELECT s.external_id, s.for_customers, c.id, c.name, c.parent_id
             FROM stores s
             JOIN cities c ON c.id = s.city_id
             WHERE s.active",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(external_id, for_customers, city_id, city_name, parent_id)| ActiveStore {
                external_id,
                for_customers,
                city: City {
                    id: city_id,
                    name: city_name,
                    parent_id,
                },
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl PropertyRepo for PgRefStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PropertyRef>> {
        let row = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, name FROM product_properties WHERE external_id = $1",
        )
        .bind(external_id)
        .persistent(false)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name)| PropertyRef { id, name }))
    }
}

#[async_trait::async_trait]
impl BrandRepo for PgRefStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Brand>> {
        let row = sqlx::query_as::<_, (Uuid, String, bool)>(
            "SELECT id, name, active FROM brands WHERE name = $1",
        )
        .bind(name)
        .persistent(false)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, active)| Brand { id, name, active }))
    }

    async fn insert(&self, brand: &Brand) -> Result<()> {
        sqlx::query("INSERT INTO brands (id, name, active) VALUES ($1, $2, $3)")
            .bind(brand.id)
            .bind(&brand.name)
            .bind(brand.active)
            .persistent(false)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StatusRepo for PgRefStore {
    async fn list_all(&self) -> Result<Vec<LoyaltyStatus>> {
        let rows = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, external_id, name FROM loyalty_statuses ORDER BY name",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, external_id, name)| LoyaltyStatus {
                id,
                external_id,
                name,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl FilterPositionRepo for PgRefStore {
    async fn upsert(&self, section_id: Uuid, property_id: Uuid, position: i32) -> Result<()> {
        sqlx::query(
            "INSERT INTO filter_positions (section_id, property_id, position)
             VALUES ($1, $2, $3)
             ON CONFLICT (section_id, property_id)
             DO UPDATE SET position = EXCLUDED.position",
        )
        .bind(section_id)
        .bind(property_id)
        .bind(position)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
